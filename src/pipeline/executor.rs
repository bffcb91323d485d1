use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    core::{
        errors::{AppError, AppResult},
        types::{
            ExecutionErrorEvent, ExecutionGate, ExecutionStatus, ExecutionSummary, Record,
            WriteOutcome,
        },
    },
    markdown::{self, RichBlock},
    parser::{ParsingConfig, WebhookDataParser},
    pipeline::{
        prompts::{analysis_prompt, render_field_placeholders, render_template},
        rich_text::{extract_plain_text, has_images},
    },
    providers::gemini::GeminiClient,
    writeback::{build_request, BitableClient, WriteContent, WriteRequest, WriteTarget},
};

/// One webhook-triggered analysis, as handed over by the request handler.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub task_name: String,
    pub record_id: String,
    pub payload: Value,
    pub parsing_config: ParsingConfig,
    pub prompt_template: String,
    /// Variables holding workspace rich text, flattened before templating.
    /// Each must be non-empty for the run to go ahead.
    pub rich_text_variables: Vec<String>,
    /// Skip the run unless every rich-text variable contains an image.
    pub require_images: bool,
    pub target: Option<WriteTarget>,
}

#[derive(Debug, Clone)]
pub struct PreparedAnalysis {
    pub execution_id: String,
    pub started_at: DateTime<Utc>,
    pub task_name: String,
    pub record_id: String,
    pub variables: Record,
    pub prompt: String,
    pub target: Option<WriteTarget>,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub summary: ExecutionSummary,
    pub variables: Record,
    pub answer_markdown: String,
    pub blocks: Vec<RichBlock>,
    pub write_request: Option<WriteRequest>,
    pub write_outcome: Option<WriteOutcome>,
}

#[derive(Debug, Clone)]
pub struct AnalysisExecutor {
    parser: WebhookDataParser,
    gemini: GeminiClient,
    writer: Option<Arc<BitableClient>>,
}

impl AnalysisExecutor {
    pub fn new(parser: WebhookDataParser, gemini: GeminiClient) -> Self {
        Self {
            parser,
            gemini,
            writer: None,
        }
    }

    pub fn with_writer(mut self, writer: Arc<BitableClient>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Parses the payload and renders the prompt. No I/O.
    pub fn prepare(&self, request: &AnalysisRequest) -> AppResult<PreparedAnalysis> {
        if request.prompt_template.trim().is_empty() {
            return Err(AppError::InvalidInput("prompt template cannot be empty".to_string()));
        }

        let execution_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(execution_id = %execution_id, task = %request.task_name, "analysis started");

        let mut variables = self.parser.parse(&request.payload, &request.parsing_config)?;

        let gate = check_execution(request, &variables);
        if !gate.should_execute {
            let reason = gate.skip_reason.unwrap_or_default();
            info!(execution_id = %execution_id, details = %gate.details, "analysis skipped: {reason}");
            return Err(AppError::Skipped(reason));
        }

        for name in &request.rich_text_variables {
            if let Some(value) = variables.get_mut(name) {
                *value = Value::String(extract_plain_text(value));
            }
        }

        let prompt = analysis_prompt(&render_prompt(request, &variables));

        Ok(PreparedAnalysis {
            execution_id,
            started_at,
            task_name: request.task_name.clone(),
            record_id: request.record_id.clone(),
            variables,
            prompt,
            target: request.target.clone(),
        })
    }

    /// Converts the model's answer and builds the write-back request. No I/O.
    pub fn finish(&self, prepared: PreparedAnalysis, answer_markdown: &str) -> AppResult<ExecutionResult> {
        let blocks = markdown::convert(answer_markdown);
        let ended_at = Utc::now();

        let write_request = match &prepared.target {
            Some(target) => Some(build_request(
                target,
                &WriteContent {
                    record_id: prepared.record_id.clone(),
                    task_name: prepared.task_name.clone(),
                    variables: prepared.variables.clone(),
                    analysis_markdown: answer_markdown.to_string(),
                    blocks: blocks.clone(),
                    at: ended_at,
                },
            )?),
            None => None,
        };

        Ok(ExecutionResult {
            summary: ExecutionSummary {
                execution_id: prepared.execution_id,
                status: ExecutionStatus::Completed,
                started_at: prepared.started_at,
                ended_at,
                block_count: blocks.len(),
                token_usage: json!({}),
                cost_usd: 0.0,
            },
            variables: prepared.variables,
            answer_markdown: answer_markdown.to_string(),
            blocks,
            write_request,
            write_outcome: None,
        })
    }

    pub async fn run(&self, api_key: &str, request: &AnalysisRequest) -> AppResult<ExecutionResult> {
        let prepared = self.prepare(request)?;
        let execution_id = prepared.execution_id.clone();

        let answer = self
            .gemini
            .generate_analysis(api_key, &prepared.prompt)
            .await
            .inspect_err(|err| warn!(execution_id = %execution_id, code = err.code(), "model call failed"))?;

        let mut result = self.finish(prepared, &answer.answer_markdown)?;
        result.summary.token_usage = answer.token_usage;
        result.summary.cost_usd = answer.estimated_cost_usd;

        if let (Some(writer), Some(write_request)) = (&self.writer, &result.write_request) {
            result.write_outcome = Some(writer.send(write_request).await?);
        }

        info!(
            execution_id = %execution_id,
            blocks = result.summary.block_count,
            "analysis completed"
        );
        Ok(result)
    }
}

/// Decides whether a parsed request is worth sending to the model.
///
/// Rich-text variables must be present and non-empty; with `require_images`
/// they must also contain at least one image. The first failing variable
/// decides.
pub fn check_execution(request: &AnalysisRequest, variables: &Record) -> ExecutionGate {
    for name in &request.rich_text_variables {
        let value = variables.get(name).filter(|value| !is_blank(value));
        let Some(value) = value else {
            return skipped(
                format!("rich text field {name} is empty"),
                json!({
                    "validation_type": "rich_text_empty",
                    "task_name": request.task_name,
                    "record_id": request.record_id,
                    "variable": name,
                    "field_value_present": false,
                }),
            );
        };
        if request.require_images && !has_images(value) {
            return skipped(
                format!("rich text field {name} contains no images"),
                json!({
                    "validation_type": "rich_text_no_images",
                    "task_name": request.task_name,
                    "record_id": request.record_id,
                    "variable": name,
                    "field_value_present": true,
                    "images_found": false,
                }),
            );
        }
    }

    ExecutionGate {
        should_execute: true,
        skip_reason: None,
        details: json!({
            "validation_type": "passed",
            "record_id": request.record_id,
            "rich_text_variables": request.rich_text_variables.len(),
        }),
    }
}

fn skipped(reason: String, details: Value) -> ExecutionGate {
    ExecutionGate {
        should_execute: false,
        skip_reason: Some(reason),
        details,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

/// `{{name}}` placeholders first, then single-brace `{name}` ones. The first
/// rich-text variable is also reachable as `{field_value}` / `{trigger_field}`.
fn render_prompt(request: &AnalysisRequest, variables: &Record) -> String {
    let rendered = render_template(&request.prompt_template, variables);

    let mut fields = variables.clone();
    if let Some(text) = request
        .rich_text_variables
        .first()
        .and_then(|name| variables.get(name))
        .cloned()
    {
        fields.insert("field_value".to_string(), text.clone());
        fields.insert("trigger_field".to_string(), text);
    }
    render_field_placeholders(&rendered, &fields)
}

pub fn error_event(execution_id: &str, err: &AppError) -> ExecutionErrorEvent {
    ExecutionErrorEvent {
        execution_id: execution_id.to_string(),
        code: err.code().to_string(),
        message: err.to_string(),
        retryable: err.retryable(),
    }
}
