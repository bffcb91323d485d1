//! Pure construction of write-back requests, one function per write mode.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    core::{
        errors::{AppError, AppResult},
        types::Record,
    },
    markdown::RichBlock,
};

pub const ANALYSIS_RESULT_FIELD: &str = "analysis_result";
const DEFAULT_TARGET_STATUS: &str = "analyzed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    FieldUpdate,
    Comment,
    Subtask,
    Status,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FieldUpdate => "field_update",
            Self::Comment => "comment",
            Self::Subtask => "subtask",
            Self::Status => "status",
        }
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "field_update" => Ok(Self::FieldUpdate),
            "comment" => Ok(Self::Comment),
            "subtask" => Ok(Self::Subtask),
            "status" => Ok(Self::Status),
            other => Err(format!("unsupported write mode: {other}")),
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination settings as stored with a task, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteTargetConfig {
    #[serde(default)]
    pub app_token: Option<String>,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub write_mode: Option<String>,
    /// Source variable to destination field.
    #[serde(default)]
    pub field_mapping: IndexMap<String, String>,
    #[serde(default)]
    pub rich_text_field: Option<String>,
    #[serde(default)]
    pub target_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteTarget {
    pub app_token: String,
    pub table_id: String,
    pub mode: WriteMode,
    pub field_mapping: IndexMap<String, String>,
    pub rich_text_field: Option<String>,
    pub target_status: String,
}

impl WriteTarget {
    /// Reports every problem at once. The write mode is resolved here so that
    /// building a request never has to branch on a string.
    pub fn validate(config: &WriteTargetConfig) -> AppResult<Self> {
        let mut problems = Vec::new();
        let required = |value: &Option<String>, name: &str, problems: &mut Vec<String>| {
            match value.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
                Some(value) => value.to_string(),
                None => {
                    problems.push(format!("missing {name}"));
                    String::new()
                }
            }
        };
        let app_token = required(&config.app_token, "app_token", &mut problems);
        let table_id = required(&config.table_id, "table_id", &mut problems);
        let mode = match config.write_mode.as_deref() {
            None => WriteMode::FieldUpdate,
            Some(name) => name.parse::<WriteMode>().unwrap_or_else(|reason: String| {
                problems.push(reason);
                WriteMode::FieldUpdate
            }),
        };

        if !problems.is_empty() {
            return Err(AppError::InvalidConfig(problems));
        }

        Ok(Self {
            app_token,
            table_id,
            mode,
            field_mapping: config.field_mapping.clone(),
            rich_text_field: config
                .rich_text_field
                .clone()
                .filter(|field| !field.trim().is_empty()),
            target_status: config
                .target_status
                .clone()
                .filter(|status| !status.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TARGET_STATUS.to_string()),
        })
    }

    fn records_path(&self) -> String {
        format!(
            "/open-apis/bitable/v1/apps/{}/tables/{}/records",
            self.app_token, self.table_id
        )
    }
}

/// What one execution has to write back.
#[derive(Debug, Clone)]
pub struct WriteContent {
    pub record_id: String,
    pub task_name: String,
    pub variables: Record,
    pub analysis_markdown: String,
    pub blocks: Vec<RichBlock>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMethod {
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteRequest {
    pub method: WriteMethod,
    pub path: String,
    pub body: Value,
}

pub fn build_request(target: &WriteTarget, content: &WriteContent) -> AppResult<WriteRequest> {
    match target.mode {
        WriteMode::FieldUpdate => field_update(target, content),
        WriteMode::Comment => comment(target, content),
        WriteMode::Subtask => subtask(target, content),
        WriteMode::Status => status(target, content),
    }
}

fn record_path(target: &WriteTarget, content: &WriteContent) -> AppResult<String> {
    let record_id = content.record_id.trim();
    if record_id.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{} write requires a record id",
            target.mode
        )));
    }
    Ok(format!("{}/{record_id}", target.records_path()))
}

fn analysis_text(content: &WriteContent) -> AppResult<&str> {
    let text = content.analysis_markdown.trim();
    if text.is_empty() {
        return Err(AppError::InvalidInput("analysis result is empty".to_string()));
    }
    Ok(text)
}

pub fn field_update(target: &WriteTarget, content: &WriteContent) -> AppResult<WriteRequest> {
    let mut fields = Map::new();
    for (source, destination) in &target.field_mapping {
        let value = if source == ANALYSIS_RESULT_FIELD {
            Some(Value::String(content.analysis_markdown.clone()))
        } else {
            content.variables.get(source).cloned()
        };
        if let Some(value) = value {
            fields.insert(destination.clone(), value);
        }
    }
    if let Some(rich_field) = &target.rich_text_field {
        fields.insert(rich_field.clone(), serde_json::to_value(&content.blocks)?);
    }
    if fields.is_empty() && !content.analysis_markdown.trim().is_empty() {
        fields.insert(
            ANALYSIS_RESULT_FIELD.to_string(),
            Value::String(content.analysis_markdown.clone()),
        );
    }
    if fields.is_empty() {
        return Err(AppError::InvalidInput("no fields to update".to_string()));
    }

    Ok(WriteRequest {
        method: WriteMethod::Put,
        path: record_path(target, content)?,
        body: json!({ "fields": fields }),
    })
}

pub fn comment(target: &WriteTarget, content: &WriteContent) -> AppResult<WriteRequest> {
    let analysis = analysis_text(content)?;
    let text = format!(
        "AI analysis ({})\n\n{analysis}",
        content.at.format("%Y-%m-%d %H:%M:%S")
    );
    Ok(WriteRequest {
        method: WriteMethod::Post,
        path: format!("{}/comments", record_path(target, content)?),
        body: json!({ "content": { "text": text } }),
    })
}

pub fn subtask(target: &WriteTarget, content: &WriteContent) -> AppResult<WriteRequest> {
    let analysis = analysis_text(content)?;
    let task_name = match content.task_name.trim() {
        "" => "unnamed task",
        name => name,
    };
    Ok(WriteRequest {
        method: WriteMethod::Post,
        path: target.records_path(),
        body: json!({
            "fields": {
                "title": format!("AI analysis - {task_name}"),
                "description": analysis,
                "parent_id": content.record_id,
                "status": "pending",
                "created_at": content.at.to_rfc3339(),
            }
        }),
    })
}

pub fn status(target: &WriteTarget, content: &WriteContent) -> AppResult<WriteRequest> {
    Ok(WriteRequest {
        method: WriteMethod::Put,
        path: record_path(target, content)?,
        body: json!({
            "fields": {
                "status": target.target_status,
                "analysis_completed_at": content.at.to_rfc3339(),
                "analysis_result": content.analysis_markdown,
            }
        }),
    })
}
