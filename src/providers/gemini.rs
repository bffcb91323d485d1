use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::core::{
    config::Settings,
    errors::{AppError, AppResult},
};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAnswer {
    pub answer_markdown: String,
    pub token_usage: Value,
    pub estimated_cost_usd: f64,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.provider_timeout)
            .build()
            .map_err(|err| AppError::Network(err.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.provider_base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_analysis(&self, api_key: &str, prompt: &str) -> AppResult<ModelAnswer> {
        if api_key.trim().is_empty() {
            return Err(AppError::ProviderAuth);
        }

        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let payload = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{"text": prompt}]
                }
            ],
            "generationConfig": {
                "temperature": 0.2,
                "responseMimeType": "application/json"
            }
        });
        debug!(model = %self.model, prompt_chars = prompt.len(), "requesting analysis");

        let response = self
            .http
            .post(endpoint)
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::ProviderTimeout
                } else {
                    AppError::Network(err.to_string())
                }
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(AppError::ProviderAuth),
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(model = %self.model, "provider rate limited");
                return Err(AppError::ProviderRateLimited);
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::ProviderInvalidResponse(format!(
                    "status {status} body {body}"
                )));
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| AppError::ProviderInvalidResponse(err.to_string()))?;
        parse_generate_response(&body)
    }
}

/// Reads a `generateContent` response body. Multiple text parts are joined.
pub fn parse_generate_response(body: &Value) -> AppResult<ModelAnswer> {
    let parts = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| AppError::ProviderInvalidResponse("missing text candidate".to_string()))?;
    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>();

    let usage = body.get("usageMetadata").cloned().unwrap_or_else(|| json!({}));
    let count = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
    let input_tokens = count("promptTokenCount");
    let output_tokens = count("candidatesTokenCount");
    let total_tokens = match count("totalTokenCount") {
        0 => input_tokens + output_tokens,
        total => total,
    };

    // Flash-tier list prices; an estimate for display only.
    let estimated_cost_usd = (input_tokens as f64 * 0.000_000_3) + (output_tokens as f64 * 0.000_001_2);

    Ok(ModelAnswer {
        answer_markdown: answer_markdown(&text),
        token_usage: json!({
            "input_tokens": input_tokens,
            "output_tokens": output_tokens,
            "total_tokens": total_tokens,
        }),
        estimated_cost_usd,
    })
}

/// The model is asked for `{"answer_markdown": ...}`; anything else is taken as
/// the markdown itself.
pub fn answer_markdown(text: &str) -> String {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|inner| inner.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str::<Value>(unfenced)
        .ok()
        .and_then(|parsed| {
            parsed
                .get("answer_markdown")
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| trimmed.to_string())
}
