use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    core::{
        config::Settings,
        errors::{AppError, AppResult},
        types::WriteOutcome,
    },
    writeback::plan::{WriteMethod, WriteRequest},
};

const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";

#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_secret: String,
}

#[derive(Debug)]
pub struct BitableClient {
    http: reqwest::Client,
    base_url: String,
    credentials: AppCredentials,
    retry_count: u32,
    tenant_token: Mutex<Option<String>>,
}

impl BitableClient {
    pub fn new(settings: &Settings, credentials: AppCredentials) -> AppResult<Self> {
        let mut problems = Vec::new();
        if credentials.app_id.trim().is_empty() {
            problems.push("missing app_id".to_string());
        }
        if credentials.app_secret.trim().is_empty() {
            problems.push("missing app_secret".to_string());
        }
        if !problems.is_empty() {
            return Err(AppError::InvalidConfig(problems));
        }

        let http = reqwest::Client::builder()
            .timeout(settings.write_timeout)
            .build()
            .map_err(|err| AppError::Network(err.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.bitable_base_url.trim_end_matches('/').to_string(),
            credentials,
            retry_count: settings.write_retry_count.max(1),
            tenant_token: Mutex::new(None),
        })
    }

    /// Skips the token exchange, e.g. when the caller already holds a token.
    pub fn with_tenant_token(self, token: impl Into<String>) -> Self {
        Self {
            tenant_token: Mutex::new(Some(token.into())),
            ..self
        }
    }

    async fn tenant_token(&self) -> AppResult<String> {
        let mut cached = self.tenant_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .http
            .post(format!("{}{TOKEN_PATH}", self.base_url))
            .json(&json!({
                "app_id": self.credentials.app_id,
                "app_secret": self.credentials.app_secret,
            }))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(AppError::ProviderAuth);
        }
        if status != StatusCode::OK {
            return Err(AppError::WriteBack(format!("token request failed: HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| AppError::ProviderInvalidResponse(err.to_string()))?;
        if body.get("code").and_then(Value::as_i64) != Some(0) {
            return Err(AppError::ProviderAuth);
        }
        let token = body
            .get("tenant_access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::ProviderInvalidResponse("token response missing tenant_access_token".into())
            })?
            .to_string();

        debug!("tenant token acquired");
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Sends one request with exponential backoff between attempts.
    pub async fn send(&self, request: &WriteRequest) -> AppResult<WriteOutcome> {
        let token = self.tenant_token().await?;
        let url = format!("{}{}", self.base_url, request.path);
        let mut last_error = String::from("no attempt made");

        for attempt in 0..self.retry_count {
            let builder = match request.method {
                WriteMethod::Post => self.http.post(&url),
                WriteMethod::Put => self.http.put(&url),
            };
            let result = builder.bearer_auth(&token).json(&request.body).send().await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                        return Err(AppError::ProviderAuth);
                    }
                    let body = response.json::<Value>().await.map_err(|err| err.to_string());
                    match read_outcome(status, body, attempt + 1) {
                        Ok(outcome) => return Ok(outcome),
                        Err(message) => last_error = message,
                    }
                }
                Err(err) => last_error = map_transport_error(err).to_string(),
            }

            if attempt + 1 < self.retry_count {
                let delay = backoff_delay(attempt);
                warn!(attempt = attempt + 1, error = %last_error, ?delay, "write-back attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }

        Err(AppError::WriteBack(last_error))
    }
}

/// `2^attempt` seconds, attempt counted from zero.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// HTTP 200 with API `code == 0` is the only success; anything else becomes the retry message.
fn read_outcome(
    status: StatusCode,
    body: Result<Value, String>,
    attempts: u32,
) -> Result<WriteOutcome, String> {
    let body = body.map_err(|err| format!("HTTP {status}, unreadable response body: {err}"))?;
    if status == StatusCode::OK && body.get("code").and_then(Value::as_i64) == Some(0) {
        return Ok(WriteOutcome {
            success: true,
            attempts,
            data: body.get("data").cloned().unwrap_or_else(|| json!({})),
        });
    }
    Err(rejection_message(status, &body))
}

fn rejection_message(status: StatusCode, body: &Value) -> String {
    let code = body
        .get("code")
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string());
    let message = body
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or("no message");
    format!("HTTP {status}, code {code}, {message}")
}

fn map_transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::ProviderTimeout
    } else {
        AppError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn rejection_keeps_api_code_and_message() {
        assert_eq!(
            rejection_message(StatusCode::OK, &json!({"code": 1254043, "msg": "RecordIdNotFound"})),
            "HTTP 200 OK, code 1254043, RecordIdNotFound"
        );
        assert_eq!(
            rejection_message(StatusCode::BAD_GATEWAY, &json!({})),
            "HTTP 502 Bad Gateway, code none, no message"
        );
    }

    #[test]
    fn undecodable_body_keeps_the_decode_error() {
        let message = read_outcome(StatusCode::OK, Err("expected value at line 1".into()), 1)
            .expect_err("not a success");
        assert_eq!(
            message,
            "HTTP 200 OK, unreadable response body: expected value at line 1"
        );
    }

    #[test]
    fn zero_code_is_success() {
        let outcome = read_outcome(
            StatusCode::OK,
            Ok(json!({"code": 0, "data": {"record": {"id": "rec1"}}})),
            2,
        )
        .expect("success");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.data["record"]["id"], "rec1");
    }

    #[test]
    fn missing_credentials_are_all_reported() {
        let err = BitableClient::new(
            &Settings::default(),
            AppCredentials {
                app_id: String::new(),
                app_secret: " ".into(),
            },
        )
        .expect_err("should reject");
        assert_eq!(
            err.to_string(),
            "invalid configuration: missing app_id; missing app_secret"
        );
    }
}
