use std::time::Duration;

const ENV_PREFIX: &str = "WEBHOOK_ANALYST_";

/// Process-wide settings for the outbound clients.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: String,
    pub provider_base_url: String,
    pub provider_timeout: Duration,
    pub bitable_base_url: String,
    pub write_retry_count: u32,
    pub write_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            provider_base_url: "https://generativelanguage.googleapis.com".to_string(),
            provider_timeout: Duration::from_secs(60),
            bitable_base_url: "https://open.feishu.cn".to_string(),
            write_retry_count: 3,
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable numbers keep the default rather than failing startup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let seconds = |name: &str, fallback: Duration| {
            var(name)
                .and_then(|raw| raw.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        Self {
            model: var("MODEL").unwrap_or(defaults.model),
            provider_base_url: var("PROVIDER_URL").unwrap_or(defaults.provider_base_url),
            provider_timeout: seconds("PROVIDER_TIMEOUT_SECS", defaults.provider_timeout),
            bitable_base_url: var("BITABLE_URL").unwrap_or(defaults.bitable_base_url),
            write_retry_count: var("WRITE_RETRIES")
                .and_then(|raw| raw.parse::<u32>().ok())
                .map(|count| count.max(1))
                .unwrap_or(defaults.write_retry_count),
            write_timeout: seconds("WRITE_TIMEOUT_SECS", defaults.write_timeout),
        }
    }
}

pub fn env_flag_enabled(name: &str) -> bool {
    matches!(
        std::env::var(format!("{ENV_PREFIX}{name}"))
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn settings_read_prefixed_variables() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WEBHOOK_ANALYST_MODEL", "gemini-1.5-pro"),
            ("WEBHOOK_ANALYST_WRITE_RETRIES", "5"),
            ("WEBHOOK_ANALYST_WRITE_TIMEOUT_SECS", "12"),
        ]);
        let settings = Settings::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.model, "gemini-1.5-pro");
        assert_eq!(settings.write_retry_count, 5);
        assert_eq!(settings.write_timeout, Duration::from_secs(12));
        assert_eq!(settings.bitable_base_url, Settings::default().bitable_base_url);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WEBHOOK_ANALYST_WRITE_RETRIES", "many"),
            ("WEBHOOK_ANALYST_PROVIDER_TIMEOUT_SECS", "-3"),
        ]);
        let settings = Settings::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings, Settings::default());
    }
}
