use std::path::PathBuf;
use std::time::Duration;

use chatgpt::config::ChatGPTEngine;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chatgpt_api_key: String,
    pub model: ChatGPTEngine,
    pub timeout: Duration,
    pub credentials_path: PathBuf,
    pub dialogue_db: String,
}

impl Config {
    /// Reads the process environment; call `dotenv()` first to pick up `.env`.
    /// The Telegram token is read separately by `Bot::from_env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let chatgpt_api_key = lookup("CHATGPT_API_KEY").ok_or(ConfigError::Missing("CHATGPT_API_KEY"))?;

        let model = lookup("QUIZ_MODEL")
            .map(|name| parse_engine(&name))
            .unwrap_or(ChatGPTEngine::Gpt35Turbo);

        let timeout = match lookup("QUIZ_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    name: "QUIZ_TIMEOUT_SECS",
                    value,
                })?,
            None => Duration::from_secs(15),
        };

        Ok(Self {
            chatgpt_api_key,
            model,
            timeout,
            credentials_path: lookup("CREDENTIALS_PATH")
                .unwrap_or_else(|| "credentials.toml".to_string())
                .into(),
            dialogue_db: lookup("DIALOGUE_DB").unwrap_or_else(|| "db.sqlite".to_string()),
        })
    }
}

fn parse_engine(name: &str) -> ChatGPTEngine {
    match name {
        "gpt-3.5-turbo" => ChatGPTEngine::Gpt35Turbo,
        "gpt-4" => ChatGPTEngine::Gpt4,
        "gpt-4-32k" => ChatGPTEngine::Gpt4_32k,
        // read once at startup, so leaking is fine
        other => ChatGPTEngine::Custom(Box::leak(other.to_string().into_boxed_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[("CHATGPT_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.chatgpt_api_key, "sk-test");
        assert_eq!(config.model, ChatGPTEngine::Gpt35Turbo);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.credentials_path, PathBuf::from("credentials.toml"));
        assert_eq!(config.dialogue_db, "db.sqlite");
    }

    #[test]
    fn api_key_is_required() {
        assert!(matches!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("CHATGPT_API_KEY"))
        ));
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CHATGPT_API_KEY", "sk-test"),
            ("QUIZ_MODEL", "gpt-4"),
            ("QUIZ_TIMEOUT_SECS", "30"),
            ("CREDENTIALS_PATH", "/etc/quiz/users.toml"),
        ]))
        .unwrap();
        assert_eq!(config.model, ChatGPTEngine::Gpt4);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.credentials_path, PathBuf::from("/etc/quiz/users.toml"));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("CHATGPT_API_KEY", "sk-test"),
            ("QUIZ_TIMEOUT_SECS", "soon"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { name: "QUIZ_TIMEOUT_SECS", .. })));
    }
}
