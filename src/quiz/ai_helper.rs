use std::future::Future;
use std::time::Duration;

use chatgpt::client::ChatGPT;
use chatgpt::err::Error as ChatGptError;
use chatgpt::types::CompletionResponse;
use log::{debug, error, info, warn};

use crate::quiz::prompt::SYSTEM_INSTRUCTION;

pub const MAX_RETRIES: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_secs(2);
pub const TEMPERATURE: f32 = 1.0;
pub const MAX_TOKENS: u32 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("transient backend error: {0}")]
    Transient(String),
    #[error("backend error: {0}")]
    Permanent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation aborted: {0}")]
    Permanent(String),
    #[error("gave up after {attempts} attempts, last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Anything that can turn a prompt into text.
pub trait TextBackend {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with the given 0-based index.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

pub struct QuizHelper<B> {
    backend: B,
    retry: RetryPolicy,
}

impl<B: TextBackend> QuizHelper<B> {
    pub fn new(backend: B) -> Self {
        Self::with_retry_policy(backend, RetryPolicy::default())
    }

    pub fn with_retry_policy(backend: B, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Sends the prompt to the backend, retrying transient failures with
    /// exponential backoff. Permanent failures are returned at once.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            system: SYSTEM_INSTRUCTION.to_string(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };
        debug!("Generated prompt: {}", prompt);

        let mut last_error = String::new();
        for attempt in 0..self.retry.max_attempts {
            match self.backend.generate(&request).await {
                Ok(text) => {
                    info!("Received question text on attempt {}", attempt + 1);
                    return Ok(text);
                }
                Err(BackendError::Transient(message)) => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "Backend error on attempt {}: {}. Retrying in {:?}",
                        attempt + 1,
                        message,
                        delay
                    );
                    last_error = message;
                    tokio::time::sleep(delay).await;
                }
                Err(BackendError::Permanent(message)) => {
                    error!("Backend error, not retrying: {}", message);
                    return Err(GenerationError::Permanent(message));
                }
            }
        }

        error!("No question text after {} attempts", self.retry.max_attempts);
        Err(GenerationError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            last_error,
        })
    }
}

/// OpenAI chat completions through `chatgpt_rs`.
pub struct ChatGptBackend {
    chat_gpt: ChatGPT,
}

impl ChatGptBackend {
    /// The client's model, timeout and sampling settings come from its config;
    /// temperature and token limit are overwritten per request.
    pub fn new(chat_gpt: ChatGPT) -> Self {
        Self { chat_gpt }
    }
}

impl TextBackend for ChatGptBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let mut client = self.chat_gpt.clone();
        client.config.temperature = request.temperature;
        client.config.max_tokens = Some(request.max_tokens);

        let mut conversation = client.new_conversation_directed(request.system.clone());
        let response: CompletionResponse = conversation
            .send_message(request.prompt.clone())
            .await
            .map_err(classify_chat_gpt_error)?;

        let content = response.message().clone().content;
        debug!("Completion: {:?}", content);
        Ok(content)
    }
}

const PERMANENT_ERROR_TYPES: [&str; 4] = [
    "invalid_request_error",
    "authentication_error",
    "permission_error",
    "insufficient_quota",
];

fn classify_chat_gpt_error(err: ChatGptError) -> BackendError {
    match err {
        ChatGptError::BackendError {
            message,
            error_type,
        } => {
            let message = format!("{error_type}: {message}");
            if PERMANENT_ERROR_TYPES.contains(&error_type.as_str()) {
                BackendError::Permanent(message)
            } else {
                BackendError::Transient(message)
            }
        }
        ChatGptError::ClientError(e) if e.is_timeout() || e.is_connect() => {
            BackendError::Transient(e.to_string())
        }
        other => BackendError::Permanent(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays canned results in order and counts calls.
    pub(crate) struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, BackendError>>>,
        pub(crate) calls: AtomicU32,
        pub(crate) last_request: Mutex<Option<GenerationRequest>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(replies: Vec<Result<String, BackendError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
                last_request: Mutex::new(None),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextBackend for ScriptedBackend {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Transient("rate limited".to_string())))
        }
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(2));
        assert_eq!(policy.delay(1), Duration::from_secs(4));
        assert_eq!(policy.delay(2), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_exhaust_retries() {
        let helper = QuizHelper::new(ScriptedBackend::new(Vec::new()));
        let started = tokio::time::Instant::now();

        let result = helper.generate("prompt").await;

        assert_eq!(helper.backend().calls(), MAX_RETRIES);
        assert_eq!(
            result,
            Err(GenerationError::RetriesExhausted {
                attempts: 3,
                last_error: "rate limited".to_string()
            })
        );
        assert!(started.elapsed() >= Duration::from_secs(14));
        assert!(started.elapsed() < Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_aborts_immediately() {
        let helper = QuizHelper::new(ScriptedBackend::new(vec![Err(BackendError::Permanent(
            "bad request".to_string(),
        ))]));
        let started = tokio::time::Instant::now();

        let result = helper.generate("prompt").await;

        assert_eq!(helper.backend().calls(), 1);
        assert_eq!(result, Err(GenerationError::Permanent("bad request".to_string())));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_a_transient_error() {
        let helper = QuizHelper::new(ScriptedBackend::new(vec![
            Err(BackendError::Transient("timeout".to_string())),
            Ok("{}".to_string()),
        ]));
        let started = tokio::time::Instant::now();

        assert_eq!(helper.generate("prompt").await, Ok("{}".to_string()));
        assert_eq!(helper.backend().calls(), 2);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn request_carries_sampling_settings() {
        let helper = QuizHelper::new(ScriptedBackend::new(vec![Ok("text".to_string())]));
        helper.generate("Ask about Space").await.unwrap();

        let request = helper.backend().last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.prompt, "Ask about Space");
        assert_eq!(request.system, SYSTEM_INSTRUCTION);
        assert_eq!(request.temperature, 1.0);
        assert_eq!(request.max_tokens, 300);
    }

    #[test]
    fn invalid_requests_are_permanent() {
        let err = ChatGptError::BackendError {
            message: "bad model".to_string(),
            error_type: "invalid_request_error".to_string(),
        };
        assert!(matches!(classify_chat_gpt_error(err), BackendError::Permanent(_)));

        let err = ChatGptError::BackendError {
            message: "slow down".to_string(),
            error_type: "requests".to_string(),
        };
        assert!(matches!(classify_chat_gpt_error(err), BackendError::Transient(_)));
    }
}
