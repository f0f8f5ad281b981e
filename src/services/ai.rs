use crate::error::AiError;
use crate::model::settings::AppSettings;

use rand::{thread_rng, Rng};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use std::{thread, time::Duration};

pub const API_KEY_ENV: &str = "TIENICH_API_KEY";

/// Upper bound for `max_attempts`; with the doubling backoff the last wait is
/// already `base * 2^8`.
pub const MAX_ATTEMPTS: usize = 10;

const SYSTEM_MESSAGE: &str =
    "You are a careful assistant for a Vietnamese utility app. Follow the output format exactly.";

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl AiConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        let api_key = if settings.api_key.trim().is_empty() {
            std::env::var(API_KEY_ENV).unwrap_or_default()
        } else {
            settings.api_key.clone()
        };

        Self {
            provider: settings.provider.clone(),
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            timeout_secs: settings.timeout_secs,
            temperature: settings.temperature,
        }
    }
}

/// The remote text-completion call: prompt in, free text out.
pub trait Completer {
    fn complete(&mut self, prompt: &str) -> Result<String, AiError>;
}

pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter_ms: 200,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.clamp(1, MAX_ATTEMPTS),
            base_delay: Duration::from_millis(settings.backoff_base_ms),
            jitter_ms: settings.backoff_jitter_ms,
        }
    }

    /// Delay after the failed 0-based `attempt`: `base * 2^attempt` plus jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            thread_rng().gen_range(0..self.jitter_ms)
        } else {
            0
        };
        let factor = 2_u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
        self.base_delay.saturating_mul(factor) + Duration::from_millis(jitter)
    }
}

/// Calls the completer until it succeeds or the policy runs out of attempts.
///
/// Every error is retried. The last error is returned when exhausted.
pub fn complete_with_retry(
    completer: &mut dyn Completer,
    sleeper: &mut dyn Sleeper,
    prompt: &str,
    policy: &RetryPolicy,
) -> Result<String, AiError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_err: Option<AiError> = None;

    for attempt in 0..attempts {
        match completer.complete(prompt) {
            Ok(text) => return Ok(text),
            Err(err) => {
                warn!(attempt = attempt + 1, of = attempts, error = %err, "completion failed");
                last_err = Some(err);

                if attempt + 1 < attempts {
                    let delay = policy.backoff(attempt);
                    debug!(?delay, "backing off");
                    sleeper.sleep(delay);
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| AiError::Transport("no attempt made".into())))
}

fn endpoint_for(provider: &str, base_url: &str) -> Result<String, AiError> {
    let base = base_url.trim();
    if !base.is_empty() {
        return Ok(format!("{}/chat/completions", base.trim_end_matches('/')));
    }

    match provider {
        "openai" => Ok("https://api.openai.com/v1/chat/completions".into()),
        "deepseek" => Ok("https://api.deepseek.com/v1/chat/completions".into()),
        other => Err(AiError::Config(format!(
            "unsupported provider `{other}` (set base_url for custom servers)"
        ))),
    }
}

/// OpenAI-compatible chat-completions client.
pub struct HttpCompleter {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl HttpCompleter {
    pub fn new(cfg: &AiConfig) -> Result<Self, AiError> {
        if cfg.model.trim().is_empty() {
            return Err(AiError::Config("model is required".into()));
        }
        let endpoint = endpoint_for(&cfg.provider, &cfg.base_url)?;
        if cfg.api_key.trim().is_empty() && cfg.base_url.trim().is_empty() {
            return Err(AiError::Config(format!(
                "api_key is required (or set {API_KEY_ENV})"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| AiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }
}

impl Completer for HttpCompleter {
    fn complete(&mut self, prompt: &str) -> Result<String, AiError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_MESSAGE },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().map_err(|e| AiError::Transport(e.to_string()))?;
        let status = resp.status();

        // Read as text first so an error body is not lost when it is not JSON.
        let text = resp.text().map_err(|e| AiError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AiError::Http {
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        content_of(&text)
    }
}

fn content_of(body: &str) -> Result<String, AiError> {
    let v: Value = serde_json::from_str(body)
        .map_err(|_| AiError::InvalidResponse("invalid JSON from AI".into()))?;

    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|t| t.trim().to_string())
        .ok_or_else(|| AiError::InvalidResponse("missing choices[0].message.content".into()))
}

fn extract_error_message(body_text: &str) -> String {
    // { "error": { "message": "..." } } or { "message": "..." }
    if let Ok(v) = serde_json::from_str::<Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    let trimmed = body_text.trim();
    if trimmed.chars().count() > 400 {
        format!("{}...", trimmed.chars().take(400).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
