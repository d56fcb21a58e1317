use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::UpstreamConfig;
use crate::conversation::ChatTurn;
use crate::error::ApiError;

pub mod poll;
pub mod session;
pub mod thread;

// Carla's voice, prepended to every completion exchange.
pub const PERSONA_INSTRUCTION: &str = "Você é a Carla. Responda de forma natural, amigável e direta. Mantenha o tom de conversa do WhatsApp, com frases curtas quando fizer sentido. Você é 24/7 e nunca diz que está offline.";

pub const CHAT_TEMPERATURE: f32 = 0.8;

// One exchange gets this long end to end; expiry aborts the request.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

pub const CHATKIT_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "chatkit_beta=v1");

// A thin client over the hosted chat API
pub struct UpstreamClient {
    http: Client,
}

impl UpstreamClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    // Sends the persona plus the full transcript and returns the first
    // choice's trimmed text. No retry, no backoff.
    pub async fn complete(
        &self,
        config: &UpstreamConfig,
        turns: &[ChatTurn],
    ) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", config.base_url);

        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(json!({ "role": "system", "content": PERSONA_INSTRUCTION }));
        for turn in turns {
            messages.push(json!({ "role": turn.role.to_string(), "content": turn.text }));
        }

        let payload = json!({
            "model": config.model,
            "temperature": CHAT_TEMPERATURE,
            "messages": messages,
        });
        debug!("completion request with {} turns", turns.len());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&config.api_key)
            .timeout(EXCHANGE_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let details =
                serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                details,
            });
        }

        let payload: Value = response.json().await?;
        Ok(extract_reply(&payload))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

// Shared handle for app state
pub struct UpstreamManager {
    pub client: Arc<UpstreamClient>,
}

impl UpstreamManager {
    pub fn new() -> Self {
        Self {
            client: Arc::new(UpstreamClient::new()),
        }
    }
}

impl Default for UpstreamManager {
    fn default() -> Self {
        Self::new()
    }
}

// First choice's trimmed text, or empty when the shape is off.
pub fn extract_reply(payload: &Value) -> String {
    payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|content| content.trim().to_string())
        .unwrap_or_default()
}
