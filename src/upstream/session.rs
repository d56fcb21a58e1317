use log::info;
use serde_json::{json, Value};

use crate::config::UpstreamConfig;
use crate::error::ApiError;
use crate::upstream::{UpstreamClient, CHATKIT_BETA_HEADER};

// Fallback identity when the client never sent a device id.
pub const ANONYMOUS_DEVICE: &str = "anonymous";

impl UpstreamClient {
    // Provisions a short-lived session credential for the embedded chat
    // widget, keyed by the caller's device identifier. The upstream JSON is
    // handed back verbatim so the widget sees exactly what the provider sent.
    pub async fn create_session(
        &self,
        config: &UpstreamConfig,
        device_id: &str,
    ) -> Result<Value, ApiError> {
        let workflow_id = config.require_workflow()?;
        let url = format!("{}/v1/chatkit/sessions", config.base_url);
        let payload = json!({
            "workflow": { "id": workflow_id },
            "user": device_id,
        });

        info!("creating chat session for device {}", device_id);
        let response = self
            .http()
            .post(&url)
            .header(CHATKIT_BETA_HEADER.0, CHATKIT_BETA_HEADER.1)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                details: body,
            });
        }
        Ok(body)
    }
}

// Trims the client-supplied id and falls back to the anonymous sentinel.
pub fn normalize_device_id(device_id: Option<&str>) -> String {
    device_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| ANONYMOUS_DEVICE.to_string())
}
