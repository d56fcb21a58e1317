use std::env;

use crate::error::ApiError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

// Upstream credentials and identifiers, read from the environment at request
// time so a fixed deployment can be reconfigured without a restart.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub workflow_id: Option<String>,
}

impl UpstreamConfig {
    pub fn from_env() -> Result<Self, ApiError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ApiError::MissingConfig("OPENAI_API_KEY"))?;

        let model = env::var("OPENAI_MODEL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let workflow_id = env::var("WORKFLOW_ID")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Ok(Self {
            api_key,
            model,
            base_url,
            workflow_id,
        })
    }

    // The workflow reference is only needed by session provisioning, so its
    // absence is reported there rather than failing every endpoint.
    pub fn require_workflow(&self) -> Result<&str, ApiError> {
        self.workflow_id
            .as_deref()
            .ok_or(ApiError::MissingConfig("WORKFLOW_ID"))
    }
}
