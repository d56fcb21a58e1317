use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::error::ApiError;
use crate::upstream::{UpstreamClient, CHATKIT_BETA_HEADER};

pub const THREAD_ITEMS_LIMIT: u32 = 200;
pub const THREAD_DEBUG_LIMIT: u32 = 50;
const DEBUG_SUMMARY_LEN: usize = 10;

// One thread item boiled down to what the diagnostics need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactItem {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadDebug {
    pub count: usize,
    pub summary: Vec<CompactItem>,
    pub items: Vec<CompactItem>,
}

impl UpstreamClient {
    // Counts the human-authored items of a thread; the upstream list is the
    // source of truth when the embedded widget drives the conversation.
    pub async fn fetch_user_count(
        &self,
        config: &UpstreamConfig,
        thread_id: &str,
    ) -> Result<usize, ApiError> {
        let payload = self
            .fetch_thread_items(config, thread_id, THREAD_ITEMS_LIMIT)
            .await?;
        Ok(count_user_items(&payload))
    }

    pub async fn fetch_thread_debug(
        &self,
        config: &UpstreamConfig,
        thread_id: &str,
    ) -> Result<ThreadDebug, ApiError> {
        let payload = self
            .fetch_thread_items(config, thread_id, THREAD_DEBUG_LIMIT)
            .await?;
        let items = compact_items(&payload);
        Ok(ThreadDebug {
            count: items.len(),
            summary: items.iter().take(DEBUG_SUMMARY_LEN).cloned().collect(),
            items,
        })
    }

    async fn fetch_thread_items(
        &self,
        config: &UpstreamConfig,
        thread_id: &str,
        limit: u32,
    ) -> Result<Value, ApiError> {
        let url = format!(
            "{}/v1/chatkit/threads/{}/items",
            config.base_url, thread_id
        );
        debug!("listing thread items for {}", thread_id);

        let response = self
            .http()
            .get(&url)
            .query(&[("limit", limit.to_string()), ("order", "asc".to_string())])
            .header(CHATKIT_BETA_HEADER.0, CHATKIT_BETA_HEADER.1)
            .bearer_auth(&config.api_key)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        let payload = serde_json::from_str::<Value>(&raw)
            .unwrap_or(Value::String(raw));

        if !status.is_success() {
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                details: payload,
            });
        }
        Ok(payload)
    }
}

pub fn count_user_items(payload: &Value) -> usize {
    payload
        .get("data")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("user_message"))
                .count()
        })
        .unwrap_or(0)
}

pub fn compact_items(payload: &Value) -> Vec<CompactItem> {
    let Some(items) = payload.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| CompactItem {
            id: item.get("id").and_then(Value::as_str).map(str::to_string),
            kind: item.get("type").and_then(Value::as_str).map(str::to_string),
            text: item
                .get("content")
                .and_then(Value::as_array)
                .and_then(|entries| {
                    entries
                        .iter()
                        .find_map(|entry| entry.get("text").and_then(Value::as_str))
                })
                .unwrap_or_default()
                .to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "data": [
                { "id": "itm_1", "type": "user_message", "content": [{ "type": "input_text", "text": "oi" }] },
                { "id": "itm_2", "type": "assistant_message", "content": [{ "type": "output_text", "text": "olá!" }] },
                { "id": "itm_3", "type": "user_message", "content": [] },
                { "id": "itm_4", "type": "workflow_run" },
                { "id": "itm_5", "type": "user_message", "content": [{ "type": "input_text", "text": "tudo bem?" }] }
            ]
        })
    }

    #[test]
    fn counts_only_user_messages() {
        assert_eq!(count_user_items(&sample_payload()), 3);
    }

    #[test]
    fn missing_or_malformed_data_counts_zero() {
        assert_eq!(count_user_items(&json!({})), 0);
        assert_eq!(count_user_items(&json!({ "data": "oops" })), 0);
        assert_eq!(count_user_items(&Value::Null), 0);
    }

    #[test]
    fn compacts_items_to_id_type_text() {
        let items = compact_items(&sample_payload());
        assert_eq!(items.len(), 5);
        assert_eq!(
            items[0],
            CompactItem {
                id: Some("itm_1".to_string()),
                kind: Some("user_message".to_string()),
                text: "oi".to_string(),
            }
        );
        // Items without text-bearing content come through with empty text.
        assert_eq!(items[2].text, "");
        assert_eq!(items[3].kind.as_deref(), Some("workflow_run"));
    }

    #[test]
    fn compaction_takes_first_text_bearing_entry() {
        let payload = json!({
            "data": [
                { "id": "itm_9", "type": "assistant_message", "content": [
                    { "type": "annotation" },
                    { "type": "output_text", "text": "primeira" },
                    { "type": "output_text", "text": "segunda" }
                ] }
            ]
        });
        let items = compact_items(&payload);
        assert_eq!(items[0].text, "primeira");
    }
}
