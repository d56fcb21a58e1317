use serde::{Deserialize, Serialize};

use crate::ads::{AdSlotRenderer, AD_SIZES, AD_UNIT_PATH};
use crate::conversation::{Conversation, Entry};

// ---- /api/chat ----

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurnBody>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatTurnBody {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
}

// ---- /api/chatkit/* ----

#[derive(Debug, Default, Deserialize)]
pub struct SessionRequest {
    #[serde(default, rename = "deviceId")]
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    #[serde(default, rename = "threadId")]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ThreadItemsResponse {
    #[serde(rename = "userCount")]
    pub user_count: usize,
}

// ---- /api/conversation ----

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    #[serde(default, rename = "deviceId")]
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default, rename = "deviceId")]
    pub device_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AttachRequest {
    #[serde(default, rename = "deviceId")]
    pub device_id: Option<String>,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DetachRequest {
    #[serde(default, rename = "deviceId")]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    pub transcript: TranscriptView,
}

// What the shell renders: the interleaved transcript plus the counters the
// ad cadence is derived from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptView {
    pub entries: Vec<EntryView>,
    pub user_count: usize,
    pub ad_count: usize,
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_user_count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryView {
    Message {
        id: String,
        role: String,
        text: String,
    },
    Ad {
        id: String,
        index: u32,
        #[serde(rename = "divId")]
        div_id: String,
        #[serde(rename = "adUnitPath")]
        ad_unit_path: &'static str,
        sizes: &'static [[u32; 2]],
    },
}

impl TranscriptView {
    pub fn from_state(
        conversation: &Conversation,
        ads: &AdSlotRenderer,
        upstream_user_count: Option<usize>,
    ) -> Self {
        let entries = conversation
            .entries()
            .iter()
            .map(|entry| match entry {
                Entry::Message(message) => EntryView::Message {
                    id: message.id.clone(),
                    role: message.role.to_string(),
                    text: message.text.clone(),
                },
                Entry::Ad(placement) => EntryView::Ad {
                    id: placement.id.clone(),
                    index: placement.position_index,
                    div_id: ads
                        .slot_for(placement.position_index)
                        .map(|slot| slot.div_id.clone())
                        .unwrap_or_default(),
                    ad_unit_path: AD_UNIT_PATH,
                    sizes: &AD_SIZES,
                },
            })
            .collect();

        Self {
            entries,
            user_count: conversation.user_count(),
            ad_count: conversation.ad_count(),
            busy: conversation.is_in_flight(),
            status: conversation.status().map(str::to_string),
            upstream_user_count,
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            user_count: 0,
            ad_count: 0,
            busy: false,
            status: None,
            upstream_user_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::LogAdNetwork;
    use crate::conversation::ExchangeOutcome;
    use std::sync::Arc;

    fn populated_state() -> (Conversation, AdSlotRenderer) {
        let mut conversation = Conversation::new();
        for n in 1..=3 {
            conversation
                .begin_exchange(&format!("mensagem {n}"))
                .expect("send");
            conversation.complete_exchange(ExchangeOutcome::Reply(format!("resposta {n}")));
        }
        let mut ads = AdSlotRenderer::new(Arc::new(LogAdNetwork));
        ads.sync(conversation.placements());
        (conversation, ads)
    }

    #[test]
    fn view_interleaves_messages_and_ad_cards() {
        let (conversation, ads) = populated_state();
        let view = TranscriptView::from_state(&conversation, &ads, None);

        assert_eq!(view.user_count, 3);
        assert_eq!(view.ad_count, 1);
        assert!(!view.busy);
        assert_eq!(view.entries.len(), 7);

        match &view.entries[5] {
            EntryView::Ad {
                index,
                div_id,
                ad_unit_path,
                ..
            } => {
                assert_eq!(*index, 1);
                assert!(div_id.starts_with("div-gpt-ad-"));
                assert_eq!(*ad_unit_path, AD_UNIT_PATH);
            }
            other => panic!("expected ad entry, got {other:?}"),
        }
    }

    #[test]
    fn view_serializes_with_client_field_names() {
        let (conversation, ads) = populated_state();
        let view = TranscriptView::from_state(&conversation, &ads, Some(5));
        let value = serde_json::to_value(&view).expect("serialize");

        assert_eq!(value["userCount"], 3);
        assert_eq!(value["adCount"], 1);
        assert_eq!(value["upstreamUserCount"], 5);
        assert_eq!(value["entries"][0]["type"], "message");
        assert_eq!(value["entries"][0]["role"], "user");
        assert_eq!(value["entries"][5]["type"], "ad");
        assert_eq!(value["entries"][5]["adUnitPath"], AD_UNIT_PATH);
        assert_eq!(value["entries"][5]["sizes"][1], serde_json::json!([300, 250]));
    }

    #[test]
    fn empty_view_has_no_status_field() {
        let value = serde_json::to_value(TranscriptView::empty()).expect("serialize");
        assert!(value.get("status").is_none());
        assert_eq!(value["entries"], serde_json::json!([]));
    }
}
