use serde::Deserialize;
use serde::Serialize;

/// Body of `POST /v1/chat/completions`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ClientMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClientRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientMessage {
    pub role: ClientRole,
    /// `None` when the caller sent `null` or omitted the field, which happens
    /// for assistant turns that only carried tool calls.
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// Message content is either a bare string or an ordered list of parts.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
    /// Any part type this gateway does not understand (audio, files, ...).
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AssistantMessage {
    pub role: ClientRole,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ClientUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Non-streaming reply to `POST /v1/chat/completions`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientUnaryResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: ClientUsage,
}

impl ClientUnaryResponse {
    pub const OBJECT: &'static str = "chat.completion";
}

/// Incremental change carried by one stream chunk. Serializes to `{}` when
/// both fields are unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ClientRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    /// Always serialized; `null` until the final chunk.
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientStreamChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ClientStreamChunk {
    pub const OBJECT: &'static str = "chat.completion.chunk";

    /// Literal that closes a client event stream.
    pub const DONE_SENTINEL: &'static str = "[DONE]";
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ClientError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Envelope for every error the gateway returns.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ClientErrorBody {
    pub error: ClientError,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModelCard {
    pub id: String,
    pub object: String,
    pub owned_by: String,
}

/// Reply to `GET /v1/models`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelCard>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn content_accepts_string_and_parts() {
        let req: ClientRequest = serde_json::from_value(json!({
            "model": "m",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": [
                    {"type": "text", "text": "look"},
                    {"type": "image_url", "image_url": {"url": "https://x/y.jpg", "detail": "low"}},
                    {"type": "input_audio", "input_audio": {"data": "..."}}
                ]},
                {"role": "assistant", "content": null}
            ]
        }))
        .unwrap();

        assert!(!req.stream);
        assert_eq!(
            req.messages[0].content,
            Some(MessageContent::Text("be brief".to_string()))
        );
        assert_eq!(
            req.messages[1].content,
            Some(MessageContent::Parts(vec![
                ContentPart::Text {
                    text: "look".to_string()
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "https://x/y.jpg".to_string(),
                        detail: Some("low".to_string()),
                    }
                },
                ContentPart::Unsupported,
            ]))
        );
        assert_eq!(req.messages[2].content, None);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = serde_json::from_value::<ClientMessage>(json!({
            "role": "narrator",
            "content": "hi"
        }));
        assert!(err.is_err());
    }

    #[test]
    fn chunk_delta_serializes_sparse_fields() {
        let chunk = ClientStreamChunk {
            id: "chatcmpl-1".to_string(),
            object: ClientStreamChunk::OBJECT.to_string(),
            created: 7,
            model: "m".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta::default(),
                finish_reason: None,
            }],
        };
        assert_eq!(
            serde_json::to_value(&chunk).unwrap(),
            json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "created": 7,
                "model": "m",
                "choices": [{"index": 0, "delta": {}, "finish_reason": null}]
            })
        );
    }

    #[test]
    fn role_display_matches_wire_name() {
        assert_eq!(ClientRole::Assistant.to_string(), "assistant");
        assert_eq!(FinishReason::Stop.to_string(), "stop");
    }
}
