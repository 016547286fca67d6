use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// ==================================================================================================
// Models for /chat/completions requests
// ==================================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl ChatCompletionRequest {
    /// Build a request for one benchmark prompt. A blank system prompt is left out entirely.
    pub fn new(model: &str, system_prompt: &str, prompt: &str, max_tokens: u32) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.push(ChatMessage::user(prompt));

        Self {
            model: model.to_string(),
            messages,
            max_tokens,
        }
    }
}

// ==================================================================================================
// Models for /chat/completions responses
// ==================================================================================================
//
// Every field is optional so that deserialization only fails on a type mismatch.
// Absence is reported separately as `ProtocolError::MissingField`.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<ChatCompletionChoice>>,
}

impl ChatCompletionResponse {
    /// Build a single-choice completion (used by the mock endpoint).
    pub fn new(id: String, model: String, content: String) -> Self {
        Self {
            id: Some(id),
            object: Some("chat.completion".to_string()),
            created: Some(chrono::Utc::now().timestamp()),
            model: Some(model),
            choices: Some(vec![ChatCompletionChoice {
                index: Some(0),
                message: Some(ResponseMessage {
                    role: Some("assistant".to_string()),
                    content: Some(content),
                }),
                finish_reason: Some("stop".to_string()),
            }]),
        }
    }

    /// Parse a raw response body and extract `choices[0].message.content`.
    pub fn content_from_body(body: &[u8]) -> Result<String, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| ProtocolError::NotJson(e.to_string()))?;
        let response: ChatCompletionResponse =
            serde_json::from_value(value).map_err(|e| ProtocolError::Schema(e.to_string()))?;
        response.into_content()
    }

    /// Consume the response and return the first choice's message content.
    pub fn into_content(self) -> Result<String, ProtocolError> {
        let choices = self.choices.ok_or(ProtocolError::MissingField("choices"))?;
        let first = choices
            .into_iter()
            .next()
            .ok_or(ProtocolError::MissingField("choices[0]"))?;
        let message = first
            .message
            .ok_or(ProtocolError::MissingField("choices[0].message"))?;
        message
            .content
            .ok_or(ProtocolError::MissingField("choices[0].message.content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_includes_system_prompt() {
        let req = ChatCompletionRequest::new("local-model", "Be precise.", "2+2?", 512);
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["model"], "local-model");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Be precise.");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "2+2?");
    }

    #[test]
    fn test_request_omits_blank_system_prompt() {
        let req = ChatCompletionRequest::new("m", "   ", "hello", 16);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0], ChatMessage::user("hello"));
    }

    #[test]
    fn test_content_from_valid_body() {
        let body = br#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"42"}}]}"#;
        assert_eq!(ChatCompletionResponse::content_from_body(body).unwrap(), "42");
    }

    #[test]
    fn test_content_ignores_unknown_fields() {
        let body = br#"{"choices":[{"message":{"content":"ok","reasoning_content":"hmm"}}],"usage":{"total_tokens":3}}"#;
        assert_eq!(ChatCompletionResponse::content_from_body(body).unwrap(), "ok");
    }

    #[test]
    fn test_non_json_body() {
        let err = ChatCompletionResponse::content_from_body(b"<html>502</html>").unwrap_err();
        assert!(matches!(err, ProtocolError::NotJson(_)));
    }

    #[test]
    fn test_wrong_type_is_schema_error() {
        let err =
            ChatCompletionResponse::content_from_body(br#"{"choices":{"message":"hi"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Schema(_)));

        let err = ChatCompletionResponse::content_from_body(
            br#"{"choices":[{"message":{"content":17}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::Schema(_)));
    }

    #[test]
    fn test_missing_fields() {
        let err = ChatCompletionResponse::content_from_body(br#"{"id":"x"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("choices"));

        let err = ChatCompletionResponse::content_from_body(br#"{"choices":[]}"#).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("choices[0]"));

        let err = ChatCompletionResponse::content_from_body(br#"{"choices":[{}]}"#).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("choices[0].message"));

        let err = ChatCompletionResponse::content_from_body(
            br#"{"choices":[{"message":{"content":null}}]}"#,
        )
        .unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("choices[0].message.content"));
    }

    #[test]
    fn test_mock_response_round_trips_content() {
        let resp = ChatCompletionResponse::new("id-1".into(), "m".into(), "moths".into());
        let body = serde_json::to_vec(&resp).unwrap();
        assert_eq!(ChatCompletionResponse::content_from_body(&body).unwrap(), "moths");
    }
}
