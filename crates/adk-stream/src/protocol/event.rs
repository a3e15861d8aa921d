use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The JSON payload carried by one `data:` line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    #[serde(default)]
    pub content: Option<EventContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContent {
    #[serde(default)]
    pub parts: Vec<EventPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Each field is independently optional; a single part may carry all three.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<WireFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<WireFunctionResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireFunctionCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireFunctionResponse {
    #[serde(default)]
    pub id: String,
    // ADK servers name this field `response`
    #[serde(default, alias = "response")]
    pub result: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_event() -> anyhow::Result<()> {
        let event: StreamEvent =
            serde_json::from_str(r#"{"content":{"parts":[{"text":"Hi"}],"role":"model"}}"#)?;
        let content = event.content.expect("content");
        assert_eq!(content.role.as_deref(), Some("model"));
        assert_eq!(content.parts[0].text.as_deref(), Some("Hi"));
        assert!(event.finish_reason.is_none());
        Ok(())
    }

    #[test]
    fn test_parse_function_parts() -> anyhow::Result<()> {
        let event: StreamEvent = serde_json::from_value(json!({
            "content": {
                "parts": [
                    {"functionCall": {"id": "c1", "name": "lookup", "args": {"q": "rust"}}},
                    {"functionResponse": {"id": "c1", "response": {"hits": 3}}}
                ],
                "role": "model"
            },
            "finishReason": "STOP"
        }))?;

        let parts = &event.content.as_ref().expect("content").parts;
        let call = parts[0].function_call.as_ref().expect("call");
        assert_eq!(call.name, "lookup");
        assert_eq!(call.args.get("q"), Some(&json!("rust")));
        let response = parts[1].function_response.as_ref().expect("response");
        assert_eq!(response.result, json!({"hits": 3}));
        assert_eq!(event.finish_reason.as_deref(), Some("STOP"));
        Ok(())
    }

    #[test]
    fn test_missing_args_default_to_empty() -> anyhow::Result<()> {
        let part: EventPart = serde_json::from_value(json!({
            "functionCall": {"id": "c1", "name": "ping"}
        }))?;
        assert!(part.function_call.expect("call").args.is_empty());
        Ok(())
    }
}
