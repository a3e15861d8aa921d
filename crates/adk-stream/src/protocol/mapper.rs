use chrono::Utc;
use serde_json::{Map, Value};

use super::event::{StreamEvent, WireFunctionCall, WireFunctionResponse};
use crate::models::content::{Fragment, FragmentBody, FunctionCall, FunctionResult};

/// Shown in place of a function result that could not be rendered
pub const UNRENDERABLE_RESULT: &str = "Error formatting response";

/// Fragments produced by one frame, plus the finish reason it carried if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedEvent {
    pub fragments: Vec<Fragment>,
    pub finish_reason: Option<String>,
}

/// Convert one event payload into fragments.
///
/// Within each part the text, call and response are mapped in that order, so one part
/// yields at most three fragments. Every fragment from the same event shares a timestamp.
pub fn map_event(event: &StreamEvent) -> MappedEvent {
    let produced_at = Utc::now().timestamp_millis();
    let mut fragments = Vec::new();

    let parts = event
        .content
        .as_ref()
        .map(|content| content.parts.as_slice())
        .unwrap_or_default();

    for part in parts {
        if let Some(text) = part.text.as_deref().filter(|text| !text.is_empty()) {
            fragments.push(Fragment::text(text).with_produced_at(produced_at));
        }

        if let Some(call) = &part.function_call {
            fragments.push(map_function_call(call).with_produced_at(produced_at));
        }

        if let Some(response) = &part.function_response {
            fragments.push(map_function_response(response).with_produced_at(produced_at));
        }
    }

    MappedEvent {
        fragments,
        finish_reason: event.finish_reason.clone(),
    }
}

fn map_function_call(call: &WireFunctionCall) -> Fragment {
    Fragment::new(
        FragmentBody::FunctionCall(FunctionCall {
            call_id: call.id.clone(),
            function_name: call.name.clone(),
            arguments: call.args.clone(),
        }),
        render_function_call(&call.name, &call.args),
    )
}

fn map_function_response(response: &WireFunctionResponse) -> Fragment {
    Fragment::new(
        FragmentBody::FunctionResult(FunctionResult {
            call_id: response.id.clone(),
            result: response.result.clone(),
        }),
        render_function_result(&response.result),
    )
}

pub fn render_function_call(name: &str, arguments: &Map<String, Value>) -> String {
    let rendered_args = if arguments.is_empty() {
        "{}".to_string()
    } else {
        serde_json::to_string_pretty(arguments).unwrap_or_else(|_| "{}".to_string())
    };
    format!("🔧 Calling function: {}\nArguments:\n{}", name, rendered_args)
}

pub fn render_function_result(result: &Value) -> String {
    let rendered = match result {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other)
            .unwrap_or_else(|_| UNRENDERABLE_RESULT.to_string()),
    };
    format!("✅ Function result:\n{}", rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::FragmentKind;
    use serde_json::json;

    fn event(value: Value) -> StreamEvent {
        serde_json::from_value(value).expect("valid event")
    }

    #[test]
    fn test_text_part() {
        let mapped = map_event(&event(json!({
            "content": {"parts": [{"text": "Hi"}], "role": "model"}
        })));
        assert_eq!(mapped.fragments.len(), 1);
        assert_eq!(mapped.fragments[0].as_text(), Some("Hi"));
        assert!(mapped.finish_reason.is_none());
    }

    #[test]
    fn test_empty_text_produces_nothing() {
        let mapped = map_event(&event(json!({
            "content": {"parts": [{"text": ""}], "role": "model"}
        })));
        assert!(mapped.fragments.is_empty());
    }

    #[test]
    fn test_function_call_with_empty_args() {
        let mapped = map_event(&event(json!({
            "content": {"parts": [{"functionCall": {"id": "c1", "name": "get_time", "args": {}}}]}
        })));
        let fragment = &mapped.fragments[0];
        assert_eq!(fragment.kind(), FragmentKind::FunctionCall);
        assert!(fragment.rendered_text.contains("get_time"));
        assert!(fragment.rendered_text.ends_with("{}"));
        assert_eq!(
            fragment.rendered_text,
            "🔧 Calling function: get_time\nArguments:\n{}"
        );
        let call = fragment.as_function_call().expect("call");
        assert_eq!(call.call_id, "c1");
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn test_function_call_args_are_pretty_printed() {
        let mapped = map_event(&event(json!({
            "content": {"parts": [{"functionCall": {"id": "c1", "name": "search", "args": {"query": "rust"}}}]}
        })));
        assert_eq!(
            mapped.fragments[0].rendered_text,
            "🔧 Calling function: search\nArguments:\n{\n  \"query\": \"rust\"\n}"
        );
    }

    #[test]
    fn test_function_result_rendering() {
        let mapped = map_event(&event(json!({
            "content": {"parts": [
                {"functionResponse": {"id": "c1", "result": "plain text"}},
                {"functionResponse": {"id": "c2", "result": {"count": 2}}}
            ]}
        })));
        assert_eq!(
            mapped.fragments[0].rendered_text,
            "✅ Function result:\nplain text"
        );
        assert_eq!(
            mapped.fragments[1].rendered_text,
            "✅ Function result:\n{\n  \"count\": 2\n}"
        );
        assert_eq!(
            mapped.fragments[1].as_function_result().expect("result").result,
            json!({"count": 2})
        );
    }

    #[test]
    fn test_part_with_all_three_fields_maps_in_order() {
        let mapped = map_event(&event(json!({
            "content": {"parts": [{
                "text": "thinking",
                "functionCall": {"id": "c1", "name": "f", "args": {}},
                "functionResponse": {"id": "c1", "result": null}
            }]},
            "finishReason": "STOP"
        })));
        let kinds: Vec<_> = mapped.fragments.iter().map(Fragment::kind).collect();
        assert_eq!(
            kinds,
            vec![
                FragmentKind::Text,
                FragmentKind::FunctionCall,
                FragmentKind::FunctionResult
            ]
        );
        assert_eq!(mapped.finish_reason.as_deref(), Some("STOP"));
        assert!(mapped
            .fragments
            .iter()
            .all(|f| f.produced_at == mapped.fragments[0].produced_at));
    }

    #[test]
    fn test_finish_reason_without_content() {
        let mapped = map_event(&event(json!({"finishReason": "MAX_TOKENS"})));
        assert!(mapped.fragments.is_empty());
        assert_eq!(mapped.finish_reason.as_deref(), Some("MAX_TOKENS"));
    }
}
