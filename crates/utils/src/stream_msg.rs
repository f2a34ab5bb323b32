use axum::extract::ws::Message;
use json_patch::Patch;
use serde::{Deserialize, Serialize};

pub const EV_JSON_PATCH: &str = "json_patch";
pub const EV_REFRESH_REQUIRED: &str = "refresh_required";
pub const EV_FINISHED: &str = "finished";

/// A message on one of the live UI streams (board, notification feed).
///
/// Clients hold a JSON document (the board or the feed) and apply every
/// `JsonPatch` to it in order. `RefreshRequired` tells them to refetch over
/// REST because the stream fell behind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StreamMsg {
    JsonPatch(Patch),
    RefreshRequired { reason: String },
    Finished,
}

impl StreamMsg {
    pub fn name(&self) -> &'static str {
        match self {
            StreamMsg::JsonPatch(_) => EV_JSON_PATCH,
            StreamMsg::RefreshRequired { .. } => EV_REFRESH_REQUIRED,
            StreamMsg::Finished => EV_FINISHED,
        }
    }

    /// Never fails; control messages get a flat shape the frontend can check
    /// without unwrapping the enum.
    pub fn to_ws_message_unchecked(&self) -> Message {
        let json = match self {
            StreamMsg::Finished => r#"{"finished":true}"#.to_string(),
            StreamMsg::RefreshRequired { reason } => serde_json::json!({
                "refresh_required": true,
                "reason": reason,
            })
            .to_string(),
            StreamMsg::JsonPatch(_) => serde_json::to_string(self)
                .unwrap_or_else(|_| r#"{"error":"serialization_failed"}"#.to_string()),
        };

        Message::Text(json.into())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_required_escapes_reason() {
        let msg = StreamMsg::RefreshRequired {
            reason: r#"lagged "3" messages"#.to_string(),
        };
        let Message::Text(text) = msg.to_ws_message_unchecked() else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["refresh_required"], true);
        assert_eq!(value["reason"], r#"lagged "3" messages"#);
    }

    #[test]
    fn test_patch_message_is_tagged() {
        let patch: Patch = serde_json::from_value(serde_json::json!([
            {"op": "remove", "path": "/tasks/abc"}
        ]))
        .unwrap();
        let msg = StreamMsg::JsonPatch(patch);
        assert_eq!(msg.name(), EV_JSON_PATCH);
        let Message::Text(text) = msg.to_ws_message_unchecked() else {
            panic!("expected text frame");
        };
        assert!(text.as_str().starts_with(r#"{"JsonPatch":"#));
    }
}
