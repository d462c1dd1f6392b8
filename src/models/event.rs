//! Events surfaced by the in-pod runner while a test is executing

use serde::{Deserialize, Serialize};
use std::fmt;

/// A progress, log or command event from the pod
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

fn default_kind() -> String {
    "log".to_string()
}

impl CommandEvent {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            payload: None,
        }
    }

    /// Decode an event endpoint answer.
    ///
    /// The endpoint answers with nothing, a single event or a list of events.
    pub fn parse_body(body: &str) -> Result<Vec<Self>, serde_json::Error> {
        let body = body.trim();
        if body.is_empty() || body == "null" {
            return Ok(Vec::new());
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Body {
            Many(Vec<CommandEvent>),
            One(CommandEvent),
        }

        match serde_json::from_str(body)? {
            Body::Many(events) => Ok(events),
            Body::One(event) => Ok(vec![event]),
        }
    }
}

impl fmt::Display for CommandEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert!(CommandEvent::parse_body("").unwrap().is_empty());
        assert!(CommandEvent::parse_body("  null ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_single_and_list() {
        let one = CommandEvent::parse_body(r#"{"kind":"progress","message":"50%"}"#).unwrap();
        assert_eq!(one, vec![CommandEvent::new("progress", "50%")]);

        let many =
            CommandEvent::parse_body(r#"[{"message":"a"},{"kind":"log","message":"b"}]"#).unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[0].kind, "log");
        assert_eq!(many[1].to_string(), "[log] b");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(CommandEvent::parse_body("<html>").is_err());
    }
}
