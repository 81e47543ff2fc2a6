//! Messages crossing the frame isolation boundary
//!
//! Every message carries a `source` discriminator. Receivers parse posted
//! JSON with [`FrameMessage::from_post`], which drops anything without one
//! of the known tags.

use serde::{Deserialize, Serialize};
use tracing::trace;

pub const FRAME_ERROR_SOURCE: &str = "Playroom Frame Error";
pub const FRAME_SCREENSHOT_SOURCE: &str = "Playroom Frame Screenshot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotAction {
    Copy,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source")]
pub enum FrameMessage {
    /// Sent by a frame when its evaluator reports or clears an error
    #[serde(rename = "Playroom Frame Error")]
    Error {
        message: String,
        #[serde(rename = "delayVisibility")]
        delay_visibility: bool,
    },
    #[serde(rename = "Playroom Frame Screenshot")]
    Screenshot {
        action: ScreenshotAction,
        #[serde(rename = "fileName")]
        file_name: String,
    },
}

impl FrameMessage {
    pub fn error(message: impl Into<String>, delay_visibility: bool) -> Self {
        Self::Error {
            message: message.into(),
            delay_visibility,
        }
    }

    pub fn to_post(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Parse a posted message, ignoring foreign or malformed ones
    pub fn from_post(data: &serde_json::Value) -> Option<Self> {
        let source = data.get("source").and_then(|s| s.as_str());
        match source {
            Some(FRAME_ERROR_SOURCE) | Some(FRAME_SCREENSHOT_SOURCE) => {
                match serde_json::from_value(data.clone()) {
                    Ok(message) => Some(message),
                    Err(e) => {
                        trace!("Ignoring malformed frame message: {}", e);
                        None
                    }
                }
            }
            _ => {
                trace!("Ignoring message with foreign source: {:?}", source);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_wire_format() {
        let message = FrameMessage::error("ReferenceError: Foo is not defined", true);
        assert_eq!(
            message.to_post(),
            json!({
                "source": "Playroom Frame Error",
                "message": "ReferenceError: Foo is not defined",
                "delayVisibility": true
            })
        );
    }

    #[test]
    fn test_screenshot_parsed() {
        let data = json!({
            "source": "Playroom Frame Screenshot",
            "action": "download",
            "fileName": "light-320.png"
        });
        assert_eq!(
            FrameMessage::from_post(&data),
            Some(FrameMessage::Screenshot {
                action: ScreenshotAction::Download,
                file_name: "light-320.png".into()
            })
        );
    }

    #[test]
    fn test_foreign_and_untagged_ignored() {
        assert_eq!(FrameMessage::from_post(&json!({"message": "hi"})), None);
        assert_eq!(
            FrameMessage::from_post(&json!({"source": "react-devtools", "message": "hi"})),
            None
        );
        assert_eq!(FrameMessage::from_post(&json!("Playroom Frame Error")), None);
    }

    #[test]
    fn test_tagged_but_malformed_ignored() {
        let data = json!({"source": "Playroom Frame Error", "message": 42});
        assert_eq!(FrameMessage::from_post(&data), None);
    }
}
