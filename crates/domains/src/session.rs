//! Server-side session state and one-request flash messages.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

/// Everything persisted per browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub flash: Vec<FlashMessage>,
    /// Where to send the user after logging in.
    pub return_to: Option<String>,
    /// CSRF token for an OAuth round trip in progress.
    pub oauth_state: Option<String>,
}

impl SessionData {
    pub fn push_flash(&mut self, kind: FlashKind, text: impl Into<String>) {
        self.flash.push(FlashMessage {
            kind,
            text: text.into(),
        });
    }

    /// Drains queued messages; they are shown exactly once.
    pub fn take_flash(&mut self) -> Vec<FlashMessage> {
        std::mem::take(&mut self.flash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_is_consumed_once() {
        let mut data = SessionData::default();
        data.push_flash(FlashKind::Error, "Invalid listing ID!");
        let first = data.take_flash();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].text, "Invalid listing ID!");
        assert!(data.take_flash().is_empty());
    }

    #[test]
    fn session_data_survives_json() {
        let mut data = SessionData {
            user_id: Some(Uuid::now_v7()),
            ..Default::default()
        };
        data.push_flash(FlashKind::Success, "Welcome back to Wanderlust!");
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["flash"][0]["kind"], "success");
        let back: SessionData = serde_json::from_value(value).unwrap();
        assert_eq!(back, data);
    }
}
