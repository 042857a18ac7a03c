//! Enums shared between the classifier and the control surface.

use serde::Serialize;

/// Best guess at which UI state the child is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiMode {
    #[default]
    Unknown,      // Nothing recognized yet
    Startup,      // Welcome banner
    Interactive,  // Prompt ready for input
    Plan,         // Plan mode toggled on
    AutoAccept,   // Auto-accept edits toggled on
    Confirmation, // y/n style question
    Choice,       // Numbered selection list
    Thinking,     // Working on a response
    Error,        // Error or failure text seen
    ExitConfirm,  // "Press Ctrl-C again to exit"
}

impl UiMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiMode::Unknown => "unknown",
            UiMode::Startup => "startup",
            UiMode::Interactive => "interactive",
            UiMode::Plan => "plan",
            UiMode::AutoAccept => "auto-accept",
            UiMode::Confirmation => "confirmation",
            UiMode::Choice => "choice",
            UiMode::Thinking => "thinking",
            UiMode::Error => "error",
            UiMode::ExitConfirm => "exit-confirm",
        }
    }
}

impl std::fmt::Display for UiMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_mode_default() {
        assert_eq!(UiMode::default(), UiMode::Unknown);
    }

    #[test]
    fn test_ui_mode_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&UiMode::AutoAccept).unwrap(), "\"auto-accept\"");
        assert_eq!(serde_json::to_string(&UiMode::ExitConfirm).unwrap(), "\"exit-confirm\"");
        assert_eq!(serde_json::to_string(&UiMode::Plan).unwrap(), "\"plan\"");
    }

    #[test]
    fn test_ui_mode_label_matches_serde() {
        for mode in [
            UiMode::Unknown,
            UiMode::Startup,
            UiMode::Interactive,
            UiMode::Plan,
            UiMode::AutoAccept,
            UiMode::Confirmation,
            UiMode::Choice,
            UiMode::Thinking,
            UiMode::Error,
            UiMode::ExitConfirm,
        ] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode));
        }
    }
}
