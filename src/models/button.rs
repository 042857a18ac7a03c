//! Button hints for the macro pad, derived from the current mode.
//!
//! Nothing here is stored: the record is recomputed from the mode on every
//! state read.

use serde::Serialize;

use super::UiMode;

/// Hints for the mode-toggle button on the companion device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonConfig {
    pub shift_tab_icon: &'static str,
    pub shift_tab_label: &'static str,
    pub shift_tab_enabled: bool,
    pub context_hint: &'static str,
}

/// Record used for modes without an entry in the table (currently `unknown`).
pub const DEFAULT_BUTTON: ButtonConfig = ButtonConfig {
    shift_tab_icon: "default",
    shift_tab_label: "Normal",
    shift_tab_enabled: true,
    context_hint: "",
};

/// (mode, icon, label, context hint). Every mapped mode keeps the button enabled.
const BUTTON_TABLE: &[(UiMode, &str, &str, &str)] = &[
    (UiMode::AutoAccept, "auto-accept", "Auto", "Auto-accept mode active"),
    (UiMode::Plan, "plan", "Plan", "Plan mode active"),
    (UiMode::ExitConfirm, "warning", "Exit?", "Press Ctrl+C again to exit"),
    (UiMode::Confirmation, "confirm", "Confirm", "Confirmation required"),
    (UiMode::Choice, "choose", "Choose", "Selection required"),
    (UiMode::Thinking, "default", "Normal", "Claude is thinking..."),
    (UiMode::Error, "error", "Error", "Error state"),
    (UiMode::Startup, "startup", "Start", "Claude Code starting up"),
    (UiMode::Interactive, "interactive", "Ready", "Ready for input"),
];

impl ButtonConfig {
    pub fn for_mode(mode: UiMode) -> Self {
        BUTTON_TABLE
            .iter()
            .find(|(m, ..)| *m == mode)
            .map(|&(_, icon, label, hint)| ButtonConfig {
                shift_tab_icon: icon,
                shift_tab_label: label,
                context_hint: hint,
                ..DEFAULT_BUTTON
            })
            .unwrap_or(DEFAULT_BUTTON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mode_uses_default_record() {
        assert_eq!(ButtonConfig::for_mode(UiMode::Unknown), DEFAULT_BUTTON);
    }

    #[test]
    fn test_auto_accept_button() {
        let config = ButtonConfig::for_mode(UiMode::AutoAccept);
        assert_eq!(config.shift_tab_icon, "auto-accept");
        assert_eq!(config.shift_tab_label, "Auto");
        assert_eq!(config.context_hint, "Auto-accept mode active");
        assert!(config.shift_tab_enabled);
    }

    #[test]
    fn test_thinking_keeps_default_icon() {
        let config = ButtonConfig::for_mode(UiMode::Thinking);
        assert_eq!(config.shift_tab_icon, "default");
        assert_eq!(config.shift_tab_label, "Normal");
        assert_eq!(config.context_hint, "Claude is thinking...");
    }

    #[test]
    fn test_every_known_mode_is_mapped() {
        for (mode, ..) in BUTTON_TABLE {
            assert_ne!(*mode, UiMode::Unknown);
            assert_ne!(ButtonConfig::for_mode(*mode), DEFAULT_BUTTON);
        }
        assert_eq!(BUTTON_TABLE.len(), 9);
    }

    #[test]
    fn test_button_config_json_shape() {
        let json = serde_json::to_value(ButtonConfig::for_mode(UiMode::Plan)).unwrap();
        assert_eq!(json["shift_tab_icon"], "plan");
        assert_eq!(json["shift_tab_label"], "Plan");
        assert_eq!(json["shift_tab_enabled"], true);
        assert_eq!(json["context_hint"], "Plan mode active");
    }
}
