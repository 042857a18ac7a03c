//! Ordered classification rules for child output.
//!
//! Rules are evaluated top to bottom against a single chunk and the first
//! match wins. Several patterns overlap (a bare `>` appears in most frames),
//! so the order of `RULES` is the priority order.

use crate::models::UiMode;

/// Glyph that prefixes the auto-accept indicator; its chunks never count as a bare prompt.
const AUTO_ACCEPT_GLYPH: &str = "⏵⏵";

/// How a rule looks at the chunk.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Case-sensitive substring match on any of the patterns.
    Exact(&'static [&'static str]),
    /// Substring match on any of the patterns against the lowercased chunk.
    AnyLower(&'static [&'static str]),
    /// A `>` anywhere in a chunk that does not carry the auto-accept glyph.
    BareChevron,
}

/// What a matching rule changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SetMode(UiMode),
    SetModel(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub matcher: Matcher,
    pub effect: Effect,
}

impl Matcher {
    fn matches(&self, text: &str, lower: &str) -> bool {
        match self {
            Matcher::Exact(patterns) => patterns.iter().any(|p| text.contains(p)),
            Matcher::AnyLower(patterns) => patterns.iter().any(|p| lower.contains(p)),
            Matcher::BareChevron => text.contains('>') && !text.contains(AUTO_ACCEPT_GLYPH),
        }
    }
}

pub const RULES: &[Rule] = &[
    // Exact UI markers
    Rule {
        name: "auto-accept-indicator",
        matcher: Matcher::Exact(&["⏵⏵ auto-accept edits on"]),
        effect: Effect::SetMode(UiMode::AutoAccept),
    },
    Rule {
        name: "plan-indicator",
        matcher: Matcher::Exact(&["⏸ plan mode on"]),
        effect: Effect::SetMode(UiMode::Plan),
    },
    Rule {
        name: "shortcuts-hint",
        matcher: Matcher::Exact(&["? for shortcuts"]),
        effect: Effect::SetMode(UiMode::Interactive),
    },
    Rule {
        name: "exit-confirm",
        matcher: Matcher::Exact(&["Press Ctrl-C again to exit"]),
        effect: Effect::SetMode(UiMode::ExitConfirm),
    },
    Rule {
        name: "startup-banner",
        matcher: Matcher::Exact(&["Welcome to Claude Code"]),
        effect: Effect::SetMode(UiMode::Startup),
    },
    // Questions
    Rule {
        name: "confirmation",
        matcher: Matcher::AnyLower(&["(y/n)", "yes/no", "confirm", "continue?"]),
        effect: Effect::SetMode(UiMode::Confirmation),
    },
    Rule {
        name: "choice",
        matcher: Matcher::AnyLower(&["1.", "2.", "3.", "select", "choose"]),
        effect: Effect::SetMode(UiMode::Choice),
    },
    // Generic activity
    Rule {
        name: "thinking",
        matcher: Matcher::AnyLower(&["thinking", "processing"]),
        effect: Effect::SetMode(UiMode::Thinking),
    },
    Rule {
        name: "error",
        matcher: Matcher::AnyLower(&["error", "failed"]),
        effect: Effect::SetMode(UiMode::Error),
    },
    // Model announcements leave the mode alone
    Rule {
        name: "model-opus",
        matcher: Matcher::Exact(&["Set model to opus"]),
        effect: Effect::SetModel("opus"),
    },
    Rule {
        name: "model-sonnet",
        matcher: Matcher::Exact(&["Set model to Default", "Set model to sonnet"]),
        effect: Effect::SetModel("sonnet"),
    },
    Rule {
        name: "bare-prompt",
        matcher: Matcher::BareChevron,
        effect: Effect::SetMode(UiMode::Interactive),
    },
];

/// Find the first rule in `rules` that matches `chunk`.
pub fn first_match<'a>(rules: &'a [Rule], chunk: &str) -> Option<&'a Rule> {
    let lower = chunk.to_lowercase();
    rules.iter().find(|rule| rule.matcher.matches(chunk, &lower))
}

/// Classify one decoded chunk with the default rule table.
pub fn classify(chunk: &str) -> Option<&'static Rule> {
    first_match(RULES, chunk)
}
