//! Data models for the wrapper
//!
//! - `UiMode`: the classifier's view of the child's UI state
//! - `ButtonConfig`: macro-pad hints derived from a mode

pub mod button;
pub mod enums;

// Re-exports for convenient access
pub use button::ButtonConfig;
pub use enums::UiMode;
