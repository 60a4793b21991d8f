//! Lockstate: a rule-table driven lock screen state machine engine
//!
//! Lockstate reconciles many asynchronous, partially-ordered signals (screen
//! power, passcode settings, home-button presses, secure-app lifecycle,
//! keypad animation phases) into a single coherent lock screen state. Instead
//! of nested `if...else` handling scattered across event listeners, the next
//! state is chosen by matching the current inputs against an ordered table of
//! declarative rules.
//!
//! # Core Concepts
//!
//! - **States**: opaque handles behind the [`LockState`] contract; the view
//!   layer owns the enter/exit animations, the engine only drives them
//! - **Rules**: `(conditions, allowed previous states) -> target` records,
//!   evaluated in registration order; first match wins
//! - **Input bag**: the persistent mapping of named signals, with deferred
//!   placeholders for values that are not known yet
//! - **Serial queue**: matching passes never run concurrently; every
//!   transition attempt is processed in dispatch order
//!
//! # Example
//!
//! ```rust
//! use lockstate::core::{Conditions, InputSnapshot, StateType};
//!
//! // A rule condition map: omitted fields are wildcards.
//! let conditions = Conditions {
//!     screen_on: Some(true),
//!     activate_unlock: Some(true),
//!     passcode_enabled: Some(false),
//!     ..Conditions::default()
//! };
//!
//! let inputs = InputSnapshot {
//!     screen_on: true,
//!     activate_unlock: true,
//!     ..InputSnapshot::default()
//! };
//!
//! assert!(conditions.matches(&inputs));
//! assert_eq!(StateType::SlideShow.name(), "slideShow");
//! ```

pub mod core;
pub mod engine;

// Re-export commonly used types
pub use core::{
    Conditions, Deferred, DeferredDropped, DeferredResolver, InputDelta, InputPad, InputSnapshot,
    Inputs, LockState, Rule, RuleTable, Slot, StateRegistry, StateType, TransferError,
    TransitionLog, TransitionRecord,
};
pub use engine::{
    default_ruleset, LockScreenEvent, LockScreenStateManager, PasscodeTimer, SettingValue,
    TransitionEngine,
};
