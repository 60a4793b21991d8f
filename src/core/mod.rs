//! Core data model of the lock screen state machine.
//!
//! This module contains the declarative half of the engine:
//! - State tags and the async transfer contract via [`LockState`]
//! - The input bag and its deferred placeholders
//! - Ordered transition rules and their matching semantics
//! - The transition log
//!
//! Everything here is side-effect free apart from awaiting a deferred
//! input; the imperative shell lives in [`crate::engine`].

mod error;
mod history;
mod input;
mod rule;
mod state;

pub use error::{DeferredDropped, TransferError};
pub use history::{TransitionLog, TransitionRecord};
pub use input::{deferred, Deferred, DeferredResolver, InputDelta, InputPad, InputSnapshot, Inputs, Slot};
pub use rule::{Conditions, Rule, RuleTable};
pub use state::{LockState, StateRegistry, StateType};
