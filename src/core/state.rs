//! State tags and the asynchronous transfer contract.
//!
//! Each lock screen mode is a pre-constructed singleton handle owned by the
//! caller's view layer. The engine never creates or destroys states; it only
//! asks the outgoing state to transfer out and the incoming state to
//! transfer in, and matches on the invariant [`StateType`] tag.

use super::error::TransferError;
use super::input::{InputDelta, InputSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The invariant tag of a lock screen state.
///
/// Tags are the only thing the matching algorithm ever compares; the
/// view behavior behind a tag is opaque to the engine.
///
/// # Example
///
/// ```rust
/// use lockstate::core::StateType;
///
/// assert_eq!(StateType::KeypadRising.name(), "keypadRising");
/// assert_ne!(StateType::SlideShow, StateType::SlideRestore);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum StateType {
    /// The slider is visible and idle.
    SlideShow,
    /// The slider is being reset to its resting position.
    SlideRestore,
    /// The passcode keypad is fully visible.
    KeypadShow,
    /// The passcode keypad is animating away.
    KeypadHiding,
    /// The passcode keypad is animating in.
    KeypadRising,
    /// Every panel is hidden, ready to unlock.
    PanelHide,
    /// The screen is unlocking.
    Unlock,
    /// A secure app is being launched on top of the lock screen.
    SecureAppLaunching,
}

impl StateType {
    /// Get the state's canonical name for display/logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SlideShow => "slideShow",
            Self::SlideRestore => "slideRestore",
            Self::KeypadShow => "keypadShow",
            Self::KeypadHiding => "keypadHiding",
            Self::KeypadRising => "keypadRising",
            Self::PanelHide => "panelHide",
            Self::Unlock => "unlock",
            Self::SecureAppLaunching => "secureAppLaunching",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Asynchronous enter/exit contract a lock screen state exposes to the
/// engine.
///
/// `transfer_to` and `transfer_out` model animation completion and may take
/// non-trivial wall-clock time. The engine awaits them indefinitely, so a
/// well-behaved implementation must always resolve its futures; a state that
/// never resolves blocks the serial queue permanently.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use lockstate::core::{InputDelta, InputSnapshot, LockState, StateType, TransferError};
///
/// struct SlidePanel;
///
/// #[async_trait]
/// impl LockState for SlidePanel {
///     fn state_type(&self) -> StateType {
///         StateType::SlideShow
///     }
///
///     async fn transfer_to(&self, _inputs: &InputSnapshot) -> Result<InputDelta, TransferError> {
///         // Run the show animation here.
///         Ok(InputDelta::default())
///     }
///
///     async fn transfer_out(&self) -> Result<(), TransferError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait LockState: Send + Sync {
    /// The invariant tag used in all matching.
    fn state_type(&self) -> StateType;

    /// Become the current state.
    ///
    /// Receives the resolved input snapshot of the pass that selected this
    /// state. The returned delta is merged back as new input and seeds the
    /// next matching pass.
    async fn transfer_to(&self, inputs: &InputSnapshot) -> Result<InputDelta, TransferError>;

    /// Stop being the current state.
    async fn transfer_out(&self) -> Result<(), TransferError>;
}

/// The fixed set of state handles the engine transfers among.
///
/// States are constructed once by the caller at boot and reused for the
/// whole lifetime of the manager.
#[derive(Clone)]
pub struct StateRegistry {
    pub slide_show: Arc<dyn LockState>,
    pub slide_restore: Arc<dyn LockState>,
    pub keypad_show: Arc<dyn LockState>,
    pub keypad_hiding: Arc<dyn LockState>,
    pub keypad_rising: Arc<dyn LockState>,
    pub panel_hide: Arc<dyn LockState>,
    pub unlock: Arc<dyn LockState>,
    pub secure_app_launching: Arc<dyn LockState>,
}

impl StateRegistry {
    /// Look up the handle registered for a tag.
    pub fn get(&self, state_type: StateType) -> Arc<dyn LockState> {
        match state_type {
            StateType::SlideShow => Arc::clone(&self.slide_show),
            StateType::SlideRestore => Arc::clone(&self.slide_restore),
            StateType::KeypadShow => Arc::clone(&self.keypad_show),
            StateType::KeypadHiding => Arc::clone(&self.keypad_hiding),
            StateType::KeypadRising => Arc::clone(&self.keypad_rising),
            StateType::PanelHide => Arc::clone(&self.panel_hide),
            StateType::Unlock => Arc::clone(&self.unlock),
            StateType::SecureAppLaunching => Arc::clone(&self.secure_app_launching),
        }
    }
}

impl fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRegistry").finish_non_exhaustive()
    }
}
