//! The input bag: the persistent mapping of named signals the engine uses
//! to decide transitions.
//!
//! Event handlers mutate a subset of fields in place before enqueueing a
//! matching pass; the pass itself works on a merged snapshot so momentary
//! signals (a home-button press, a keypad keystroke) are visible to exactly
//! one pass and never linger in the canonical bag.
//!
//! A field whose value is not known yet at boot holds a [`Deferred`]
//! placeholder. The pre-match step waits for every pending field before any
//! rule is evaluated; the canonical bag itself is only updated by the owning
//! settings observer.

use super::error::DeferredDropped;
use tokio::sync::watch;

/// Lifecycle phase of the passcode input pad, as reported by the input app.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputPad {
    /// The input app started opening.
    Open,
    /// The input app finished opening.
    Show,
    /// The input app closed.
    Close,
}

/// A value that will be resolved exactly once, some time in the future.
///
/// Cloning a `Deferred` shares the underlying slot; every clone observes the
/// same resolution.
///
/// # Example
///
/// ```rust
/// use lockstate::core::deferred;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let (resolver, pending) = deferred::<bool>();
/// let waiter = pending.clone();
///
/// resolver.resolve(true);
/// assert_eq!(waiter.wait().await, Ok(true));
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct Deferred<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Deferred<T> {
    /// Wait for the value.
    ///
    /// Fails only if the [`DeferredResolver`] was dropped without ever
    /// resolving.
    pub async fn wait(&self) -> Result<T, DeferredDropped> {
        let mut rx = self.rx.clone();
        loop {
            if let Some(value) = rx.borrow_and_update().as_ref() {
                return Ok(value.clone());
            }
            rx.changed().await.map_err(|_| DeferredDropped)?;
        }
    }
}

/// The write end of a [`Deferred`]. Consumed on resolution, so a deferred
/// value can be resolved at most once.
#[derive(Debug)]
pub struct DeferredResolver<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> DeferredResolver<T> {
    /// Resolve the deferred value, waking every waiter.
    pub fn resolve(self, value: T) {
        let _ = self.tx.send(Some(value));
    }
}

/// Create a resolver/placeholder pair.
pub fn deferred<T: Clone>() -> (DeferredResolver<T>, Deferred<T>) {
    let (tx, rx) = watch::channel(None);
    (DeferredResolver { tx }, Deferred { rx })
}

/// An input field that is either known or still pending.
#[derive(Clone, Debug)]
pub enum Slot<T> {
    /// The value is known.
    Known(T),
    /// The value has not arrived yet.
    Pending(Deferred<T>),
}

impl<T> Slot<T> {
    /// Whether the field still awaits its first value.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The value, if known.
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Pending(_) => None,
        }
    }
}

/// The canonical, persistent input bag.
///
/// Only the manager's event handlers and the settings observer write this;
/// matching passes work on snapshots derived from it.
#[derive(Clone, Debug)]
pub struct Inputs {
    pub screen_on: bool,
    pub passcode_timeout: bool,
    pub home_pressed: bool,
    pub activate_unlock: bool,
    pub unlocking: bool,
    pub keypad_input: Option<char>,
    pub forcibly_unlock: bool,
    pub inputpad: Option<InputPad>,
    pub passcode_validated: bool,
    pub secure_app_open: bool,
    pub secure_app_close: bool,
    pub unlocking_app_activated: bool,
    pub passcode_enabled: Slot<bool>,
}

impl Inputs {
    /// The boot-time defaults.
    ///
    /// The screen is assumed on after booting and the passcode counts as
    /// timed out, so the keypad shows when in doubt. Whether the passcode is
    /// enabled at all is unknown until the settings observer fires, hence
    /// the caller supplies that slot.
    pub fn boot(passcode_enabled: Slot<bool>) -> Self {
        Self {
            screen_on: true,
            passcode_timeout: true,
            home_pressed: false,
            activate_unlock: false,
            unlocking: false,
            keypad_input: None,
            forcibly_unlock: false,
            inputpad: None,
            passcode_validated: false,
            secure_app_open: false,
            secure_app_close: false,
            unlocking_app_activated: false,
            passcode_enabled,
        }
    }

    /// Merge a delta into this bag in place. Fields absent from the delta
    /// keep their current value.
    pub fn apply(&mut self, delta: &InputDelta) {
        if let Some(value) = delta.screen_on {
            self.screen_on = value;
        }
        if let Some(value) = delta.passcode_timeout {
            self.passcode_timeout = value;
        }
        if let Some(value) = delta.home_pressed {
            self.home_pressed = value;
        }
        if let Some(value) = delta.activate_unlock {
            self.activate_unlock = value;
        }
        if let Some(value) = delta.unlocking {
            self.unlocking = value;
        }
        if let Some(value) = delta.keypad_input {
            self.keypad_input = Some(value);
        }
        if let Some(value) = delta.forcibly_unlock {
            self.forcibly_unlock = value;
        }
        if let Some(value) = delta.inputpad {
            self.inputpad = Some(value);
        }
        if let Some(value) = delta.passcode_validated {
            self.passcode_validated = value;
        }
        if let Some(value) = delta.secure_app_open {
            self.secure_app_open = value;
        }
        if let Some(value) = delta.secure_app_close {
            self.secure_app_close = value;
        }
        if let Some(value) = delta.unlocking_app_activated {
            self.unlocking_app_activated = value;
        }
        if let Some(value) = delta.passcode_enabled {
            self.passcode_enabled = Slot::Known(value);
        }
    }

    /// A copy of this bag with the delta merged on top. The canonical bag
    /// is left untouched.
    pub fn merged(&self, delta: &InputDelta) -> Self {
        let mut next = self.clone();
        next.apply(delta);
        next
    }

    /// Wait for every pending field, then freeze into a plain-valued
    /// snapshot for one matching pass.
    ///
    /// Resolving here never writes back to the canonical bag; that update
    /// belongs to the settings observer alone.
    pub async fn resolve(self) -> Result<InputSnapshot, DeferredDropped> {
        let passcode_enabled = match &self.passcode_enabled {
            Slot::Known(value) => *value,
            Slot::Pending(pending) => pending.wait().await?,
        };
        Ok(InputSnapshot {
            screen_on: self.screen_on,
            passcode_timeout: self.passcode_timeout,
            home_pressed: self.home_pressed,
            activate_unlock: self.activate_unlock,
            unlocking: self.unlocking,
            keypad_input: self.keypad_input,
            forcibly_unlock: self.forcibly_unlock,
            inputpad: self.inputpad,
            passcode_validated: self.passcode_validated,
            secure_app_open: self.secure_app_open,
            secure_app_close: self.secure_app_close,
            unlocking_app_activated: self.unlocking_app_activated,
            passcode_enabled,
        })
    }
}

/// A fully resolved view of the inputs, used for one matching pass and
/// handed to the incoming state's `transfer_to`.
#[derive(Clone, Debug, PartialEq)]
pub struct InputSnapshot {
    pub screen_on: bool,
    pub passcode_timeout: bool,
    pub home_pressed: bool,
    pub activate_unlock: bool,
    pub unlocking: bool,
    pub keypad_input: Option<char>,
    pub forcibly_unlock: bool,
    pub inputpad: Option<InputPad>,
    pub passcode_validated: bool,
    pub secure_app_open: bool,
    pub secure_app_close: bool,
    pub unlocking_app_activated: bool,
    pub passcode_enabled: bool,
}

impl Default for InputSnapshot {
    /// Boot defaults with the passcode treated as disabled until the
    /// setting is known.
    fn default() -> Self {
        Self {
            screen_on: true,
            passcode_timeout: true,
            home_pressed: false,
            activate_unlock: false,
            unlocking: false,
            keypad_input: None,
            forcibly_unlock: false,
            inputpad: None,
            passcode_validated: false,
            secure_app_open: false,
            secure_app_close: false,
            unlocking_app_activated: false,
            passcode_enabled: false,
        }
    }
}

/// A partial update to the inputs.
///
/// Handlers use deltas to describe what an event changed; states return one
/// from `transfer_to` to feed the next matching pass. `None` means "leave
/// the field alone".
#[derive(Clone, Debug, PartialEq, Default)]
pub struct InputDelta {
    pub screen_on: Option<bool>,
    pub passcode_timeout: Option<bool>,
    pub home_pressed: Option<bool>,
    pub activate_unlock: Option<bool>,
    pub unlocking: Option<bool>,
    pub keypad_input: Option<char>,
    pub forcibly_unlock: Option<bool>,
    pub inputpad: Option<InputPad>,
    pub passcode_validated: Option<bool>,
    pub secure_app_open: Option<bool>,
    pub secure_app_close: Option<bool>,
    pub unlocking_app_activated: Option<bool>,
    pub passcode_enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_defaults_match_expectations() {
        let bag = Inputs::boot(Slot::Known(true));
        assert!(bag.screen_on);
        assert!(bag.passcode_timeout);
        assert!(!bag.home_pressed);
        assert!(!bag.unlocking);
        assert_eq!(bag.keypad_input, None);
        assert_eq!(bag.inputpad, None);
        assert_eq!(bag.passcode_enabled.known(), Some(&true));
    }

    #[test]
    fn merged_leaves_canonical_bag_untouched() {
        let bag = Inputs::boot(Slot::Known(false));
        let snapshot = bag.merged(&InputDelta {
            home_pressed: Some(true),
            ..InputDelta::default()
        });

        assert!(snapshot.home_pressed);
        assert!(!bag.home_pressed);
    }

    #[test]
    fn apply_overwrites_only_present_fields() {
        let mut bag = Inputs::boot(Slot::Known(false));
        bag.apply(&InputDelta {
            screen_on: Some(false),
            inputpad: Some(InputPad::Close),
            ..InputDelta::default()
        });

        assert!(!bag.screen_on);
        assert_eq!(bag.inputpad, Some(InputPad::Close));
        // Untouched fields keep their boot values.
        assert!(bag.passcode_timeout);
        assert_eq!(bag.keypad_input, None);
    }

    #[test]
    fn delta_can_settle_a_pending_slot() {
        let (_resolver, pending) = deferred::<bool>();
        let mut bag = Inputs::boot(Slot::Pending(pending));
        assert!(bag.passcode_enabled.is_pending());

        bag.apply(&InputDelta {
            passcode_enabled: Some(true),
            ..InputDelta::default()
        });
        assert_eq!(bag.passcode_enabled.known(), Some(&true));
    }

    #[tokio::test]
    async fn resolve_passes_known_values_through() {
        let bag = Inputs::boot(Slot::Known(true));
        let snapshot = bag.resolve().await.unwrap();
        assert!(snapshot.passcode_enabled);
        assert!(snapshot.screen_on);
    }

    #[tokio::test]
    async fn resolve_waits_for_pending_slot() {
        let (resolver, pending) = deferred::<bool>();
        let bag = Inputs::boot(Slot::Pending(pending));

        let task = tokio::spawn(async move { bag.resolve().await });
        tokio::task::yield_now().await;
        resolver.resolve(false);

        let snapshot = task.await.unwrap().unwrap();
        assert!(!snapshot.passcode_enabled);
    }

    #[tokio::test]
    async fn wait_after_resolution_returns_immediately() {
        let (resolver, pending) = deferred::<bool>();
        resolver.resolve(true);
        assert_eq!(pending.wait().await, Ok(true));
        // Every clone observes the same resolution.
        assert_eq!(pending.clone().wait().await, Ok(true));
    }

    #[tokio::test]
    async fn dropped_resolver_fails_the_wait() {
        let (resolver, pending) = deferred::<bool>();
        drop(resolver);
        assert_eq!(pending.wait().await, Err(DeferredDropped));
    }

    #[test]
    fn snapshot_default_is_boot_shaped() {
        let snapshot = InputSnapshot::default();
        assert!(snapshot.screen_on);
        assert!(snapshot.passcode_timeout);
        assert!(!snapshot.passcode_enabled);
    }
}
