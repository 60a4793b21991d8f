//! The lock screen's transition table.
//!
//! Registration order matters: it is the sole priority mechanism when more
//! than one rule matches a pass.

use crate::core::{Conditions, InputPad, RuleTable, StateRegistry, StateType};

/// Build the default lock screen rule table over the given states.
pub fn default_ruleset(states: &StateRegistry) -> RuleTable {
    let mut rules = RuleTable::new();

    rules.register(
        Conditions {
            secure_app_open: Some(true),
            ..Conditions::default()
        },
        vec![StateType::KeypadShow, StateType::SlideShow],
        states.get(StateType::SlideRestore),
        "restore the slider when a secure app opens",
    );

    rules.register(
        Conditions {
            screen_on: Some(true),
            ..Conditions::default()
        },
        vec![StateType::SlideRestore],
        states.get(StateType::SlideShow),
        "show the slide again after restoring it",
    );

    rules.register(
        Conditions {
            screen_on: Some(true),
            unlocking: Some(false),
            ..Conditions::default()
        },
        vec![StateType::PanelHide, StateType::Unlock],
        states.get(StateType::SlideShow),
        "resume the slide when the screen comes back without an unlock in progress",
    );

    rules.register(
        Conditions {
            passcode_enabled: Some(false),
            screen_on: Some(true),
            activate_unlock: Some(true),
            ..Conditions::default()
        },
        vec![StateType::SlideShow],
        states.get(StateType::Unlock),
        "activation without a passcode unlocks directly",
    );

    rules.register(
        Conditions {
            passcode_enabled: Some(true),
            passcode_timeout: Some(false),
            screen_on: Some(true),
            activate_unlock: Some(true),
            ..Conditions::default()
        },
        vec![StateType::SlideShow],
        states.get(StateType::Unlock),
        "activation within the passcode grace period unlocks directly",
    );

    rules.register(
        Conditions {
            passcode_enabled: Some(true),
            passcode_timeout: Some(true),
            screen_on: Some(true),
            activate_unlock: Some(true),
            ..Conditions::default()
        },
        vec![StateType::SlideShow],
        states.get(StateType::KeypadRising),
        "activation with an expired passcode raises the keypad",
    );

    rules.register(
        Conditions {
            passcode_enabled: Some(true),
            screen_on: Some(true),
            home_pressed: Some(true),
            ..Conditions::default()
        },
        vec![StateType::KeypadShow],
        states.get(StateType::KeypadHiding),
        "a home press hides the keypad",
    );

    rules.register(
        Conditions {
            passcode_enabled: Some(true),
            screen_on: Some(true),
            inputpad: Some(InputPad::Close),
            unlocking: Some(false),
            ..Conditions::default()
        },
        vec![StateType::KeypadHiding],
        states.get(StateType::SlideShow),
        "keypad finished hiding without an unlock: back to the slide",
    );

    rules.register(
        Conditions {
            screen_on: Some(false),
            ..Conditions::default()
        },
        vec![
            StateType::KeypadShow,
            StateType::KeypadHiding,
            StateType::KeypadRising,
        ],
        states.get(StateType::SlideShow),
        "screen off while the keypad is up: show the slide as cache",
    );

    rules.register(
        Conditions {
            screen_on: Some(false),
            ..Conditions::default()
        },
        vec![StateType::SlideShow],
        states.get(StateType::SlideRestore),
        "screen off on the slide: restore it",
    );

    rules.register(
        Conditions {
            passcode_enabled: Some(true),
            screen_on: Some(true),
            inputpad: Some(InputPad::Open),
            ..Conditions::default()
        },
        vec![StateType::KeypadRising],
        states.get(StateType::KeypadShow),
        "keypad finished rising: show it",
    );

    rules.register(
        Conditions {
            passcode_enabled: Some(true),
            passcode_validated: Some(true),
            screen_on: Some(true),
            unlocking: Some(true),
            ..Conditions::default()
        },
        vec![StateType::KeypadShow],
        states.get(StateType::KeypadHiding),
        "a validated passcode hides the keypad",
    );

    rules.register(
        Conditions {
            passcode_enabled: Some(true),
            screen_on: Some(true),
            inputpad: Some(InputPad::Close),
            unlocking: Some(true),
            ..Conditions::default()
        },
        vec![StateType::KeypadHiding],
        states.get(StateType::PanelHide),
        "keypad finished hiding for an unlock: hide every panel",
    );

    rules.register(
        Conditions {
            unlocking: Some(true),
            ..Conditions::default()
        },
        vec![StateType::PanelHide],
        states.get(StateType::Unlock),
        "panels hidden: unlock the screen",
    );

    rules.register(
        Conditions {
            keypad_input: Some('c'),
            ..Conditions::default()
        },
        vec![StateType::KeypadShow],
        states.get(StateType::KeypadHiding),
        "the clear keystroke hides the keypad",
    );

    rules.register(
        Conditions {
            unlocking_app_activated: Some(true),
            passcode_enabled: Some(true),
            passcode_timeout: Some(true),
            ..Conditions::default()
        },
        vec![StateType::SlideShow],
        states.get(StateType::SecureAppLaunching),
        "app activation with an expired passcode launches the secure app",
    );

    rules.register(
        Conditions {
            unlocking_app_activated: Some(true),
            passcode_enabled: Some(true),
            passcode_timeout: Some(false),
            ..Conditions::default()
        },
        vec![StateType::SlideShow],
        states.get(StateType::Unlock),
        "app activation within the passcode grace period unlocks",
    );

    rules.register(
        Conditions {
            secure_app_close: Some(true),
            ..Conditions::default()
        },
        vec![StateType::SecureAppLaunching],
        states.get(StateType::SlideRestore),
        "secure app closed: restore the slider",
    );

    rules.register(
        Conditions {
            unlocking_app_activated: Some(true),
            passcode_enabled: Some(false),
            ..Conditions::default()
        },
        vec![StateType::SlideShow],
        states.get(StateType::SlideRestore),
        "app activation without a passcode restores the slider",
    );

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InputDelta, InputSnapshot, LockState, TransferError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Stub(StateType);

    #[async_trait]
    impl LockState for Stub {
        fn state_type(&self) -> StateType {
            self.0
        }

        async fn transfer_to(&self, _inputs: &InputSnapshot) -> Result<InputDelta, TransferError> {
            Ok(InputDelta::default())
        }

        async fn transfer_out(&self) -> Result<(), TransferError> {
            Ok(())
        }
    }

    fn stub_registry() -> StateRegistry {
        StateRegistry {
            slide_show: Arc::new(Stub(StateType::SlideShow)),
            slide_restore: Arc::new(Stub(StateType::SlideRestore)),
            keypad_show: Arc::new(Stub(StateType::KeypadShow)),
            keypad_hiding: Arc::new(Stub(StateType::KeypadHiding)),
            keypad_rising: Arc::new(Stub(StateType::KeypadRising)),
            panel_hide: Arc::new(Stub(StateType::PanelHide)),
            unlock: Arc::new(Stub(StateType::Unlock)),
            secure_app_launching: Arc::new(Stub(StateType::SecureAppLaunching)),
        }
    }

    fn target_for(previous: StateType, inputs: &InputSnapshot) -> Option<StateType> {
        let rules = default_ruleset(&stub_registry());
        rules
            .first_match(previous, inputs)
            .map(|rule| rule.target.state_type())
    }

    #[test]
    fn the_full_table_is_registered() {
        let rules = default_ruleset(&stub_registry());
        assert_eq!(rules.len(), 19);
    }

    #[test]
    fn activation_without_passcode_unlocks() {
        let inputs = InputSnapshot {
            screen_on: true,
            activate_unlock: true,
            passcode_enabled: false,
            ..InputSnapshot::default()
        };
        assert_eq!(
            target_for(StateType::SlideShow, &inputs),
            Some(StateType::Unlock)
        );
    }

    #[test]
    fn activation_with_expired_passcode_raises_the_keypad() {
        let inputs = InputSnapshot {
            screen_on: true,
            activate_unlock: true,
            passcode_enabled: true,
            passcode_timeout: true,
            ..InputSnapshot::default()
        };
        assert_eq!(
            target_for(StateType::SlideShow, &inputs),
            Some(StateType::KeypadRising)
        );
    }

    #[test]
    fn activation_within_the_grace_period_unlocks() {
        let inputs = InputSnapshot {
            screen_on: true,
            activate_unlock: true,
            passcode_enabled: true,
            passcode_timeout: false,
            ..InputSnapshot::default()
        };
        assert_eq!(
            target_for(StateType::SlideShow, &inputs),
            Some(StateType::Unlock)
        );
    }

    #[test]
    fn secure_app_opening_restores_the_slider() {
        let inputs = InputSnapshot {
            secure_app_open: true,
            ..InputSnapshot::default()
        };
        assert_eq!(
            target_for(StateType::KeypadShow, &inputs),
            Some(StateType::SlideRestore)
        );
        assert_eq!(
            target_for(StateType::SlideShow, &inputs),
            Some(StateType::SlideRestore)
        );
        // Not acceptable from other states.
        assert_eq!(target_for(StateType::PanelHide, &inputs), None);
    }

    #[test]
    fn screen_off_caches_the_slide() {
        let inputs = InputSnapshot {
            screen_on: false,
            ..InputSnapshot::default()
        };
        assert_eq!(
            target_for(StateType::KeypadShow, &inputs),
            Some(StateType::SlideShow)
        );
        assert_eq!(
            target_for(StateType::SlideShow, &inputs),
            Some(StateType::SlideRestore)
        );
    }

    #[test]
    fn keypad_clear_key_hides_the_keypad() {
        let inputs = InputSnapshot {
            keypad_input: Some('c'),
            ..InputSnapshot::default()
        };
        assert_eq!(
            target_for(StateType::KeypadShow, &inputs),
            Some(StateType::KeypadHiding)
        );
    }

    #[test]
    fn panel_hide_completes_into_unlock() {
        let inputs = InputSnapshot {
            unlocking: true,
            ..InputSnapshot::default()
        };
        assert_eq!(
            target_for(StateType::PanelHide, &inputs),
            Some(StateType::Unlock)
        );
    }

    #[test]
    fn idle_slide_show_has_no_matching_rule() {
        assert_eq!(target_for(StateType::SlideShow, &InputSnapshot::default()), None);
    }
}
