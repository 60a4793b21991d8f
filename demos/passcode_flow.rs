//! Passcode unlock walkthrough
//!
//! Shows the keypad flow and the output feedback loop: once the input pad
//! closes with an unlock in progress, the engine converges through
//! panelHide into unlock on its own.
//!
//! Run with: cargo run --example passcode_flow

use async_trait::async_trait;
use lockstate::core::{
    InputDelta, InputSnapshot, LockState, StateRegistry, StateType, TransferError,
};
use lockstate::engine::{LockScreenEvent, LockScreenStateManager, PasscodeTimer, SettingValue};
use std::sync::Arc;

struct PrintState(StateType);

#[async_trait]
impl LockState for PrintState {
    fn state_type(&self) -> StateType {
        self.0
    }

    async fn transfer_to(&self, _inputs: &InputSnapshot) -> Result<InputDelta, TransferError> {
        println!("  -> entering {}", self.0);
        Ok(InputDelta::default())
    }

    async fn transfer_out(&self) -> Result<(), TransferError> {
        println!("  <- leaving  {}", self.0);
        Ok(())
    }
}

fn print_registry() -> StateRegistry {
    let state = |ty| -> Arc<dyn LockState> { Arc::new(PrintState(ty)) };
    StateRegistry {
        slide_show: state(StateType::SlideShow),
        slide_restore: state(StateType::SlideRestore),
        keypad_show: state(StateType::KeypadShow),
        keypad_hiding: state(StateType::KeypadHiding),
        keypad_rising: state(StateType::KeypadRising),
        panel_hide: state(StateType::PanelHide),
        unlock: state(StateType::Unlock),
        secure_app_launching: state(StateType::SecureAppLaunching),
    }
}

struct AlwaysExpired;

impl PasscodeTimer for AlwaysExpired {
    fn timeout_expired(&self) -> bool {
        true
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Passcode Unlock ===\n");

    let mut manager = LockScreenStateManager::start(print_registry(), Arc::new(AlwaysExpired));

    println!("Booting (passcode lock enabled):");
    manager.on_passcode_enabled_changed(SettingValue::Bool(true));
    manager.settled().await;

    println!("\nUser slides to unlock; the passcode has timed out:");
    manager.handle_event(LockScreenEvent::ActivateUnlock);
    manager.settled().await;

    println!("\nThe input pad finishes opening:");
    manager.handle_event(LockScreenEvent::InputPadOpening);
    manager.settled().await;

    println!("\nThe passcode validates, the pad closes, and the engine");
    println!("feeds each transfer's output back in until it converges:");
    manager.handle_event(LockScreenEvent::PasscodeValidated);
    manager.handle_event(LockScreenEvent::InputPadClosed);
    manager.settled().await;

    println!("\nResting state: {}", manager.current_state());
    manager.stop().await;

    println!("\n=== Walkthrough Complete ===");
}
