//! Slide-to-unlock walkthrough
//!
//! Drives the manager through the no-passcode unlock flow with a minimal
//! view layer that prints every transfer.
//!
//! Run with: cargo run --example slide_to_unlock

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

struct NeverExpired;

impl PasscodeTimer for NeverExpired {
    fn timeout_expired(&self) -> bool {
        false
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Slide to Unlock ===\n");

    let mut manager = LockScreenStateManager::start(print_registry(), Arc::new(NeverExpired));

    println!("Booting (passcode lock disabled):");
    manager.on_passcode_enabled_changed(SettingValue::Bool(false));
    manager.settled().await;

    println!("\nScreen turns off, then back on:");
    manager.handle_event(LockScreenEvent::ScreenChanged {
        enabled: false,
        by_proximity: false,
    });
    manager.handle_event(LockScreenEvent::ScreenChanged {
        enabled: true,
        by_proximity: false,
    });
    manager.settled().await;

    println!("\nUser slides to unlock:");
    manager.handle_event(LockScreenEvent::ActivateUnlock);
    manager.settled().await;

    println!("\nResting state: {}", manager.current_state());
    manager.stop().await;

    println!("\n=== Walkthrough Complete ===");
}
