//! The lock screen state manager.
//!
//! Owns the canonical input bag, maps external signals onto input deltas,
//! and serializes every transition attempt through a single worker task so
//! matching passes never run concurrently. Constructed once at boot via
//! [`LockScreenStateManager::start`] and torn down via `stop`, which
//! releases the worker and the settings subscription deterministically.

use super::events::{LockScreenEvent, PasscodeTimer, SettingValue};
use super::machine::TransitionEngine;
use super::ruleset::default_ruleset;
use crate::core::{
    deferred, Conditions, DeferredResolver, InputDelta, InputPad, InputSnapshot, Inputs, Rule,
    Slot, StateRegistry, StateType,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, trace};

/// A step submitted to the serial queue.
enum Command {
    /// Run one matching pass over the snapshot taken at enqueue time.
    Transfer(Inputs),
    /// Append a rule to the table.
    Register(Rule),
    /// Remove the first rule matching the example inputs and previous set.
    Unregister {
        example: InputSnapshot,
        previous: Vec<StateType>,
    },
    /// Drain no further steps.
    Stop,
}

/// Count of steps enqueued but not yet finished, observable for
/// quiescence.
struct Pending {
    tx: watch::Sender<usize>,
    rx: watch::Receiver<usize>,
}

impl Pending {
    fn new() -> Self {
        let (tx, rx) = watch::channel(0);
        Self { tx, rx }
    }

    fn add(&self) {
        self.tx.send_modify(|count| *count += 1);
    }

    fn done(&self) {
        self.tx.send_modify(|count| *count = count.saturating_sub(1));
    }

    async fn settled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() == 0 {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Reconciles external signals into lock screen state transitions.
///
/// Multiple instances are not a supported configuration; the manager is a
/// boot-time singleton in the system it serves.
pub struct LockScreenStateManager {
    inputs: Arc<Mutex<Inputs>>,
    tx: mpsc::UnboundedSender<Command>,
    worker: Option<JoinHandle<()>>,
    pending: Arc<Pending>,
    resolver: Mutex<Option<DeferredResolver<bool>>>,
    timer: Arc<dyn PasscodeTimer>,
    registry: StateRegistry,
    state_rx: watch::Receiver<StateType>,
}

impl LockScreenStateManager {
    /// Boot the manager: seed the rule table, spawn the serial queue
    /// worker and drive the initial state (slideShow) once.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(registry: StateRegistry, timer: Arc<dyn PasscodeTimer>) -> Self {
        let (resolver, passcode_enabled) = deferred();
        let inputs = Arc::new(Mutex::new(Inputs::boot(Slot::Pending(passcode_enabled))));

        let engine = TransitionEngine::new(
            registry.get(StateType::SlideShow),
            default_ruleset(&registry),
        );
        let (state_tx, state_rx) = watch::channel(engine.previous_type());
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Pending::new());

        // The boot kick counts as the first step.
        pending.add();
        let worker = tokio::spawn(run_worker(
            engine,
            rx,
            tx.clone(),
            Arc::clone(&inputs),
            Arc::clone(&pending),
            state_tx,
        ));

        Self {
            inputs,
            tx,
            worker: Some(worker),
            pending,
            resolver: Mutex::new(Some(resolver)),
            timer,
            registry,
            state_rx,
        }
    }

    /// Tear down: release the settings subscription, stop accepting steps
    /// and wait for the worker to drain.
    pub async fn stop(&mut self) {
        let _ = self.tx.send(Command::Stop);
        drop(self.lock_resolver().take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }

    /// Tag of the state the engine currently rests in, as of the last
    /// completed pass.
    pub fn current_state(&self) -> StateType {
        *self.state_rx.borrow()
    }

    /// Subscribe to completed-pass state updates.
    pub fn state_changes(&self) -> watch::Receiver<StateType> {
        self.state_rx.clone()
    }

    /// Wait until every enqueued step, including feedback passes, has run.
    pub async fn settled(&self) {
        self.pending.settled().await;
    }

    /// Map an external signal onto the input bag and enqueue a matching
    /// pass.
    pub fn handle_event(&self, event: LockScreenEvent) {
        match event {
            LockScreenEvent::ScreenChanged {
                enabled,
                by_proximity,
            } => {
                // Proximity blanking is not a real screen change.
                if !by_proximity {
                    self.on_screen_changed(enabled);
                }
            }
            LockScreenEvent::HomePressed => self.on_home_pressed(),
            LockScreenEvent::ActivateUnlock => self.on_activate_unlock(),
            LockScreenEvent::UnlockingAppActivated => self.on_unlocking_app(),
            LockScreenEvent::UnlockRequested { forcibly: true } => self.on_forcibly_unlock(),
            LockScreenEvent::UnlockRequested { forcibly: false } => self.on_unlock(),
            LockScreenEvent::LockRequested => self.on_lock(),
            LockScreenEvent::AppClosed => self.on_app_closed(),
            LockScreenEvent::InputPadOpening => self.on_inputpad(InputPad::Open),
            LockScreenEvent::InputPadOpened => self.on_inputpad(InputPad::Show),
            LockScreenEvent::InputPadClosed => self.on_inputpad(InputPad::Close),
            LockScreenEvent::KeypadInput { key } => self.on_keypad_input(key),
            LockScreenEvent::PasscodeValidated => self.on_passcode_validated(),
            LockScreenEvent::SecureAppOpened => self.on_secure_app_opened(),
            LockScreenEvent::SecureAppClosing | LockScreenEvent::SecureAppTerminated => {
                self.on_secure_app_closing()
            }
        }
    }

    /// Settings observer callback for the passcode-lock setting.
    ///
    /// Resolves the boot-time deferred exactly once; afterwards it only
    /// updates the canonical bag. No pass is enqueued: the passcode cannot
    /// change while the lock screen is up, so there is nothing to
    /// re-evaluate.
    pub fn on_passcode_enabled_changed(&self, value: SettingValue) {
        let enabled = value.as_bool();
        let resolver = self.lock_resolver().take();
        self.lock_inputs().passcode_enabled = Slot::Known(enabled);
        // The bag is updated before waking any pass gated on the deferred,
        // so a momentary event snapshot never outlives the canonical value.
        if let Some(resolver) = resolver {
            resolver.resolve(enabled);
        }
    }

    /// Append a rule to the table, serialized with in-flight passes.
    pub fn register_rule(
        &self,
        conditions: Conditions,
        previous: Vec<StateType>,
        target: StateType,
        comment: impl Into<String>,
    ) {
        let rule = Rule {
            conditions,
            previous,
            target: self.registry.get(target),
            comment: comment.into(),
        };
        self.submit(Command::Register(rule));
    }

    /// Remove the first rule matching the example inputs and previous set,
    /// serialized with in-flight passes.
    pub fn unregister_rule(&self, example: InputSnapshot, previous: Vec<StateType>) {
        self.submit(Command::Unregister { example, previous });
    }

    fn on_screen_changed(&self, enabled: bool) {
        let snapshot = {
            let mut bag = self.lock_inputs();
            // An unlock in flight is cancelled by a power change, so a
            // hurried off/on cannot unlock past the slide.
            if bag.unlocking {
                bag.unlocking = false;
            }
            let snapshot = bag.merged(&InputDelta {
                screen_on: Some(enabled),
                ..InputDelta::default()
            });
            bag.screen_on = enabled;
            snapshot
        };
        self.enqueue(snapshot);
    }

    fn on_home_pressed(&self) {
        let snapshot = self.lock_inputs().merged(&InputDelta {
            home_pressed: Some(true),
            ..InputDelta::default()
        });
        self.enqueue(snapshot);
    }

    fn on_activate_unlock(&self) {
        let snapshot = {
            let mut bag = self.lock_inputs();
            bag.passcode_timeout = self.timer.timeout_expired();
            bag.merged(&InputDelta {
                activate_unlock: Some(true),
                ..InputDelta::default()
            })
        };
        self.enqueue(snapshot);
    }

    fn on_unlocking_app(&self) {
        let snapshot = {
            let mut bag = self.lock_inputs();
            bag.passcode_timeout = self.timer.timeout_expired();
            bag.merged(&InputDelta {
                unlocking_app_activated: Some(true),
                ..InputDelta::default()
            })
        };
        self.enqueue(snapshot);
    }

    fn on_unlock(&self) {
        let snapshot = {
            let mut bag = self.lock_inputs();
            bag.unlocking = true;
            bag.clone()
        };
        self.enqueue(snapshot);
    }

    fn on_forcibly_unlock(&self) {
        // A forced unlock comes without animation, so the bag keeps no
        // trace of it.
        let snapshot = self.lock_inputs().merged(&InputDelta {
            forcibly_unlock: Some(true),
            ..InputDelta::default()
        });
        self.enqueue(snapshot);
    }

    fn on_lock(&self) {
        let snapshot = {
            let mut bag = self.lock_inputs();
            if bag.unlocking {
                bag.unlocking = false;
            }
            bag.clone()
        };
        self.enqueue(snapshot);
    }

    fn on_app_closed(&self) {
        let snapshot = {
            let mut bag = self.lock_inputs();
            bag.unlocking = false;
            bag.clone()
        };
        self.enqueue(snapshot);
    }

    fn on_inputpad(&self, phase: InputPad) {
        let snapshot = self.lock_inputs().merged(&InputDelta {
            inputpad: Some(phase),
            ..InputDelta::default()
        });
        self.enqueue(snapshot);
    }

    fn on_keypad_input(&self, key: char) {
        // Only the clear key drives a transition.
        if key != 'c' {
            return;
        }
        let snapshot = self.lock_inputs().merged(&InputDelta {
            keypad_input: Some('c'),
            ..InputDelta::default()
        });
        self.enqueue(snapshot);
    }

    fn on_passcode_validated(&self) {
        let snapshot = {
            let mut bag = self.lock_inputs();
            bag.unlocking = true;
            bag.merged(&InputDelta {
                passcode_validated: Some(true),
                ..InputDelta::default()
            })
        };
        self.enqueue(snapshot);
    }

    fn on_secure_app_opened(&self) {
        let snapshot = self.lock_inputs().merged(&InputDelta {
            secure_app_open: Some(true),
            ..InputDelta::default()
        });
        self.enqueue(snapshot);
    }

    fn on_secure_app_closing(&self) {
        let snapshot = self.lock_inputs().merged(&InputDelta {
            secure_app_open: Some(false),
            secure_app_close: Some(true),
            ..InputDelta::default()
        });
        self.enqueue(snapshot);
    }

    fn enqueue(&self, snapshot: Inputs) {
        self.submit(Command::Transfer(snapshot));
    }

    fn submit(&self, command: Command) {
        self.pending.add();
        if self.tx.send(command).is_err() {
            self.pending.done();
            trace!("manager stopped; dropping step");
        }
    }

    fn lock_inputs(&self) -> MutexGuard<'_, Inputs> {
        self.inputs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_resolver(&self) -> MutexGuard<'_, Option<DeferredResolver<bool>>> {
        self.resolver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LockScreenStateManager {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Stop);
    }
}

/// The serial queue: one step at a time, strictly in submission order.
async fn run_worker(
    mut engine: TransitionEngine,
    mut rx: mpsc::UnboundedReceiver<Command>,
    feedback: mpsc::UnboundedSender<Command>,
    inputs: Arc<Mutex<Inputs>>,
    pending: Arc<Pending>,
    state_tx: watch::Sender<StateType>,
) {
    // Boot kick: drive the initial state's view before any event.
    if let Err(err) = engine.kick(&InputSnapshot::default()).await {
        error!(error = %err, "initial state failed to transfer in");
    }
    pending.done();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Transfer(bag) => {
                match engine.attempt(bag).await {
                    Ok(Some(output)) => {
                        // The output seeds a new pass against the bag as it
                        // stands now, queued behind anything already
                        // submitted.
                        let next = {
                            let bag = inputs.lock().unwrap_or_else(PoisonError::into_inner);
                            bag.merged(&output)
                        };
                        pending.add();
                        if feedback.send(Command::Transfer(next)).is_err() {
                            pending.done();
                        }
                    }
                    Ok(None) => {}
                    // A failed transfer never halts the queue.
                    Err(err) => error!(error = %err, "transition pass failed"),
                }
                let _ = state_tx.send(engine.previous_type());
            }
            Command::Register(rule) => engine.rules_mut().register_rule(rule),
            Command::Unregister { example, previous } => {
                engine.rules_mut().unregister(&example, &previous);
            }
            Command::Stop => break,
        }
        pending.done();
    }

    // Steps left behind a stop are dropped; release their pending counts
    // so quiescence observers are not left hanging.
    rx.close();
    while let Ok(command) = rx.try_recv() {
        if !matches!(command, Command::Stop) {
            pending.done();
        }
    }
}
