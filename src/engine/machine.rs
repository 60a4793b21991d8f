//! The transition engine.
//!
//! One matching pass takes a merged input bag, resolves any still-pending
//! fields, and walks the rule table in registration order. The first rule
//! that fires drives exactly one transition: the outgoing state transfers
//! out, the previous-state pointer moves to the target, and the target
//! transfers in. Whatever the target's `transfer_to` returns seeds the next
//! pass. A pass with no matching rule is a deliberate no-op.

use crate::core::{
    InputDelta, InputSnapshot, Inputs, LockState, RuleTable, StateType, TransferError,
    TransitionLog, TransitionRecord,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Matches inputs against the rule table and drives state transfers.
///
/// There is always exactly one authoritative previous-state reference. It
/// is reassigned immediately after the outgoing state's `transfer_out`
/// resolves, before the incoming state's `transfer_to` is awaited, so a
/// later pass always matches against the state the engine is moving into.
pub struct TransitionEngine {
    rules: RuleTable,
    previous: Arc<dyn LockState>,
    log: TransitionLog,
}

impl TransitionEngine {
    /// Create an engine resting in `initial` with the given rule table.
    pub fn new(initial: Arc<dyn LockState>, rules: RuleTable) -> Self {
        Self {
            rules,
            previous: initial,
            log: TransitionLog::new(),
        }
    }

    /// Tag of the state the engine currently rests in.
    pub fn previous_type(&self) -> StateType {
        self.previous.state_type()
    }

    /// The rule table.
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Mutable access to the rule table, for runtime registration.
    pub fn rules_mut(&mut self) -> &mut RuleTable {
        &mut self.rules
    }

    /// The log of fired transitions.
    pub fn log(&self) -> &TransitionLog {
        &self.log
    }

    /// Drive the initial state's view once at boot.
    ///
    /// No matching happens here and the view's output is discarded; the
    /// first real pass comes from the first event.
    pub async fn kick(&self, inputs: &InputSnapshot) -> Result<(), TransferError> {
        self.previous.transfer_to(inputs).await.map(|_output| ())
    }

    /// One full transition attempt: wait for pending inputs, then match.
    pub async fn attempt(&mut self, inputs: Inputs) -> Result<Option<InputDelta>, TransferError> {
        let snapshot = inputs.resolve().await?;
        self.transfer(&snapshot).await
    }

    /// One matching pass over an already-resolved snapshot.
    ///
    /// Returns the fired transition's output, or `None` when no rule
    /// matched. At most one rule fires per pass.
    pub async fn transfer(
        &mut self,
        inputs: &InputSnapshot,
    ) -> Result<Option<InputDelta>, TransferError> {
        let previous = self.previous.state_type();
        debug!(%previous, ?inputs, "matching pass");

        let (target, reason) = match self.rules.first_match(previous, inputs) {
            Some(rule) => (Arc::clone(&rule.target), rule.comment.clone()),
            None => {
                debug!(%previous, "no matching rule");
                return Ok(None);
            }
        };

        debug!(%previous, target = %target.state_type(), %reason, "rule matched");
        self.previous.transfer_out().await?;
        // Reassign before awaiting transfer_to so the next pass already
        // matches against the incoming state.
        self.previous = Arc::clone(&target);
        let output = target.transfer_to(inputs).await?;

        self.log = self.log.record(TransitionRecord {
            from: previous,
            to: target.state_type(),
            reason,
            timestamp: Utc::now(),
        });
        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{deferred, Conditions, Slot};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Shared call journal: (state, "in"/"out") entries in call order.
    type Journal = Arc<Mutex<Vec<(StateType, &'static str)>>>;

    struct MockState {
        ty: StateType,
        journal: Journal,
        output: InputDelta,
        fail_out: bool,
        fail_in: bool,
    }

    impl MockState {
        fn handle(ty: StateType, journal: &Journal) -> Arc<dyn LockState> {
            Arc::new(Self {
                ty,
                journal: Arc::clone(journal),
                output: InputDelta::default(),
                fail_out: false,
                fail_in: false,
            })
        }
    }

    #[async_trait]
    impl LockState for MockState {
        fn state_type(&self) -> StateType {
            self.ty
        }

        async fn transfer_to(&self, _inputs: &InputSnapshot) -> Result<InputDelta, TransferError> {
            self.journal.lock().unwrap().push((self.ty, "in"));
            if self.fail_in {
                return Err(TransferError::state_failed(self.ty, "transfer_to failed"));
            }
            Ok(self.output.clone())
        }

        async fn transfer_out(&self) -> Result<(), TransferError> {
            self.journal.lock().unwrap().push((self.ty, "out"));
            if self.fail_out {
                return Err(TransferError::state_failed(self.ty, "transfer_out failed"));
            }
            Ok(())
        }
    }

    fn slide_show_to_unlock(journal: &Journal) -> (TransitionEngine, Arc<dyn LockState>) {
        let slide_show = MockState::handle(StateType::SlideShow, journal);
        let unlock = MockState::handle(StateType::Unlock, journal);
        let mut rules = RuleTable::new();
        rules.register(
            Conditions {
                activate_unlock: Some(true),
                ..Conditions::default()
            },
            vec![StateType::SlideShow],
            Arc::clone(&unlock),
            "activation unlocks",
        );
        (TransitionEngine::new(slide_show, rules), unlock)
    }

    #[tokio::test]
    async fn fires_the_first_match_and_moves_the_pointer() {
        let journal: Journal = Arc::default();
        let (mut engine, _unlock) = slide_show_to_unlock(&journal);

        let inputs = InputSnapshot {
            activate_unlock: true,
            ..InputSnapshot::default()
        };
        let output = engine.transfer(&inputs).await.unwrap();

        assert_eq!(output, Some(InputDelta::default()));
        assert_eq!(engine.previous_type(), StateType::Unlock);
        assert_eq!(
            *journal.lock().unwrap(),
            vec![(StateType::SlideShow, "out"), (StateType::Unlock, "in")]
        );
    }

    #[tokio::test]
    async fn no_match_is_a_noop() {
        let journal: Journal = Arc::default();
        let (mut engine, _unlock) = slide_show_to_unlock(&journal);

        let output = engine.transfer(&InputSnapshot::default()).await.unwrap();

        assert_eq!(output, None);
        assert_eq!(engine.previous_type(), StateType::SlideShow);
        assert!(journal.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_the_earliest_matching_rule_fires() {
        let journal: Journal = Arc::default();
        let slide_show = MockState::handle(StateType::SlideShow, &journal);
        let unlock = MockState::handle(StateType::Unlock, &journal);
        let panel_hide = MockState::handle(StateType::PanelHide, &journal);

        let mut rules = RuleTable::new();
        rules.register(
            Conditions::default(),
            vec![StateType::SlideShow],
            unlock,
            "first",
        );
        rules.register(
            Conditions::default(),
            vec![StateType::SlideShow],
            panel_hide,
            "second",
        );

        let mut engine = TransitionEngine::new(slide_show, rules);
        engine.transfer(&InputSnapshot::default()).await.unwrap();

        assert_eq!(engine.previous_type(), StateType::Unlock);
        let journal = journal.lock().unwrap();
        assert!(journal.iter().all(|(ty, _)| *ty != StateType::PanelHide));
    }

    #[tokio::test]
    async fn transfer_output_feeds_back_to_the_caller() {
        let journal: Journal = Arc::default();
        let slide_show = MockState::handle(StateType::SlideShow, &journal);
        let unlock = Arc::new(MockState {
            ty: StateType::Unlock,
            journal: Arc::clone(&journal),
            output: InputDelta {
                unlocking: Some(true),
                ..InputDelta::default()
            },
            fail_out: false,
            fail_in: false,
        });

        let mut rules = RuleTable::new();
        rules.register(
            Conditions::default(),
            vec![StateType::SlideShow],
            unlock,
            "unlock with output",
        );

        let mut engine = TransitionEngine::new(slide_show, rules);
        let output = engine.transfer(&InputSnapshot::default()).await.unwrap();

        assert_eq!(
            output,
            Some(InputDelta {
                unlocking: Some(true),
                ..InputDelta::default()
            })
        );
    }

    #[tokio::test]
    async fn failed_transfer_out_keeps_the_pointer() {
        let journal: Journal = Arc::default();
        let slide_show = Arc::new(MockState {
            ty: StateType::SlideShow,
            journal: Arc::clone(&journal),
            output: InputDelta::default(),
            fail_out: true,
            fail_in: false,
        });
        let unlock = MockState::handle(StateType::Unlock, &journal);

        let mut rules = RuleTable::new();
        rules.register(
            Conditions::default(),
            vec![StateType::SlideShow],
            unlock,
            "never reached",
        );

        let mut engine = TransitionEngine::new(slide_show, rules);
        let result = engine.transfer(&InputSnapshot::default()).await;

        assert!(result.is_err());
        assert_eq!(engine.previous_type(), StateType::SlideShow);
        // The incoming state was never driven.
        assert!(journal
            .lock()
            .unwrap()
            .iter()
            .all(|(ty, _)| *ty != StateType::Unlock));
    }

    #[tokio::test]
    async fn failed_transfer_to_leaves_the_pointer_at_the_target() {
        let journal: Journal = Arc::default();
        let slide_show = MockState::handle(StateType::SlideShow, &journal);
        let unlock = Arc::new(MockState {
            ty: StateType::Unlock,
            journal: Arc::clone(&journal),
            output: InputDelta::default(),
            fail_out: false,
            fail_in: true,
        });

        let mut rules = RuleTable::new();
        rules.register(
            Conditions::default(),
            vec![StateType::SlideShow],
            unlock,
            "fails on entry",
        );

        let mut engine = TransitionEngine::new(slide_show, rules);
        let result = engine.transfer(&InputSnapshot::default()).await;

        assert!(result.is_err());
        // The pointer moved when transfer_out resolved; the entry failure
        // does not roll it back.
        assert_eq!(engine.previous_type(), StateType::Unlock);
    }

    #[tokio::test]
    async fn fired_transitions_are_logged() {
        let journal: Journal = Arc::default();
        let (mut engine, _unlock) = slide_show_to_unlock(&journal);

        let inputs = InputSnapshot {
            activate_unlock: true,
            ..InputSnapshot::default()
        };
        engine.transfer(&inputs).await.unwrap();

        let records = engine.log().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].from, StateType::SlideShow);
        assert_eq!(records[0].to, StateType::Unlock);
        assert_eq!(records[0].reason, "activation unlocks");
    }

    #[tokio::test]
    async fn attempt_waits_for_pending_inputs() {
        let journal: Journal = Arc::default();
        let (mut engine, _unlock) = slide_show_to_unlock(&journal);

        let (resolver, pending) = deferred::<bool>();
        let mut bag = Inputs::boot(Slot::Pending(pending));
        bag.activate_unlock = true;

        // The pass is gated on the unresolved field.
        let gated = tokio::time::timeout(Duration::from_millis(20), engine.attempt(bag.clone()));
        assert!(gated.await.is_err());
        assert!(journal.lock().unwrap().is_empty());

        // Once resolved, the same inputs go through.
        resolver.resolve(true);
        let output = engine.attempt(bag).await.unwrap();
        assert!(output.is_some());
        assert_eq!(engine.previous_type(), StateType::Unlock);
    }

    #[tokio::test]
    async fn kick_drives_the_initial_state_only() {
        let journal: Journal = Arc::default();
        let (engine, _unlock) = slide_show_to_unlock(&journal);

        engine.kick(&InputSnapshot::default()).await.unwrap();

        assert_eq!(
            *journal.lock().unwrap(),
            vec![(StateType::SlideShow, "in")]
        );
        assert_eq!(engine.previous_type(), StateType::SlideShow);
    }
}
