//! Declarative transition rules and the ordered table that holds them.
//!
//! A rule pairs a condition map with the set of states it may fire from and
//! the state it transfers to. The table preserves registration order, and
//! that order is the sole priority mechanism: the first rule that matches a
//! pass wins, and no conflict detection is attempted for overlapping rules.

use super::input::{InputPad, InputSnapshot};
use super::state::{LockState, StateType};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// The condition map of a rule.
///
/// A `Some` field must equal the corresponding input for the rule to match;
/// a `None` field is a wildcard. Inputs with no corresponding condition
/// never block a match, so a default (all-wildcard) condition map matches
/// any snapshot.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Conditions {
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

impl Conditions {
    /// Whether every present condition equals the snapshot's value.
    pub fn matches(&self, inputs: &InputSnapshot) -> bool {
        fn check<T: PartialEq>(condition: &Option<T>, value: &T) -> bool {
            match condition {
                Some(expected) => expected == value,
                None => true,
            }
        }

        check(&self.screen_on, &inputs.screen_on)
            && check(&self.passcode_timeout, &inputs.passcode_timeout)
            && check(&self.home_pressed, &inputs.home_pressed)
            && check(&self.activate_unlock, &inputs.activate_unlock)
            && check(&self.unlocking, &inputs.unlocking)
            && check(&self.keypad_input.map(Some), &inputs.keypad_input)
            && check(&self.forcibly_unlock, &inputs.forcibly_unlock)
            && check(&self.inputpad.map(Some), &inputs.inputpad)
            && check(&self.passcode_validated, &inputs.passcode_validated)
            && check(&self.secure_app_open, &inputs.secure_app_open)
            && check(&self.secure_app_close, &inputs.secure_app_close)
            && check(
                &self.unlocking_app_activated,
                &inputs.unlocking_app_activated,
            )
            && check(&self.passcode_enabled, &inputs.passcode_enabled)
    }
}

/// One transition rule.
///
/// The allowed previous states live in a dedicated field rather than inside
/// the condition map, so state tags can never collide with input names.
#[derive(Clone)]
pub struct Rule {
    /// Input conditions; omitted fields are wildcards.
    pub conditions: Conditions,
    /// States this rule may fire from.
    pub previous: Vec<StateType>,
    /// State this rule transfers to.
    pub target: Arc<dyn LockState>,
    /// Human-readable reason, recorded in the transition log.
    pub comment: String,
}

impl Rule {
    /// Membership test used by the matching pass: may this rule fire from
    /// the given state?
    pub fn accepts_previous(&self, previous: StateType) -> bool {
        self.previous.contains(&previous)
    }

    /// Order-independent set equality, used by rule removal only.
    pub fn previous_set_equals(&self, other: &[StateType]) -> bool {
        if self.previous.len() != other.len() {
            return false;
        }
        let mut ours = self.previous.clone();
        let mut theirs = other.to_vec();
        ours.sort();
        theirs.sort();
        ours == theirs
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("conditions", &self.conditions)
            .field("previous", &self.previous)
            .field("target", &self.target.state_type())
            .field("comment", &self.comment)
            .finish()
    }
}

/// The ordered rule table. Insertion order is priority order.
#[derive(Clone, Debug, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule to the end of the table.
    pub fn register(
        &mut self,
        conditions: Conditions,
        previous: Vec<StateType>,
        target: Arc<dyn LockState>,
        comment: impl Into<String>,
    ) {
        self.rules.push(Rule {
            conditions,
            previous,
            target,
            comment: comment.into(),
        });
    }

    /// Append a pre-built rule.
    pub fn register_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Remove the first rule whose previous set equals the given list
    /// (order-independent) and whose conditions match the example inputs.
    /// No-op when nothing matches.
    pub fn unregister(&mut self, example: &InputSnapshot, previous: &[StateType]) {
        let found = self
            .rules
            .iter()
            .position(|rule| rule.previous_set_equals(previous) && rule.conditions.matches(example));
        if let Some(index) = found {
            self.rules.remove(index);
        }
    }

    /// Find the first rule that fires for this pass.
    ///
    /// A rule is skipped when its target equals the previous state (no
    /// self-transitions), when the previous state is not in its allowed
    /// set, or when its conditions fail against the snapshot.
    pub fn first_match(&self, previous: StateType, inputs: &InputSnapshot) -> Option<&Rule> {
        for rule in &self.rules {
            let target = rule.target.state_type();
            if target == previous {
                trace!(%target, "skipping rule: would self-transition");
                continue;
            }
            if !rule.accepts_previous(previous) {
                trace!(%target, %previous, "skipping rule: previous state not acceptable");
                continue;
            }
            if !rule.conditions.matches(inputs) {
                trace!(%target, "skipping rule: conditions do not match");
                continue;
            }
            return Some(rule);
        }
        None
    }

    /// All rules in priority order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
