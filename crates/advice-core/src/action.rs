//! # Actions
//!
//! Immutable descriptions of state transitions, and the only code path that
//! applies them to a store.
//!
//! Applying an action:
//! - Atomically replaces the actor's `At` edge (`from` -> `to`)
//! - Appends an `ActionRecord` to the `Did(actor, to)` fact's history
//!
//! Mutation never needs rollback: `replace_object` and `add_fact` cannot fail
//! once the action has been validated.

use crate::primitives::{DRIVE_MODE, WALK_MODE};
use crate::store::{FactStore, Snapshot};
use crate::{ActionRecord, AdviceError, EntityId, Payload, Relation};
use serde::{Deserialize, Serialize};

/// Which rule produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Walk,
    Drive,
}

impl ActionKind {
    /// Default mode label for this kind.
    #[must_use]
    pub const fn default_mode(self) -> &'static str {
        match self {
            ActionKind::Walk => WALK_MODE,
            ActionKind::Drive => DRIVE_MODE,
        }
    }
}

/// A candidate or committed state transition.
///
/// Produced only by the rule engine; immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Action {
    /// The entity whose location changes.
    pub actor: EntityId,
    /// The actor's location before the action.
    pub from: EntityId,
    /// The actor's location after the action.
    pub to: EntityId,
    /// Descriptive label, e.g. "by walking".
    pub mode: String,
    pub kind: ActionKind,
}

impl Action {
    /// Create an action with the kind's default mode label.
    #[must_use]
    pub fn new(actor: EntityId, from: EntityId, to: EntityId, kind: ActionKind) -> Self {
        Self {
            actor,
            from,
            to,
            mode: kind.default_mode().to_string(),
            kind,
        }
    }

    /// Human-readable form, e.g. "car go from home to airport by driving".
    #[must_use]
    pub fn describe(&self, store: &FactStore) -> String {
        format!(
            "{} go from {} to {} {}",
            store.name_of(self.actor),
            store.name_of(self.from),
            store.name_of(self.to),
            self.mode
        )
    }
}

/// Apply one action to a store.
///
/// Fails with `InvalidEntity` if a referenced entity is missing and with
/// `StaleAction` if the actor is no longer directly `At` `from`.
pub fn apply_action(store: &mut FactStore, action: &Action) -> Result<(), AdviceError> {
    store.require(action.actor)?;
    store.require(action.from)?;
    store.require(action.to)?;

    if action.from == action.to {
        return Err(AdviceError::StaleAction(format!(
            "{} would move from {} to itself",
            store.name_of(action.actor),
            store.name_of(action.from)
        )));
    }
    if !store.contains_fact(action.actor, Relation::At, action.from) {
        return Err(AdviceError::StaleAction(format!(
            "{} is no longer at {}",
            store.name_of(action.actor),
            store.name_of(action.from)
        )));
    }

    let mut history = match store.payload(action.actor, Relation::Did, action.to) {
        Some(Payload::History(records)) => records.clone(),
        _ => Vec::new(),
    };
    history.push(ActionRecord::from(action));

    store.replace_object(action.actor, Relation::At, action.to, None);
    store.remove_fact(action.actor, Relation::Did, action.to);
    store.add_fact(
        action.actor,
        Relation::Did,
        action.to,
        Some(Payload::History(history)),
    );
    Ok(())
}

/// Apply a whole plan to the live store, all or nothing.
///
/// The steps are applied to a snapshot first; the store is only replaced when
/// every step succeeded. Returns the number of steps applied.
pub fn commit_plan(store: &mut FactStore, plan: &[Action]) -> Result<usize, AdviceError> {
    let mut staged = store.snapshot();
    for action in plan {
        staged.apply(action)?;
    }
    store.restore(staged);
    Ok(plan.len())
}

impl Snapshot {
    /// Apply an action to this snapshot only.
    pub fn apply(&mut self, action: &Action) -> Result<(), AdviceError> {
        apply_action(self.store_mut(), action)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RelationTraits, Tag};

    fn world() -> (FactStore, EntityId, EntityId, EntityId) {
        let mut store = FactStore::new();
        store.declare(Relation::At, RelationTraits::LOCATION);
        let john = store.add_entity("John", [Tag::Person]).expect("add");
        let home = store.add_entity("home", [Tag::Building]).expect("add");
        let garage = store.add_entity("garage", [Tag::Room]).expect("add");
        store.add_fact(john, Relation::At, home, None);
        store.add_fact(garage, Relation::At, home, None);
        (store, john, home, garage)
    }

    #[test]
    fn apply_moves_actor_and_records_history() {
        let (mut store, john, home, garage) = world();
        let action = Action::new(john, home, garage, ActionKind::Walk);

        apply_action(&mut store, &action).expect("apply");

        assert_eq!(store.objects(john, Relation::At).collect::<Vec<_>>(), vec![garage]);
        assert_eq!(
            store.payload(john, Relation::Did, garage),
            Some(&Payload::History(vec![ActionRecord::from(&action)]))
        );
    }

    #[test]
    fn repeated_trips_append_history() {
        let (mut store, john, home, garage) = world();
        let there = Action::new(john, home, garage, ActionKind::Walk);
        let back = Action::new(john, garage, home, ActionKind::Walk);

        apply_action(&mut store, &there).expect("apply");
        apply_action(&mut store, &back).expect("apply");
        apply_action(&mut store, &there).expect("apply");

        let record = ActionRecord::from(&there);
        assert_eq!(
            store.payload(john, Relation::Did, garage),
            Some(&Payload::History(vec![record.clone(), record]))
        );
        assert_eq!(
            store.payload(john, Relation::Did, home),
            Some(&Payload::History(vec![ActionRecord::from(&back)]))
        );
    }

    #[test]
    fn stale_action_is_rejected() {
        let (mut store, john, home, garage) = world();
        let action = Action::new(john, garage, home, ActionKind::Walk);

        assert!(matches!(
            apply_action(&mut store, &action),
            Err(AdviceError::StaleAction(_))
        ));
        assert!(store.contains_fact(john, Relation::At, home));
    }

    #[test]
    fn self_transition_is_rejected() {
        let (mut store, john, home, _) = world();
        let action = Action::new(john, home, home, ActionKind::Walk);
        assert!(matches!(
            apply_action(&mut store, &action),
            Err(AdviceError::StaleAction(_))
        ));
    }

    #[test]
    fn missing_entity_is_invalid() {
        let (mut store, john, home, _) = world();
        let action = Action::new(john, home, EntityId(77), ActionKind::Walk);
        assert!(matches!(
            apply_action(&mut store, &action),
            Err(AdviceError::InvalidEntity(_))
        ));
    }

    #[test]
    fn commit_plan_is_all_or_nothing() {
        let (mut store, john, home, garage) = world();
        let plan = vec![
            Action::new(john, home, garage, ActionKind::Walk),
            Action::new(john, home, garage, ActionKind::Walk),
        ];

        assert!(commit_plan(&mut store, &plan).is_err());
        assert!(store.contains_fact(john, Relation::At, home));

        let applied = commit_plan(&mut store, &plan[..1]).expect("commit");
        assert_eq!(applied, 1);
        assert!(store.contains_fact(john, Relation::At, garage));
    }

    #[test]
    fn describe_uses_names() {
        let (store, john, home, garage) = world();
        let action = Action::new(john, home, garage, ActionKind::Walk);
        assert_eq!(action.describe(&store), "John go from home to garage by walking");
    }
}
