//! # Rule Engine
//!
//! Fixed reasoning rules that derive candidate actions from relational state.
//!
//! Rules are rows of a declarative table: a region relation whose marked
//! areas permit movement, an optional tag every destination must carry, and
//! who moves. Two rows ship with the engine:
//!
//! ```text
//! walk:  walkable(r), at(agent, r), at(p, r)              -> can(go(at(agent), p, walking))
//! drive: drivable(r), at(agent, v), vehicle(v), at(v, r),
//!        at(b, r), building(b)                            -> can(go(at(v), b, driving))
//! ```
//!
//! The engine never mutates the store it evaluates, except through the
//! explicit `assert_conclusions`/`retract_conclusions` pair.

use crate::action::{Action, ActionKind};
use crate::pattern::{Pattern, Term};
use crate::store::FactStore;
use crate::{AdviceError, EntityId, Payload, Relation, Tag};
use std::collections::BTreeSet;

/// Who moves when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mover {
    /// The agent itself.
    Agent,
    /// Every entity carrying the tag that the agent is directly `At`.
    Boarded(Tag),
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub name: &'static str,
    /// Relation marking the regions where the rule applies.
    pub region: Relation,
    /// Tag every destination must carry, if any.
    pub destination_tag: Option<Tag>,
    pub mover: Mover,
    pub kind: ActionKind,
}

impl Rule {
    /// Walk anywhere inside a walkable region the agent is in.
    pub const WALK: Rule = Rule {
        name: "walk",
        region: Relation::Walkable,
        destination_tag: None,
        mover: Mover::Agent,
        kind: ActionKind::Walk,
    };

    /// Drive a boarded vehicle to a building inside a drivable region.
    pub const DRIVE: Rule = Rule {
        name: "drive",
        region: Relation::Drivable,
        destination_tag: Some(Tag::Building),
        mover: Mover::Boarded(Tag::Vehicle),
        kind: ActionKind::Drive,
    };
}

/// The default rule table, in evaluation order.
pub const DEFAULT_RULES: [Rule; 2] = [Rule::WALK, Rule::DRIVE];

/// Evaluates the rule table on behalf of one agent.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    agent: EntityId,
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Create an engine with the default rule table.
    #[must_use]
    pub fn new(agent: EntityId) -> Self {
        Self::with_rules(agent, DEFAULT_RULES.to_vec())
    }

    /// Create an engine with a custom rule table.
    #[must_use]
    pub fn with_rules(agent: EntityId, rules: Vec<Rule>) -> Self {
        Self { agent, rules }
    }

    /// The agent whose trajectory is being reasoned about.
    #[must_use]
    pub fn agent(&self) -> EntityId {
        self.agent
    }

    /// The rule table in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Derive every candidate action, rules in table order, destinations in
    /// ascending `EntityId` order.
    pub fn candidates(&self, store: &FactStore) -> Result<Vec<Action>, AdviceError> {
        store.require(self.agent)?;

        let mut actions = Vec::new();
        for rule in &self.rules {
            let fired = self.fire(rule, store)?;
            tracing::trace!(rule = rule.name, candidates = fired.len(), "rule evaluated");
            actions.extend(fired);
        }
        Ok(actions)
    }

    fn fire(&self, rule: &Rule, store: &FactStore) -> Result<Vec<Action>, AdviceError> {
        let regions = store.query_entities(
            &Pattern::new(Term::var("marker"), rule.region, Term::var("region")),
            "region",
        )?;
        if regions.is_empty() {
            return Ok(Vec::new());
        }

        let movers: Vec<EntityId> = match rule.mover {
            Mover::Agent => vec![self.agent],
            Mover::Boarded(tag) => store
                .objects(self.agent, Relation::At)
                .filter(|candidate| store.has_tag(*candidate, tag))
                .collect(),
        };

        let mut actions = Vec::new();
        for mover in movers {
            let Some(from) = store.target(mover, Relation::At) else {
                continue;
            };
            let around = store.reachable_from(mover, Relation::At);

            let mut destinations = BTreeSet::new();
            for region in regions.iter().filter(|region| around.contains(region)) {
                let pattern = Pattern::subjects_of("place", Relation::At, *region);
                for place in store.query_entities(&pattern, "place")? {
                    if place == mover || place == self.agent || around.contains(&place) {
                        continue;
                    }
                    if rule
                        .destination_tag
                        .is_some_and(|tag| !store.has_tag(place, tag))
                    {
                        continue;
                    }
                    // Never move into something the mover itself contains.
                    if store.holds(place, Relation::At, mover) {
                        continue;
                    }
                    destinations.insert(place);
                }
            }

            actions.extend(
                destinations
                    .into_iter()
                    .map(|to| Action::new(mover, from, to, rule.kind)),
            );
        }
        Ok(actions)
    }

    /// Immediate deduction: write every candidate as a `Can(actor, to)` fact
    /// carrying its action. Returns the number of facts inserted.
    pub fn assert_conclusions(&self, store: &mut FactStore) -> Result<usize, AdviceError> {
        let candidates = self.candidates(store)?;
        let inserted = candidates
            .into_iter()
            .filter(|action| {
                store.add_fact(
                    action.actor,
                    Relation::Can,
                    action.to,
                    Some(Payload::Action(action.clone())),
                )
            })
            .count();
        Ok(inserted)
    }

    /// Remove every `Can` fact. Returns the number removed.
    pub fn retract_conclusions(store: &mut FactStore) -> usize {
        store.retract_all(Relation::Can)
    }

    /// Read back the actions carried by `Can` facts.
    #[must_use]
    pub fn conclusions(store: &FactStore) -> Vec<Action> {
        store
            .facts()
            .filter(|(_, relation, _, _)| *relation == Relation::Can)
            .filter_map(|(_, _, _, payload)| match payload {
                Some(Payload::Action(action)) => Some(action.clone()),
                _ => None,
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelationTraits;

    struct Scene {
        store: FactStore,
        john: EntityId,
        car: EntityId,
        office: EntityId,
        garage: EntityId,
        home: EntityId,
        airport: EntityId,
    }

    fn scene() -> Scene {
        let mut store = FactStore::new();
        store.declare(Relation::At, RelationTraits::LOCATION);
        store.declare(Relation::Walkable, RelationTraits::TRANSITIVE);
        let john = store.add_entity("John", [Tag::Person]).expect("add");
        let car = store.add_entity("car", [Tag::Vehicle]).expect("add");
        let office = store.add_entity("office", [Tag::Room]).expect("add");
        let garage = store.add_entity("garage", [Tag::Room]).expect("add");
        let home = store.add_entity("home", [Tag::Building]).expect("add");
        let airport = store.add_entity("airport", [Tag::Building]).expect("add");
        let country = store.add_entity("country", [Tag::Country]).expect("add");

        store.add_fact(john, Relation::At, home, None);
        store.add_fact(car, Relation::At, home, None);
        store.add_fact(office, Relation::At, home, None);
        store.add_fact(garage, Relation::At, home, None);
        store.add_fact(home, Relation::At, country, None);
        store.add_fact(airport, Relation::At, country, None);
        store.add_fact(home, Relation::Walkable, home, None);
        store.add_fact(country, Relation::Drivable, country, None);

        Scene {
            store,
            john,
            car,
            office,
            garage,
            home,
            airport,
        }
    }

    #[test]
    fn walk_rule_offers_places_inside_walkable_region() {
        let s = scene();
        let actions = RuleEngine::new(s.john).candidates(&s.store).expect("rules");

        let targets: Vec<_> = actions.iter().map(|a| a.to).collect();
        assert_eq!(targets, vec![s.car, s.office, s.garage]);
        assert!(actions.iter().all(|a| a.kind == ActionKind::Walk));
        assert!(actions.iter().all(|a| a.actor == s.john && a.from == s.home));
    }

    #[test]
    fn drive_rule_requires_boarding() {
        let mut s = scene();
        s.store.add_fact(s.john, Relation::At, s.car, None);

        let actions = RuleEngine::new(s.john).candidates(&s.store).expect("rules");
        let drives: Vec<_> = actions
            .iter()
            .filter(|a| a.kind == ActionKind::Drive)
            .collect();

        assert_eq!(drives.len(), 1);
        assert_eq!(drives[0].actor, s.car);
        assert_eq!(drives[0].from, s.home);
        assert_eq!(drives[0].to, s.airport);
        assert_eq!(drives[0].mode, "by driving");
    }

    #[test]
    fn no_self_transitions() {
        let mut s = scene();
        s.store.add_fact(s.john, Relation::At, s.car, None);
        let actions = RuleEngine::new(s.john).candidates(&s.store).expect("rules");
        assert!(actions.iter().all(|a| a.from != a.to));
        assert!(actions.iter().all(|a| a.to != s.home));
    }

    #[test]
    fn agent_outside_region_cannot_walk() {
        let mut s = scene();
        s.store.add_fact(s.john, Relation::At, s.airport, None);
        let actions = RuleEngine::new(s.john).candidates(&s.store).expect("rules");
        assert!(actions.is_empty());
    }

    #[test]
    fn candidates_do_not_mutate() {
        let s = scene();
        let generation = s.store.generation();
        let _ = RuleEngine::new(s.john).candidates(&s.store).expect("rules");
        assert_eq!(s.store.generation(), generation);
    }

    #[test]
    fn unknown_agent_is_invalid() {
        let s = scene();
        assert!(matches!(
            RuleEngine::new(EntityId(99)).candidates(&s.store),
            Err(AdviceError::InvalidEntity(_))
        ));
    }

    #[test]
    fn conclusions_roundtrip_through_can_facts() {
        let mut s = scene();
        let engine = RuleEngine::new(s.john);

        let inserted = engine.assert_conclusions(&mut s.store).expect("assert");
        assert_eq!(inserted, 3);
        assert!(s.store.contains_fact(s.john, Relation::Can, s.garage));

        let concluded = RuleEngine::conclusions(&s.store);
        assert_eq!(concluded, engine.candidates(&s.store).expect("rules"));

        assert_eq!(RuleEngine::retract_conclusions(&mut s.store), 3);
        assert!(RuleEngine::conclusions(&s.store).is_empty());
    }

    #[test]
    fn custom_rule_table_is_respected() {
        let mut s = scene();
        s.store.add_fact(s.john, Relation::At, s.car, None);
        let engine = RuleEngine::with_rules(s.john, vec![Rule::DRIVE]);
        let actions = engine.candidates(&s.store).expect("rules");
        assert_eq!(actions.len(), 1);
        assert_eq!(engine.rules(), &[Rule::DRIVE]);
    }
}
