//! # World Descriptions
//!
//! Declarative world population, kept outside the store itself.
//!
//! A `WorldSpec` names entities, relation traits, facts and unary marks by
//! name. `WorldSpec::build` validates every reference and produces a
//! populated `FactStore` together with the resolved agent and goal.

use crate::primitives::{DEFAULT_MAX_DEPTH, MAX_PLAN_DEPTH, MAX_WORLD_ENTITIES};
use crate::store::FactStore;
use crate::{AdviceError, EntityId, Relation, RelationTraits, Tag};
use serde::{Deserialize, Serialize};

// =============================================================================
// DESCRIPTION TYPES
// =============================================================================

/// Traits declared for one relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationSpec {
    pub name: String,
    #[serde(default)]
    pub transitive: bool,
    #[serde(default)]
    pub exclusive: bool,
}

/// One entity with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitySpec {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A binary fact, by entity and relation names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactSpec {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

/// A unary mark such as "home is walkable".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkSpec {
    pub entity: String,
    pub relation: String,
}

/// A complete world: population, agent and goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldSpec {
    pub agent: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default, rename = "relation")]
    pub relations: Vec<RelationSpec>,
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntitySpec>,
    #[serde(default, rename = "fact")]
    pub facts: Vec<FactSpec>,
    #[serde(default, rename = "mark")]
    pub marks: Vec<MarkSpec>,
}

/// A populated store with its resolved agent and goal.
#[derive(Debug, Clone)]
pub struct World {
    pub store: FactStore,
    pub agent: EntityId,
    pub goal: EntityId,
    pub max_depth: usize,
}

// =============================================================================
// BUILDING
// =============================================================================

impl WorldSpec {
    /// Validate the description and populate a fresh store.
    pub fn build(&self) -> Result<World, AdviceError> {
        if self.entities.len() > MAX_WORLD_ENTITIES {
            return Err(AdviceError::InvalidWorld(format!(
                "{} entities exceed the limit of {}",
                self.entities.len(),
                MAX_WORLD_ENTITIES
            )));
        }
        if let Some(depth) = self.max_depth
            && depth > MAX_PLAN_DEPTH
        {
            return Err(AdviceError::InvalidWorld(format!(
                "max_depth {depth} exceeds the limit of {MAX_PLAN_DEPTH}"
            )));
        }

        let mut store = FactStore::new();

        for declared in &self.relations {
            let relation = parse_relation(&declared.name)?;
            store.declare(
                relation,
                RelationTraits {
                    transitive: declared.transitive,
                    exclusive: declared.exclusive,
                },
            );
        }

        for entity in &self.entities {
            store.add_entity(&entity.name, entity.tags.iter().copied())?;
        }

        for fact in &self.facts {
            let subject = lookup(&store, &fact.subject)?;
            let relation = parse_relation(&fact.relation)?;
            let object = lookup(&store, &fact.object)?;
            if subject == object {
                return Err(AdviceError::InvalidWorld(format!(
                    "fact {}({}, {}) relates an entity to itself; use a mark",
                    relation, fact.subject, fact.object
                )));
            }
            if store.traits(relation).exclusive && store.target(subject, relation).is_some() {
                return Err(AdviceError::InvalidWorld(format!(
                    "{} holds more than one {} edge",
                    fact.subject, relation
                )));
            }
            store.add_fact(subject, relation, object, None);
        }

        for mark in &self.marks {
            let entity = lookup(&store, &mark.entity)?;
            let relation = parse_relation(&mark.relation)?;
            store.add_fact(entity, relation, entity, None);
        }

        let agent = lookup(&store, &self.agent)?;
        let goal = lookup(&store, &self.goal)?;

        tracing::debug!(
            entities = store.entity_count(),
            facts = store.fact_count(),
            "world built"
        );

        Ok(World {
            store,
            agent,
            goal,
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        })
    }

    /// The built-in scenario: John McCarthy at home, wanting to reach the
    /// airport.
    #[must_use]
    pub fn advice_taker() -> Self {
        let entity = |name: &str, tag: Tag| EntitySpec {
            name: name.to_string(),
            tags: vec![tag],
        };
        let at = |subject: &str, object: &str| FactSpec {
            subject: subject.to_string(),
            relation: Relation::At.name().to_string(),
            object: object.to_string(),
        };
        let mark = |entity: &str, relation: Relation| MarkSpec {
            entity: entity.to_string(),
            relation: relation.name().to_string(),
        };

        Self {
            agent: JOHN.to_string(),
            goal: AIRPORT.to_string(),
            max_depth: Some(DEFAULT_MAX_DEPTH),
            relations: vec![
                RelationSpec {
                    name: Relation::At.name().to_string(),
                    transitive: true,
                    exclusive: true,
                },
                RelationSpec {
                    name: Relation::Walkable.name().to_string(),
                    transitive: true,
                    exclusive: false,
                },
            ],
            entities: vec![
                entity(JOHN, Tag::Person),
                entity("desk", Tag::Furniture),
                entity("garage", Tag::Room),
                entity("car", Tag::Vehicle),
                entity("office", Tag::Room),
                entity(HOME, Tag::Building),
                entity(AIRPORT, Tag::Building),
                entity(COUNTRY, Tag::Country),
            ],
            facts: vec![
                at(JOHN, HOME),
                at("desk", "office"),
                at("office", HOME),
                at("car", HOME),
                at("garage", HOME),
                at(HOME, COUNTRY),
                at(AIRPORT, COUNTRY),
            ],
            marks: vec![
                mark(COUNTRY, Relation::Drivable),
                mark(HOME, Relation::Walkable),
            ],
        }
    }
}

const JOHN: &str = "John McCarthy";
const HOME: &str = "885 Allardice Way";
const AIRPORT: &str = "San Francisco International Airport";
const COUNTRY: &str = "United States";

/// Build the built-in Advice Taker scenario.
pub fn advice_taker_world() -> Result<World, AdviceError> {
    WorldSpec::advice_taker().build()
}

fn parse_relation(name: &str) -> Result<Relation, AdviceError> {
    Relation::from_name(name)
        .ok_or_else(|| AdviceError::InvalidWorld(format!("unknown relation '{name}'")))
}

fn lookup(store: &FactStore, name: &str) -> Result<EntityId, AdviceError> {
    store
        .entity_by_name(name)
        .ok_or_else(|| AdviceError::InvalidWorld(format!("undeclared entity '{name}'")))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_to;

    #[test]
    fn builtin_world_builds() {
        let world = advice_taker_world().expect("world");
        assert_eq!(world.store.entity_count(), 8);
        assert_eq!(world.store.name_of(world.agent), JOHN);
        assert_eq!(world.store.name_of(world.goal), AIRPORT);
        assert_eq!(world.max_depth, DEFAULT_MAX_DEPTH);

        let home = world.store.resolve(HOME).expect("home");
        assert!(world.store.contains_fact(home, Relation::Walkable, home));
        assert!(world.store.is_transitive(Relation::At));
        assert!(!world.store.is_transitive(Relation::Drivable));
    }

    #[test]
    fn builtin_world_is_solvable() {
        let world = advice_taker_world().expect("world");
        let plan = plan_to(&world.store, world.agent, world.goal, world.max_depth).expect("plan");
        let steps: Vec<_> = plan.iter().map(|a| a.describe(&world.store)).collect();
        assert_eq!(
            steps,
            vec![
                "John McCarthy go from 885 Allardice Way to car by walking".to_string(),
                "car go from 885 Allardice Way to San Francisco International Airport by driving"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn undeclared_entity_is_rejected() {
        let mut description = WorldSpec::advice_taker();
        description.facts.push(FactSpec {
            subject: "car".to_string(),
            relation: "at".to_string(),
            object: "moon".to_string(),
        });
        assert!(matches!(description.build(), Err(AdviceError::InvalidWorld(_))));
    }

    #[test]
    fn unknown_relation_is_rejected() {
        let mut description = WorldSpec::advice_taker();
        description.marks.push(MarkSpec {
            entity: "garage".to_string(),
            relation: "flyable".to_string(),
        });
        assert!(matches!(description.build(), Err(AdviceError::InvalidWorld(_))));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut description = WorldSpec::advice_taker();
        description.entities.push(EntitySpec {
            name: "desk".to_string(),
            tags: Vec::new(),
        });
        assert!(matches!(description.build(), Err(AdviceError::InvalidWorld(_))));
    }

    #[test]
    fn second_location_is_rejected() {
        let mut description = WorldSpec::advice_taker();
        description.facts.push(FactSpec {
            subject: "car".to_string(),
            relation: "at".to_string(),
            object: AIRPORT.to_string(),
        });
        assert!(matches!(description.build(), Err(AdviceError::InvalidWorld(_))));
    }

    #[test]
    fn depth_above_ceiling_is_rejected() {
        let mut description = WorldSpec::advice_taker();
        description.max_depth = Some(MAX_PLAN_DEPTH + 1);
        assert!(matches!(description.build(), Err(AdviceError::InvalidWorld(_))));
    }

    #[test]
    fn unknown_goal_is_rejected() {
        let mut description = WorldSpec::advice_taker();
        description.goal = "Mars".to_string();
        assert!(matches!(description.build(), Err(AdviceError::InvalidWorld(_))));
    }

    #[test]
    fn description_survives_json() {
        let description = WorldSpec::advice_taker();
        let json = serde_json::to_string(&description).expect("serialize");
        assert!(json.contains("\"entity\""));
        let back: WorldSpec = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, description);
    }
}
