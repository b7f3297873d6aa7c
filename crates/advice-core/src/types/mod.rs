//! # Core Type Definitions
//!
//! This module contains the vocabulary of the Advice Taker world:
//! - Entity identifiers and records (`EntityId`, `Entity`, `Tag`)
//! - Relation kinds and their declared traits (`Relation`, `RelationTraits`)
//! - Fact payloads (`Payload`, `ActionRecord`)
//! - Error types (`AdviceError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer identifiers only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use crate::action::{Action, ActionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// ENTITY
// =============================================================================

/// Opaque identifier of an entity owned by a fact store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unary classification of an entity, fixed when the entity is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Person,
    Furniture,
    Vehicle,
    Room,
    Building,
    Facility,
    Country,
}

/// A participant in the world: person, place or object.
///
/// Entities are never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// The identifier assigned by the owning store.
    pub id: EntityId,
    /// Human-readable, store-unique name.
    pub name: String,
    /// Classification tags.
    pub tags: BTreeSet<Tag>,
}

impl Entity {
    /// Create a new entity record.
    #[must_use]
    pub fn new(id: EntityId, name: impl Into<String>, tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            id,
            name: name.into(),
            tags: tags.into_iter().collect(),
        }
    }

    /// Check whether the entity carries a tag.
    #[must_use]
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

// =============================================================================
// RELATIONS
// =============================================================================

/// The kinds of directed edges a fact can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// `At(x, y)`: x is located at/in y.
    At,
    /// `Walkable(r, r)` marks a region; further edges extend it.
    Walkable,
    /// `Drivable(r, r)` marks a region; further edges extend it.
    Drivable,
    /// `Can(actor, to)` carries a derived `Action` payload.
    Can,
    /// `Did(actor, to)` carries every `ActionRecord` of moves to `to`.
    Did,
}

impl Relation {
    /// Every relation kind, in declaration order.
    pub const ALL: [Relation; 5] = [
        Relation::At,
        Relation::Walkable,
        Relation::Drivable,
        Relation::Can,
        Relation::Did,
    ];

    /// Lower-case name used in patterns and world files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Relation::At => "at",
            Relation::Walkable => "walkable",
            Relation::Drivable => "drivable",
            Relation::Can => "can",
            Relation::Did => "did",
        }
    }

    /// Parse a relation name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|relation| relation.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Traits declared for a relation when the world is initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationTraits {
    /// `(a, R, b)` and `(b, R, c)` imply `(a, R, c)` for queries.
    pub transitive: bool,
    /// A subject holds at most one edge of this relation.
    pub exclusive: bool,
}

impl RelationTraits {
    /// No traits.
    pub const PLAIN: Self = Self {
        transitive: false,
        exclusive: false,
    };

    /// Transitive only.
    pub const TRANSITIVE: Self = Self {
        transitive: true,
        exclusive: false,
    };

    /// Transitive and exclusive, as used for locations.
    pub const LOCATION: Self = Self {
        transitive: true,
        exclusive: true,
    };
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Historical record of an applied action, carried by `Did` facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub from: EntityId,
    pub to: EntityId,
    pub mode: String,
    pub kind: ActionKind,
}

impl From<&Action> for ActionRecord {
    fn from(action: &Action) -> Self {
        Self {
            from: action.from,
            to: action.to,
            mode: action.mode.clone(),
            kind: action.kind,
        }
    }
}

/// Optional data attached to a fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// A derived, not yet applied action (`Can`).
    Action(Action),
    /// Applied actions of one actor to one destination, oldest first (`Did`).
    History(Vec<ActionRecord>),
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Advice Taker.
///
/// `Exhausted`, `DepthLimitExceeded` and `BudgetExceeded` are expected search
/// outcomes. `InvalidEntity` and `MalformedQueryPattern` indicate caller
/// misuse and are never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdviceError {
    /// The frontier emptied without reaching the goal.
    #[error("No plan exists: search exhausted after expanding {explored} states")]
    Exhausted { explored: usize },

    /// The goal was not found within the configured depth.
    #[error("Depth limit {max_depth} reached before the goal")]
    DepthLimitExceeded { max_depth: usize },

    /// The expansion budget ran out.
    #[error("Expansion budget exceeded after {expansions} expansions")]
    BudgetExceeded { expansions: usize },

    /// A referenced entity does not exist in the store.
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// A query pattern was rejected before execution.
    #[error("Malformed query pattern: {0}")]
    MalformedQueryPattern(String),

    /// An action no longer matches the actor's current location.
    #[error("Stale action: {0}")]
    StaleAction(String),

    /// A world description is inconsistent.
    #[error("Invalid world: {0}")]
    InvalidWorld(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl AdviceError {
    /// Whether the error is an expected search outcome rather than misuse.
    #[must_use]
    pub fn is_search_outcome(&self) -> bool {
        matches!(
            self,
            Self::Exhausted { .. } | Self::DepthLimitExceeded { .. } | Self::BudgetExceeded { .. }
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
