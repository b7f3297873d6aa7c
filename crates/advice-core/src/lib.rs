//! # advice-core
//!
//! The deterministic reasoning engine of the Advice Taker - THE LOGIC.
//!
//! A world of entities connected by typed, optionally transitive relations;
//! a small table of rules deriving candidate actions from the current state;
//! and a breadth-first planner that applies actions to snapshots until an
//! agent reaches its goal.
//!
//! ## Architectural Constraints
//!
//! The core:
//! - Owns no global state: every operation takes an explicit `FactStore`
//! - Never mutates the live store during search, only snapshots
//! - Is deterministic: `BTreeMap`/`BTreeSet` iteration, no floats, no randomness
//! - Has NO async, NO network dependencies (pure Rust)
//! - Emits `tracing` events but never installs a subscriber

// =============================================================================
// MODULES
// =============================================================================

pub mod action;
pub mod formats;
pub mod pattern;
pub mod planner;
pub mod primitives;
pub mod rules;
pub mod store;
pub mod types;
pub mod world;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ActionRecord, AdviceError, Entity, EntityId, Payload, Relation, RelationTraits, Tag,
};

// =============================================================================
// RE-EXPORTS: Reasoning
// =============================================================================

pub use action::{Action, ActionKind, apply_action, commit_plan};
pub use pattern::{Binding, Bindings, Matches, Pattern, RelationTerm, Term};
pub use planner::{Fingerprint, Plan, Planner, PlannerConfig, SearchNode, plan_to};
pub use rules::{DEFAULT_RULES, Mover, Rule, RuleEngine};
pub use store::{FactStore, SerializableFact, SerializableStore, Snapshot};
pub use world::{World, WorldSpec, advice_taker_world};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, snapshot_from_bytes, snapshot_to_bytes, store_to_bytes};
