//! # Planner
//!
//! Breadth-first search over state snapshots.
//!
//! - The root node copies the live store; the live store is never mutated
//! - Every child node owns its own snapshot with one action applied
//! - The goal test runs on every node as it is created
//! - Visited states are identified by a fingerprint of all `At` edges
//!
//! Actions have uniform cost, so the first solution found is a shortest plan
//! in number of actions.

use crate::action::Action;
use crate::primitives::{DEFAULT_MAX_DEPTH, MAX_PLAN_DEPTH};
use crate::rules::RuleEngine;
use crate::store::{FactStore, Snapshot};
use crate::{AdviceError, EntityId, Relation};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Search limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Maximum plan length. Clamped to `MAX_PLAN_DEPTH`.
    pub max_depth: usize,
    /// Maximum number of node expansions, polled between expansions.
    pub max_expansions: Option<usize>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_expansions: None,
        }
    }
}

impl PlannerConfig {
    /// Config with the given depth limit.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.min(MAX_PLAN_DEPTH),
            ..Self::default()
        }
    }

    /// Add an expansion budget.
    #[must_use]
    pub fn max_expansions(mut self, budget: usize) -> Self {
        self.max_expansions = Some(budget);
        self
    }
}

// =============================================================================
// SEARCH NODES
// =============================================================================

/// Canonical identity of a search state: every `At` edge, sorted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fingerprint(BTreeSet<(EntityId, EntityId)>);

impl Fingerprint {
    /// Fingerprint of a store's current locations.
    #[must_use]
    pub fn of(store: &FactStore) -> Self {
        Self(
            store
                .facts()
                .filter(|(_, relation, _, _)| *relation == Relation::At)
                .map(|(subject, _, object, _)| (subject, object))
                .collect(),
        )
    }

    /// Fingerprint after applying `action`, without copying any store.
    #[must_use]
    pub fn after(&self, action: &Action) -> Self {
        let mut edges: BTreeSet<_> = self
            .0
            .iter()
            .filter(|(subject, _)| *subject != action.actor)
            .copied()
            .collect();
        edges.insert((action.actor, action.to));
        Self(edges)
    }

    /// Location edges in canonical order.
    pub fn edges(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.0.iter().copied()
    }
}

/// One state in the search graph. Immutable once created.
#[derive(Debug, Clone)]
pub struct SearchNode {
    snapshot: Snapshot,
    path: Vec<Action>,
    depth: usize,
    fingerprint: Fingerprint,
}

impl SearchNode {
    /// The root node: a copy of the live store and an empty path.
    #[must_use]
    pub fn root(store: &FactStore) -> Self {
        let snapshot = store.snapshot();
        let fingerprint = Fingerprint::of(&snapshot);
        Self {
            snapshot,
            path: Vec::new(),
            depth: 0,
            fingerprint,
        }
    }

    /// A child with `action` applied to a fresh copy of this node's snapshot.
    pub fn child(&self, action: Action, fingerprint: Fingerprint) -> Result<Self, AdviceError> {
        let mut snapshot = self.snapshot.clone();
        snapshot.apply(&action)?;
        let mut path = self.path.clone();
        path.push(action);
        Ok(Self {
            snapshot,
            path,
            depth: self.depth.saturating_add(1),
            fingerprint,
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn path(&self) -> &[Action] {
        &self.path
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

// =============================================================================
// PLANNER
// =============================================================================

/// A found plan together with search statistics.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Actions from the initial state to the goal, in order.
    pub actions: Vec<Action>,
    /// Number of nodes expanded.
    pub expanded: usize,
    /// Number of nodes created, the root included.
    pub generated: usize,
    /// State reached after the last action.
    pub final_state: Snapshot,
}

/// Drives rule evaluation and breadth-first exploration toward one goal.
#[derive(Debug, Clone)]
pub struct Planner {
    engine: RuleEngine,
    goal: EntityId,
    config: PlannerConfig,
}

impl Planner {
    /// Create a planner for `agent` reaching `goal`.
    pub fn new(
        store: &FactStore,
        agent: EntityId,
        goal: EntityId,
        config: PlannerConfig,
    ) -> Result<Self, AdviceError> {
        store.require(agent)?;
        store.require(goal)?;
        Ok(Self {
            engine: RuleEngine::new(agent),
            goal,
            config: PlannerConfig {
                max_depth: config.max_depth.min(MAX_PLAN_DEPTH),
                ..config
            },
        })
    }

    /// Replace the rule engine, e.g. to use a custom rule table.
    #[must_use]
    pub fn with_engine(mut self, engine: RuleEngine) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn agent(&self) -> EntityId {
        self.engine.agent()
    }

    #[must_use]
    pub fn goal(&self) -> EntityId {
        self.goal
    }

    #[must_use]
    pub fn config(&self) -> PlannerConfig {
        self.config
    }

    /// Goal test: the agent is (transitively) `At` the goal.
    ///
    /// An agent aboard a vehicle is wherever the vehicle is.
    #[must_use]
    pub fn is_goal(&self, store: &FactStore) -> bool {
        store.holds(self.agent(), Relation::At, self.goal)
    }

    /// Run the search from the live store's current state.
    pub fn search(&self, store: &FactStore) -> Result<Plan, AdviceError> {
        let root = SearchNode::root(store);
        let mut generated = 1usize;
        let mut expanded = 0usize;

        tracing::debug!(
            agent = %store.name_of(self.agent()),
            goal = %store.name_of(self.goal),
            max_depth = self.config.max_depth,
            "planning started"
        );

        if self.is_goal(root.snapshot()) {
            return Ok(Plan {
                actions: Vec::new(),
                expanded,
                generated,
                final_state: root.snapshot,
            });
        }

        if self.config.max_depth == 0 {
            tracing::debug!("depth limit of zero leaves no room for an action");
            return Err(AdviceError::DepthLimitExceeded { max_depth: 0 });
        }

        let mut visited: BTreeMap<Fingerprint, usize> = BTreeMap::new();
        visited.insert(root.fingerprint.clone(), 0);
        let mut frontier = VecDeque::from([root]);
        let mut truncated = false;

        while let Some(node) = frontier.pop_front() {
            if let Some(budget) = self.config.max_expansions
                && expanded >= budget
            {
                tracing::debug!(expanded, "expansion budget exhausted");
                return Err(AdviceError::BudgetExceeded {
                    expansions: expanded,
                });
            }

            let candidates = self.engine.candidates(node.snapshot())?;

            if node.depth >= self.config.max_depth {
                let unexplored = candidates.iter().any(|action| {
                    let next = node.fingerprint.after(action);
                    visited.get(&next).is_none_or(|&seen| seen > node.depth)
                });
                if unexplored {
                    truncated = true;
                    tracing::trace!(depth = node.depth, "node cut off at depth limit");
                }
                continue;
            }

            expanded = expanded.saturating_add(1);
            tracing::trace!(
                depth = node.depth,
                candidates = candidates.len(),
                frontier = frontier.len(),
                "expanding node"
            );

            for action in candidates {
                let child_depth = node.depth.saturating_add(1);
                let fingerprint = node.fingerprint.after(&action);
                if visited
                    .get(&fingerprint)
                    .is_some_and(|&seen| seen <= child_depth)
                {
                    continue;
                }
                visited.insert(fingerprint.clone(), child_depth);

                let child = node.child(action, fingerprint)?;
                generated = generated.saturating_add(1);

                if self.is_goal(child.snapshot()) {
                    tracing::debug!(
                        steps = child.path.len(),
                        expanded,
                        generated,
                        "goal reached"
                    );
                    return Ok(Plan {
                        actions: child.path,
                        expanded,
                        generated,
                        final_state: child.snapshot,
                    });
                }
                frontier.push_back(child);
            }
        }

        if truncated {
            tracing::debug!(max_depth = self.config.max_depth, "depth limit reached");
            Err(AdviceError::DepthLimitExceeded {
                max_depth: self.config.max_depth,
            })
        } else {
            tracing::debug!(expanded, "search space exhausted");
            Err(AdviceError::Exhausted { explored: expanded })
        }
    }
}

/// Find a shortest action sequence that brings `agent` to `goal`.
///
/// The live store is only read; apply the result with `commit_plan`.
pub fn plan_to(
    store: &FactStore,
    agent: EntityId,
    goal: EntityId,
    max_depth: usize,
) -> Result<Vec<Action>, AdviceError> {
    Planner::new(store, agent, goal, PlannerConfig::with_max_depth(max_depth))?
        .search(store)
        .map(|plan| plan.actions)
}

// =============================================================================
// TESTS
// =============================================================================
