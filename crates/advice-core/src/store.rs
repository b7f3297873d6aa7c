//! # Fact Store
//!
//! The deterministic relational fact storage of the reasoning core.
//!
//! Facts are directed, typed edges `(subject, relation, object)` with an
//! optional payload. All data structures use `BTreeMap` for deterministic
//! ordering, so every query enumerates results in ascending `EntityId` order.
//!
//! Transitive closure is never materialised: it is recomputed per query by a
//! breadth-first traversal guarded by a visited set.

use crate::primitives::MAX_NAME_LENGTH;
use crate::{AdviceError, Entity, EntityId, Payload, Relation, RelationTraits, Tag};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Deref;

/// Adjacency list of one relation: subject -> (object -> payload).
type Adjacency = BTreeMap<EntityId, BTreeMap<EntityId, Option<Payload>>>;

/// Reverse adjacency of one relation: object -> subjects.
type ReverseAdjacency = BTreeMap<EntityId, BTreeSet<EntityId>>;

// =============================================================================
// FACT STORE
// =============================================================================

/// An explicitly owned store of entities and relational facts.
///
/// `add_fact` and `remove_fact` never fail; they report whether the store
/// changed. Facts naming unknown entities are ignored.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    /// Entity storage: EntityId -> Entity
    entities: BTreeMap<EntityId, Entity>,

    /// Reverse lookup: name -> EntityId
    name_index: BTreeMap<String, EntityId>,

    /// Declared relation traits. Undeclared relations are plain.
    traits: BTreeMap<Relation, RelationTraits>,

    /// Forward edges per relation.
    forward: BTreeMap<Relation, Adjacency>,

    /// Reverse edges per relation, for `(?, R, x)` lookups.
    reverse: BTreeMap<Relation, ReverseAdjacency>,

    /// Next available EntityId
    next_entity_id: u64,

    /// Bumped on every change; lets callers detect mutation.
    generation: u64,
}

impl FactStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Entities
    // -------------------------------------------------------------------------

    /// Create an entity with a unique, non-empty name.
    pub fn add_entity(
        &mut self,
        name: impl Into<String>,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Result<EntityId, AdviceError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_NAME_LENGTH {
            return Err(AdviceError::InvalidWorld(format!(
                "entity name must be 1..={} characters",
                MAX_NAME_LENGTH
            )));
        }
        if self.name_index.contains_key(trimmed) {
            return Err(AdviceError::InvalidWorld(format!(
                "duplicate entity name '{}'",
                trimmed
            )));
        }

        let id = EntityId(self.next_entity_id);
        self.next_entity_id = self.next_entity_id.saturating_add(1);

        self.name_index.insert(trimmed.to_string(), id);
        self.entities.insert(id, Entity::new(id, trimmed, tags));
        self.touch();
        Ok(id)
    }

    /// Get an entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get an entity by id, failing with `InvalidEntity` when it is unknown.
    pub fn require(&self, id: EntityId) -> Result<&Entity, AdviceError> {
        self.entities
            .get(&id)
            .ok_or_else(|| AdviceError::InvalidEntity(format!("no entity with id {}", id)))
    }

    /// Look up an entity id by name.
    #[must_use]
    pub fn entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.name_index.get(name.trim()).copied()
    }

    /// Resolve a name, failing with `InvalidEntity` when it is unknown.
    pub fn resolve(&self, name: &str) -> Result<EntityId, AdviceError> {
        self.entity_by_name(name)
            .ok_or_else(|| AdviceError::InvalidEntity(format!("no entity named '{}'", name.trim())))
    }

    /// Human-readable name of an entity, or its id when unknown.
    #[must_use]
    pub fn name_of(&self, id: EntityId) -> String {
        self.entities
            .get(&id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Check whether an entity carries a tag.
    #[must_use]
    pub fn has_tag(&self, id: EntityId, tag: Tag) -> bool {
        self.entities.get(&id).is_some_and(|e| e.has_tag(tag))
    }

    /// Check if the store contains an entity.
    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// All entities in deterministic order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Total number of entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // -------------------------------------------------------------------------
    // Relation traits
    // -------------------------------------------------------------------------

    /// Declare the traits of a relation.
    ///
    /// Declaring a relation exclusive does not prune edges already present.
    pub fn declare(&mut self, relation: Relation, traits: RelationTraits) {
        if self.traits.insert(relation, traits) != Some(traits) {
            self.touch();
        }
    }

    /// Declared traits of a relation.
    #[must_use]
    pub fn traits(&self, relation: Relation) -> RelationTraits {
        self.traits.get(&relation).copied().unwrap_or_default()
    }

    /// Whether queries over `relation` expand its transitive closure.
    #[must_use]
    pub fn is_transitive(&self, relation: Relation) -> bool {
        self.traits(relation).transitive
    }

    /// Relations that currently hold at least one fact.
    pub fn relations_in_use(&self) -> impl Iterator<Item = Relation> + '_ {
        self.forward
            .iter()
            .filter(|(_, adjacency)| !adjacency.is_empty())
            .map(|(relation, _)| *relation)
    }

    // -------------------------------------------------------------------------
    // Facts
    // -------------------------------------------------------------------------

    /// Insert a fact. Returns `true` if the store changed.
    ///
    /// Inserting an existing edge is a no-op and keeps its payload. For an
    /// exclusive relation, the subject's previous edge is replaced.
    pub fn add_fact(
        &mut self,
        subject: EntityId,
        relation: Relation,
        object: EntityId,
        payload: Option<Payload>,
    ) -> bool {
        if !self.contains_entity(subject) || !self.contains_entity(object) {
            return false;
        }
        if self.contains_fact(subject, relation, object) {
            return false;
        }
        if self.traits(relation).exclusive {
            self.clear_objects(subject, relation);
        }

        self.forward
            .entry(relation)
            .or_default()
            .entry(subject)
            .or_default()
            .insert(object, payload);
        self.reverse
            .entry(relation)
            .or_default()
            .entry(object)
            .or_default()
            .insert(subject);
        self.touch();
        true
    }

    /// Remove a fact if present. Returns `true` if the store changed.
    pub fn remove_fact(&mut self, subject: EntityId, relation: Relation, object: EntityId) -> bool {
        let Some(adjacency) = self.forward.get_mut(&relation) else {
            return false;
        };
        let Some(targets) = adjacency.get_mut(&subject) else {
            return false;
        };
        if targets.remove(&object).is_none() {
            return false;
        }
        if targets.is_empty() {
            adjacency.remove(&subject);
        }
        if let Some(reverse) = self.reverse.get_mut(&relation)
            && let Some(sources) = reverse.get_mut(&object)
        {
            sources.remove(&subject);
            if sources.is_empty() {
                reverse.remove(&object);
            }
        }
        self.touch();
        true
    }

    /// Atomically replace every `relation` edge of `subject` with one edge to
    /// `object`.
    pub fn replace_object(
        &mut self,
        subject: EntityId,
        relation: Relation,
        object: EntityId,
        payload: Option<Payload>,
    ) -> bool {
        if !self.contains_entity(subject) || !self.contains_entity(object) {
            return false;
        }
        let already = self.objects(subject, relation).eq([object]);
        if already {
            return false;
        }
        self.clear_objects(subject, relation);
        self.add_fact(subject, relation, object, payload)
    }

    /// Remove every fact of a relation. Returns the number removed.
    pub fn retract_all(&mut self, relation: Relation) -> usize {
        let removed = self
            .forward
            .remove(&relation)
            .map(|adjacency| adjacency.values().map(BTreeMap::len).sum())
            .unwrap_or(0);
        self.reverse.remove(&relation);
        if removed > 0 {
            self.touch();
        }
        removed
    }

    /// Check for a stored (direct) edge.
    #[must_use]
    pub fn contains_fact(&self, subject: EntityId, relation: Relation, object: EntityId) -> bool {
        self.forward
            .get(&relation)
            .and_then(|adjacency| adjacency.get(&subject))
            .is_some_and(|targets| targets.contains_key(&object))
    }

    /// Check whether a fact holds, following the closure of transitive
    /// relations.
    #[must_use]
    pub fn holds(&self, subject: EntityId, relation: Relation, object: EntityId) -> bool {
        if self.contains_fact(subject, relation, object) {
            return true;
        }
        self.is_transitive(relation) && self.closure_from(subject, relation).contains(&object)
    }

    /// Payload of a stored edge.
    #[must_use]
    pub fn payload(
        &self,
        subject: EntityId,
        relation: Relation,
        object: EntityId,
    ) -> Option<&Payload> {
        self.forward
            .get(&relation)?
            .get(&subject)?
            .get(&object)?
            .as_ref()
    }

    /// Direct objects of `subject` under `relation`, ascending.
    pub fn objects(
        &self,
        subject: EntityId,
        relation: Relation,
    ) -> impl Iterator<Item = EntityId> + '_ {
        self.forward
            .get(&relation)
            .and_then(|adjacency| adjacency.get(&subject))
            .into_iter()
            .flat_map(|targets| targets.keys().copied())
    }

    /// Direct subjects pointing at `object` under `relation`, ascending.
    pub fn subjects(
        &self,
        relation: Relation,
        object: EntityId,
    ) -> impl Iterator<Item = EntityId> + '_ {
        self.reverse
            .get(&relation)
            .and_then(|reverse| reverse.get(&object))
            .into_iter()
            .flat_map(|sources| sources.iter().copied())
    }

    /// Subjects holding at least one edge of `relation`, ascending.
    pub fn subjects_of(&self, relation: Relation) -> impl Iterator<Item = EntityId> + '_ {
        self.forward
            .get(&relation)
            .into_iter()
            .flat_map(|adjacency| adjacency.keys().copied())
    }

    /// The first direct object of `subject` under `relation`.
    ///
    /// For exclusive relations this is the only one.
    #[must_use]
    pub fn target(&self, subject: EntityId, relation: Relation) -> Option<EntityId> {
        self.objects(subject, relation).next()
    }

    /// All stored facts in deterministic order.
    pub fn facts(
        &self,
    ) -> impl Iterator<Item = (EntityId, Relation, EntityId, Option<&Payload>)> + '_ {
        self.forward.iter().flat_map(|(relation, adjacency)| {
            adjacency.iter().flat_map(move |(subject, targets)| {
                targets
                    .iter()
                    .map(move |(object, payload)| (*subject, *relation, *object, payload.as_ref()))
            })
        })
    }

    /// Total number of stored facts.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.forward
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    // -------------------------------------------------------------------------
    // Closure
    // -------------------------------------------------------------------------

    /// Every entity reachable from `subject` through one or more `relation`
    /// edges. `subject` itself is included only when it lies on a cycle.
    #[must_use]
    pub fn closure_from(&self, subject: EntityId, relation: Relation) -> BTreeSet<EntityId> {
        self.traverse(subject, |node| self.objects(node, relation).collect())
    }

    /// Every entity that reaches `object` through one or more `relation`
    /// edges. `object` itself is included only when it lies on a cycle.
    #[must_use]
    pub fn closure_to(&self, object: EntityId, relation: Relation) -> BTreeSet<EntityId> {
        self.traverse(object, |node| self.subjects(relation, node).collect())
    }

    /// Objects related to `subject`: the closure for transitive relations,
    /// direct edges otherwise.
    #[must_use]
    pub fn reachable_from(&self, subject: EntityId, relation: Relation) -> BTreeSet<EntityId> {
        if self.is_transitive(relation) {
            self.closure_from(subject, relation)
        } else {
            self.objects(subject, relation).collect()
        }
    }

    /// Subjects related to `object`: the closure for transitive relations,
    /// direct edges otherwise.
    #[must_use]
    pub fn reaching(&self, object: EntityId, relation: Relation) -> BTreeSet<EntityId> {
        if self.is_transitive(relation) {
            self.closure_to(object, relation)
        } else {
            self.subjects(relation, object).collect()
        }
    }

    /// Breadth-first traversal; each entity is expanded at most once.
    fn traverse<F>(&self, start: EntityId, step: F) -> BTreeSet<EntityId>
    where
        F: Fn(EntityId) -> Vec<EntityId>,
    {
        let mut reached = BTreeSet::new();
        let mut expanded = BTreeSet::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        expanded.insert(start);

        while let Some(current) = queue.pop_front() {
            for next in step(current) {
                reached.insert(next);
                if expanded.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        reached
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Take an independent deep copy of the store. O(number of facts).
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            store: self.clone(),
        }
    }

    /// Replace the store's contents with a snapshot's contents.
    pub fn restore(&mut self, snapshot: Snapshot) {
        let generation = self.generation;
        *self = snapshot.store;
        self.generation = generation.max(self.generation).saturating_add(1);
    }

    /// Mutation counter; changes whenever the store's contents change.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn clear_objects(&mut self, subject: EntityId, relation: Relation) {
        let objects: Vec<EntityId> = self.objects(subject, relation).collect();
        for object in objects {
            self.remove_fact(subject, relation, object);
        }
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// An independent copy of a store's contents at a point in time.
///
/// A snapshot shares no mutable data with the store it was taken from or with
/// other snapshots. It derefs to `FactStore` for read-only queries; the only
/// way to mutate it is to apply actions to it.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    store: FactStore,
}

impl Snapshot {
    /// Read access to the copied store.
    #[must_use]
    pub fn store(&self) -> &FactStore {
        &self.store
    }

    /// Unwrap the copied store.
    #[must_use]
    pub fn into_store(self) -> FactStore {
        self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut FactStore {
        &mut self.store
    }
}

impl Deref for Snapshot {
    type Target = FactStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl From<FactStore> for Snapshot {
    fn from(store: FactStore) -> Self {
        Self { store }
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// One stored fact in serializable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableFact {
    pub subject: EntityId,
    pub relation: Relation,
    pub object: EntityId,
    pub payload: Option<Payload>,
}

/// Serializable representation of a store, for inspection and dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableStore {
    pub entities: Vec<Entity>,
    pub relations: Vec<(Relation, RelationTraits)>,
    pub facts: Vec<SerializableFact>,
    pub next_entity_id: u64,
}

impl From<&FactStore> for SerializableStore {
    fn from(store: &FactStore) -> Self {
        Self {
            entities: store.entities.values().cloned().collect(),
            relations: store.traits.iter().map(|(r, t)| (*r, *t)).collect(),
            facts: store
                .facts()
                .map(|(subject, relation, object, payload)| SerializableFact {
                    subject,
                    relation,
                    object,
                    payload: payload.cloned(),
                })
                .collect(),
            next_entity_id: store.next_entity_id,
        }
    }
}

impl From<SerializableStore> for FactStore {
    fn from(ss: SerializableStore) -> Self {
        let mut store = FactStore::new();
        store.next_entity_id = ss.next_entity_id;

        for entity in ss.entities {
            if entity.id.0 >= store.next_entity_id {
                store.next_entity_id = entity.id.0.saturating_add(1);
            }
            store.name_index.insert(entity.name.clone(), entity.id);
            store.entities.insert(entity.id, entity);
        }

        for (relation, traits) in ss.relations {
            store.traits.insert(relation, traits);
        }

        for fact in ss.facts {
            let _ = store.add_fact(fact.subject, fact.relation, fact.object, fact.payload);
        }

        store
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (FactStore, EntityId, EntityId, EntityId) {
        let mut store = FactStore::new();
        store.declare(Relation::At, RelationTraits::TRANSITIVE);
        let desk = store.add_entity("desk", [Tag::Furniture]).expect("add");
        let office = store.add_entity("office", [Tag::Room]).expect("add");
        let home = store.add_entity("home", [Tag::Building]).expect("add");
        store.add_fact(desk, Relation::At, office, None);
        store.add_fact(office, Relation::At, home, None);
        (store, desk, office, home)
    }

    #[test]
    fn add_entity_rejects_duplicates_and_empty_names() {
        let mut store = FactStore::new();
        store.add_entity("home", []).expect("add");

        assert!(matches!(
            store.add_entity(" home ", []),
            Err(AdviceError::InvalidWorld(_))
        ));
        assert!(matches!(
            store.add_entity("   ", []),
            Err(AdviceError::InvalidWorld(_))
        ));
        assert_eq!(store.entity_count(), 1);
    }

    #[test]
    fn add_fact_is_idempotent() {
        let (mut store, desk, office, _) = chain();
        let before = store.fact_count();

        assert!(!store.add_fact(desk, Relation::At, office, None));
        assert_eq!(store.fact_count(), before);
    }

    #[test]
    fn remove_missing_fact_is_noop() {
        let (mut store, desk, _, home) = chain();
        let generation = store.generation();

        assert!(!store.remove_fact(desk, Relation::At, home));
        assert!(!store.remove_fact(desk, Relation::Did, home));
        assert_eq!(store.generation(), generation);
    }

    #[test]
    fn dangling_facts_are_ignored() {
        let (mut store, desk, _, _) = chain();
        assert!(!store.add_fact(desk, Relation::At, EntityId(999), None));
        assert!(!store.contains_fact(desk, Relation::At, EntityId(999)));
    }

    #[test]
    fn closure_is_computed_not_materialised() {
        let (store, desk, office, home) = chain();

        assert!(store.holds(desk, Relation::At, home));
        assert!(!store.contains_fact(desk, Relation::At, home));
        assert_eq!(store.fact_count(), 2);
        assert_eq!(
            store.closure_from(desk, Relation::At),
            BTreeSet::from([office, home])
        );
        assert_eq!(
            store.closure_to(home, Relation::At),
            BTreeSet::from([desk, office])
        );
    }

    #[test]
    fn non_transitive_relation_does_not_chain() {
        let (mut store, desk, _, home) = chain();
        store.declare(Relation::At, RelationTraits::PLAIN);
        assert!(!store.holds(desk, Relation::At, home));
    }

    #[test]
    fn closure_terminates_on_cycles() {
        let (mut store, desk, office, home) = chain();
        store.add_fact(home, Relation::At, desk, None);

        let reached = store.closure_from(desk, Relation::At);
        assert_eq!(reached, BTreeSet::from([desk, office, home]));
    }

    #[test]
    fn closure_follows_long_chains() {
        let mut store = FactStore::new();
        store.declare(Relation::At, RelationTraits::LOCATION);
        let ids: Vec<EntityId> = (0..300)
            .map(|i| store.add_entity(format!("p{i}"), []).expect("add"))
            .collect();
        for pair in ids.windows(2) {
            store.add_fact(pair[0], Relation::At, pair[1], None);
        }
        let first = ids[0];
        let last = ids[299];

        assert_eq!(store.closure_from(first, Relation::At).len(), 299);
        assert_eq!(store.closure_to(last, Relation::At).len(), 299);
        assert!(store.holds(first, Relation::At, last));
    }

    #[test]
    fn exclusive_relation_replaces_previous_edge() {
        let (mut store, desk, office, home) = chain();
        store.declare(Relation::At, RelationTraits::LOCATION);

        assert!(store.add_fact(desk, Relation::At, home, None));
        assert_eq!(store.objects(desk, Relation::At).collect::<Vec<_>>(), vec![home]);
        assert!(!store.contains_fact(desk, Relation::At, office));
        assert_eq!(store.subjects(Relation::At, office).count(), 0);
    }

    #[test]
    fn replace_object_is_atomic() {
        let (mut store, desk, office, home) = chain();
        store.add_fact(desk, Relation::At, home, None);
        assert_eq!(store.objects(desk, Relation::At).count(), 2);

        assert!(store.replace_object(desk, Relation::At, office, None));
        assert_eq!(store.objects(desk, Relation::At).collect::<Vec<_>>(), vec![office]);
        assert!(!store.replace_object(desk, Relation::At, office, None));
    }

    #[test]
    fn snapshot_is_isolated_both_ways() {
        let (mut store, desk, office, home) = chain();
        let mut snapshot = store.snapshot();

        store.remove_fact(desk, Relation::At, office);
        assert!(snapshot.holds(desk, Relation::At, home));

        snapshot.store_mut().remove_fact(office, Relation::At, home);
        assert!(store.contains_fact(office, Relation::At, home));
    }

    #[test]
    fn restore_replaces_contents() {
        let (mut store, desk, office, _) = chain();
        let snapshot = store.snapshot();
        store.remove_fact(desk, Relation::At, office);
        let generation = store.generation();

        store.restore(snapshot);
        assert!(store.contains_fact(desk, Relation::At, office));
        assert!(store.generation() > generation);
    }

    #[test]
    fn retract_all_clears_relation() {
        let (mut store, desk, office, home) = chain();
        store.add_fact(desk, Relation::Can, home, None);
        store.add_fact(office, Relation::Can, desk, None);

        assert_eq!(store.retract_all(Relation::Can), 2);
        assert_eq!(store.subjects_of(Relation::Can).count(), 0);
        assert_eq!(store.retract_all(Relation::Can), 0);
    }

    #[test]
    fn serializable_store_roundtrip() {
        let (store, desk, _, home) = chain();
        let restored = FactStore::from(SerializableStore::from(&store));

        assert_eq!(restored.entity_count(), store.entity_count());
        assert_eq!(restored.fact_count(), store.fact_count());
        assert!(restored.holds(desk, Relation::At, home));
        assert_eq!(restored.entity_by_name("office"), store.entity_by_name("office"));
    }
}
