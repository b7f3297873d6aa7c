//! # Pattern Module
//!
//! Partially-bound triple patterns and their evaluation against a store.
//!
//! - Each slot of a pattern is either bound to a literal or an unbound variable
//! - Evaluation is a generic graph-pattern matcher, not reflection
//! - Transitive relations are expanded per query, never cached
//! - Results are produced lazily in deterministic order

use crate::store::FactStore;
use crate::{AdviceError, EntityId, Relation};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// TERMS
// =============================================================================

/// An entity slot of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Bound(EntityId),
    Var(String),
}

impl Term {
    /// Variable helper.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    fn var_name(&self) -> Option<&str> {
        match self {
            Self::Var(name) => Some(name),
            Self::Bound(_) => None,
        }
    }
}

impl From<EntityId> for Term {
    fn from(id: EntityId) -> Self {
        Self::Bound(id)
    }
}

/// The relation slot of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationTerm {
    Bound(Relation),
    Var(String),
}

impl From<Relation> for RelationTerm {
    fn from(relation: Relation) -> Self {
        Self::Bound(relation)
    }
}

/// A value bound to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Binding {
    Entity(EntityId),
    Relation(Relation),
}

// =============================================================================
// BINDINGS
// =============================================================================

/// One solution of a pattern: variable name -> value.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bindings(BTreeMap<String, Binding>);

impl Bindings {
    /// Create an empty solution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable. Returns `false` if it is already bound to a
    /// different value.
    pub fn bind(&mut self, name: &str, value: Binding) -> bool {
        match self.0.get(name) {
            Some(existing) => *existing == value,
            None => {
                self.0.insert(name.to_string(), value);
                true
            }
        }
    }

    /// Value of a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Binding> {
        self.0.get(name).copied()
    }

    /// Entity bound to a variable.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<EntityId> {
        match self.get(name)? {
            Binding::Entity(id) => Some(id),
            Binding::Relation(_) => None,
        }
    }

    /// Relation bound to a variable.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<Relation> {
        match self.get(name)? {
            Binding::Relation(relation) => Some(relation),
            Binding::Entity(_) => None,
        }
    }

    /// Iterate over bindings in variable-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Binding)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no variable is bound (a fully-bound pattern matched).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// PATTERN
// =============================================================================

/// A partially-bound `(subject, relation, object)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub subject: Term,
    pub relation: RelationTerm,
    pub object: Term,
}

impl Pattern {
    /// Create a new pattern.
    #[must_use]
    pub fn new(
        subject: impl Into<Term>,
        relation: impl Into<RelationTerm>,
        object: impl Into<Term>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    /// `(subject, relation, ?var)` helper.
    #[must_use]
    pub fn objects_of(subject: EntityId, relation: Relation, var: &str) -> Self {
        Self::new(subject, relation, Term::var(var))
    }

    /// `(?var, relation, object)` helper.
    #[must_use]
    pub fn subjects_of(var: &str, relation: Relation, object: EntityId) -> Self {
        Self::new(Term::var(var), relation, object)
    }

    /// Parse `relation(subject, object)`, where each slot is `?name` for a
    /// variable or a literal entity/relation name.
    ///
    /// ```
    /// use advice_core::{FactStore, Pattern, Tag};
    ///
    /// let mut store = FactStore::new();
    /// store.add_entity("home", [Tag::Building]).expect("add");
    /// let pattern = Pattern::parse(&store, "at(?who, home)").expect("parse");
    /// assert!(store.query(&pattern).is_ok());
    /// ```
    pub fn parse(store: &FactStore, text: &str) -> Result<Self, AdviceError> {
        let malformed = || {
            AdviceError::MalformedQueryPattern(format!(
                "expected 'relation(subject, object)', got '{}'",
                text.trim()
            ))
        };

        let text = text.trim();
        let open = text.find('(').ok_or_else(malformed)?;
        let inner = text
            .get(open + 1..)
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;
        let mut slots = inner.split(',');
        let (Some(subject), Some(object), None) = (slots.next(), slots.next(), slots.next()) else {
            return Err(malformed());
        };

        let head = text[..open].trim();
        let relation = match head.strip_prefix('?') {
            Some(name) => RelationTerm::Var(name.to_string()),
            None => RelationTerm::Bound(Relation::from_name(head).ok_or_else(|| {
                AdviceError::MalformedQueryPattern(format!("unknown relation '{}'", head))
            })?),
        };

        let pattern = Self {
            subject: parse_term(store, subject)?,
            relation,
            object: parse_term(store, object)?,
        };
        pattern.validate(store)?;
        Ok(pattern)
    }

    /// Reject patterns that cannot be evaluated.
    ///
    /// A variable may not be empty, and may not appear both in an entity slot
    /// and in the relation slot. Bound entities must exist.
    pub fn validate(&self, store: &FactStore) -> Result<(), AdviceError> {
        for term in [&self.subject, &self.object] {
            match term {
                Term::Bound(id) => {
                    store.require(*id)?;
                }
                Term::Var(name) if name.trim().is_empty() => {
                    return Err(AdviceError::MalformedQueryPattern(
                        "empty variable name".to_string(),
                    ));
                }
                Term::Var(_) => {}
            }
        }

        if let RelationTerm::Var(name) = &self.relation {
            if name.trim().is_empty() {
                return Err(AdviceError::MalformedQueryPattern(
                    "empty relation variable name".to_string(),
                ));
            }
            let clashes = [&self.subject, &self.object]
                .into_iter()
                .any(|term| term.var_name() == Some(name.as_str()));
            if clashes {
                return Err(AdviceError::MalformedQueryPattern(format!(
                    "variable '?{}' bound to both an entity and a relation",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Build the solution for one concrete edge, or `None` if a variable
    /// repeated across slots would need two different values.
    fn solution(&self, subject: EntityId, relation: Relation, object: EntityId) -> Option<Bindings> {
        let mut bindings = Bindings::new();
        if let RelationTerm::Var(name) = &self.relation
            && !bindings.bind(name, Binding::Relation(relation))
        {
            return None;
        }
        if let Term::Var(name) = &self.subject
            && !bindings.bind(name, Binding::Entity(subject))
        {
            return None;
        }
        if let Term::Var(name) = &self.object
            && !bindings.bind(name, Binding::Entity(object))
        {
            return None;
        }
        Some(bindings)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let term = |t: &Term| match t {
            Term::Bound(id) => id.to_string(),
            Term::Var(name) => format!("?{}", name),
        };
        let relation = match &self.relation {
            RelationTerm::Bound(r) => r.name().to_string(),
            RelationTerm::Var(name) => format!("?{}", name),
        };
        write!(f, "{}({}, {})", relation, term(&self.subject), term(&self.object))
    }
}

fn parse_term(store: &FactStore, raw: &str) -> Result<Term, AdviceError> {
    let raw = raw.trim();
    match raw.strip_prefix('?') {
        Some(name) => Ok(Term::Var(name.to_string())),
        None => store.resolve(raw).map(Term::Bound),
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Lazy, restartable sequence of solutions of a pattern.
///
/// Holds a shared borrow of the store, so the store cannot change while a
/// sequence is alive; re-querying after a mutation reflects the new state.
pub struct Matches<'a> {
    inner: Box<dyn Iterator<Item = Bindings> + 'a>,
}

impl Iterator for Matches<'_> {
    type Item = Bindings;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl FactStore {
    /// Evaluate a pattern.
    ///
    /// Relations are scanned in declaration order; within a relation,
    /// solutions are ordered by subject then object `EntityId`.
    pub fn query(&self, pattern: &Pattern) -> Result<Matches<'_>, AdviceError> {
        pattern.validate(self)?;

        let relations: Vec<Relation> = match &pattern.relation {
            RelationTerm::Bound(relation) => vec![*relation],
            RelationTerm::Var(_) => self.relations_in_use().collect(),
        };
        let pattern = pattern.clone();
        let inner = relations
            .into_iter()
            .flat_map(move |relation| self.match_relation(relation, pattern.clone()));

        Ok(Matches {
            inner: Box::new(inner),
        })
    }

    /// Collect a single entity variable across all solutions, ascending and
    /// de-duplicated.
    pub fn query_entities(
        &self,
        pattern: &Pattern,
        var: &str,
    ) -> Result<Vec<EntityId>, AdviceError> {
        let mut found: Vec<EntityId> = self
            .query(pattern)?
            .filter_map(|bindings| bindings.entity(var))
            .collect();
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }

    fn match_relation(
        &self,
        relation: Relation,
        pattern: Pattern,
    ) -> Box<dyn Iterator<Item = Bindings> + '_> {
        match (pattern.subject.clone(), pattern.object.clone()) {
            (Term::Bound(subject), Term::Bound(object)) => {
                let hit = self.holds(subject, relation, object);
                Box::new(
                    hit.then(|| pattern.solution(subject, relation, object))
                        .flatten()
                        .into_iter(),
                )
            }
            (Term::Bound(subject), Term::Var(_)) => Box::new(
                self.reachable_from(subject, relation)
                    .into_iter()
                    .filter_map(move |object| pattern.solution(subject, relation, object)),
            ),
            (Term::Var(_), Term::Bound(object)) => Box::new(
                self.reaching(object, relation)
                    .into_iter()
                    .filter_map(move |subject| pattern.solution(subject, relation, object)),
            ),
            (Term::Var(_), Term::Var(_)) => {
                Box::new(self.subjects_of(relation).flat_map(move |subject| {
                    let pattern = pattern.clone();
                    self.reachable_from(subject, relation)
                        .into_iter()
                        .filter_map(move |object| pattern.solution(subject, relation, object))
                }))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RelationTraits, Tag};

    fn world() -> (FactStore, EntityId, EntityId, EntityId, EntityId) {
        let mut store = FactStore::new();
        store.declare(Relation::At, RelationTraits::LOCATION);
        let john = store.add_entity("John", [Tag::Person]).expect("add");
        let home = store.add_entity("home", [Tag::Building]).expect("add");
        let country = store.add_entity("country", [Tag::Country]).expect("add");
        let airport = store.add_entity("airport", [Tag::Building]).expect("add");
        store.add_fact(john, Relation::At, home, None);
        store.add_fact(home, Relation::At, country, None);
        store.add_fact(airport, Relation::At, country, None);
        store.add_fact(country, Relation::Drivable, country, None);
        (store, john, home, country, airport)
    }

    #[test]
    fn bound_subject_expands_closure() {
        let (store, john, home, country, _) = world();
        let found = store
            .query_entities(&Pattern::objects_of(john, Relation::At, "where"), "where")
            .expect("query");
        assert_eq!(found, vec![home, country]);
    }

    #[test]
    fn bound_object_expands_reverse_closure() {
        let (store, john, home, country, airport) = world();
        let found = store
            .query_entities(&Pattern::subjects_of("who", Relation::At, country), "who")
            .expect("query");
        assert_eq!(found, vec![john, home, airport]);
    }

    #[test]
    fn fully_bound_pattern_yields_empty_solution() {
        let (store, john, _, country, airport) = world();
        let hits: Vec<_> = store
            .query(&Pattern::new(john, Relation::At, country))
            .expect("query")
            .collect();
        assert_eq!(hits, vec![Bindings::new()]);

        let misses = store
            .query(&Pattern::new(john, Relation::At, airport))
            .expect("query")
            .count();
        assert_eq!(misses, 0);
    }

    #[test]
    fn unbound_relation_scans_relations_in_use() {
        let (store, _, _, country, _) = world();
        let pattern = Pattern::new(country, RelationTerm::Var("r".to_string()), country);
        let relations: Vec<_> = store
            .query(&pattern)
            .expect("query")
            .filter_map(|b| b.relation("r"))
            .collect();
        assert_eq!(relations, vec![Relation::Drivable]);
    }

    #[test]
    fn repeated_variable_requires_equal_values() {
        let (store, _, _, country, _) = world();
        let pattern = Pattern::new(Term::var("x"), Relation::Drivable, Term::var("x"));
        let found: Vec<_> = store
            .query(&pattern)
            .expect("query")
            .filter_map(|b| b.entity("x"))
            .collect();
        assert_eq!(found, vec![country]);

        let at_self = store
            .query(&Pattern::new(Term::var("x"), Relation::At, Term::var("x")))
            .expect("query")
            .count();
        assert_eq!(at_self, 0);
    }

    #[test]
    fn mixed_binding_kinds_are_malformed() {
        let (store, _, _, _, _) = world();
        let pattern = Pattern::new(
            Term::var("x"),
            RelationTerm::Var("x".to_string()),
            Term::var("y"),
        );
        assert!(matches!(
            store.query(&pattern),
            Err(AdviceError::MalformedQueryPattern(_))
        ));

        let empty = Pattern::new(Term::var(""), Relation::At, Term::var("y"));
        assert!(matches!(
            store.query(&empty),
            Err(AdviceError::MalformedQueryPattern(_))
        ));
    }

    #[test]
    fn unknown_entity_is_invalid() {
        let (store, _, _, _, _) = world();
        let pattern = Pattern::objects_of(EntityId(404), Relation::At, "x");
        assert!(matches!(
            store.query(&pattern),
            Err(AdviceError::InvalidEntity(_))
        ));
    }

    #[test]
    fn requery_reflects_mutation() {
        let (mut store, john, home, country, airport) = world();
        let pattern = Pattern::objects_of(john, Relation::At, "where");

        store.add_fact(john, Relation::At, airport, None);
        let found = store.query_entities(&pattern, "where").expect("query");
        assert_eq!(found, vec![country, airport]);
        assert!(!found.contains(&home));
    }

    #[test]
    fn parse_textual_patterns() {
        let (store, john, _, country, _) = world();

        let pattern = Pattern::parse(&store, "at(John, ?where)").expect("parse");
        assert_eq!(pattern, Pattern::objects_of(john, Relation::At, "where"));

        let pattern = Pattern::parse(&store, " ?r ( country , country ) ").expect("parse");
        assert_eq!(pattern.relation, RelationTerm::Var("r".to_string()));
        assert_eq!(pattern.subject, Term::Bound(country));
        assert_eq!(pattern.to_string(), format!("?r({}, {})", country, country));
    }

    #[test]
    fn parse_rejects_bad_text() {
        let (store, _, _, _, _) = world();
        for text in ["at John home", "at(John)", "at(a, b, c)", "inside(John, ?x)"] {
            assert!(
                matches!(
                    Pattern::parse(&store, text),
                    Err(AdviceError::MalformedQueryPattern(_))
                ),
                "{} should be malformed",
                text
            );
        }
        assert!(matches!(
            Pattern::parse(&store, "at(Nobody, ?x)"),
            Err(AdviceError::InvalidEntity(_))
        ));
    }
}
