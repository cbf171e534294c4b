use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    constraints::TypeConstraint,
    env::Env,
    error::{UnifyError, UnifyResult},
    state::NameFactory,
    unify::unify,
    value::Value,
};

/// A type in the closed hierarchy. The tag set determines the lattice
/// position: a type subsumes every type whose tag set is a superset of
/// its own, so fewer tags means more general.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Type {
    elems: BTreeSet<String>,
    /// Placeholder binding carried alongside the tags. Unification of
    /// two types also unifies their placeholders.
    var: Value,
    constraints: Vec<TypeConstraint>,
}

impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool {
        // The placeholder is an identity, not content. Two types with
        // the same tags are the same type regardless of their current
        // placeholders, which keeps fixpoint detection stable.
        self.elems == other.elems && self.constraints == other.constraints
    }
}

impl Type {
    pub fn new<I, S>(elems: I) -> Type
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut nf = NameFactory::new();
        Type {
            elems: elems.into_iter().map(|e| e.into()).collect(),
            var: Value::Var(nf.canonical_name()),
            constraints: vec![],
        }
    }

    pub fn with_var<I, S>(elems: I, var: Value) -> Type
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Type {
            elems: elems.into_iter().map(|e| e.into()).collect(),
            var,
            constraints: vec![],
        }
    }

    pub fn with_constraints(
        elems: BTreeSet<String>,
        var: Value,
        constraints: Vec<TypeConstraint>,
    ) -> Type {
        Type {
            elems,
            var,
            constraints,
        }
    }

    pub fn elems(&self) -> &BTreeSet<String> {
        &self.elems
    }

    pub fn var(&self) -> &Value {
        &self.var
    }

    pub fn set_var(&mut self, var: Value) {
        self.var = var;
    }

    pub fn constraints(&self) -> &[TypeConstraint] {
        &self.constraints
    }

    /// Number of tags. Larger is more specific.
    pub fn spec(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn contains<S: AsRef<str>>(&self, tag: S) -> bool {
        self.elems.contains(tag.as_ref())
    }

    /// True if every instance of `t` is also an instance of `self`.
    pub fn subsumes(&self, t: &Type) -> bool {
        self.elems.iter().all(|e| t.elems.contains(e))
    }

    /// Tag and constraint union with a fresh placeholder. This is the
    /// raw combination and need not name a declared type.
    pub fn union(&self, other: &Type) -> Type {
        let mut elems = self.elems.clone();
        elems.extend(other.elems.iter().cloned());
        let mut constraints = self.constraints.clone();
        for c in other.constraints.iter() {
            if !constraints.contains(c) {
                constraints.push(c.clone());
            }
        }
        let mut nf = NameFactory::new();
        Type {
            elems,
            var: Value::Var(nf.canonical_name()),
            constraints,
        }
    }

    fn sort_key(&self) -> String {
        crate::utils::join(self.elems.iter(), "-")
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.sort_key())
    }
}

/// The closed set of declared types, bucketed by tag count so the
/// search for a combined type starts at the most general candidates.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TypeHierarchy {
    buckets: BTreeMap<usize, Vec<Type>>,
}

impl TypeHierarchy {
    pub fn new<I>(types: I) -> TypeHierarchy
    where
        I: IntoIterator<Item = Type>,
    {
        let mut buckets: BTreeMap<usize, Vec<Type>> = BTreeMap::new();
        for t in types {
            buckets.entry(t.spec()).or_default().push(t);
        }
        for ts in buckets.values_mut() {
            // Candidates of equal specificity resolve in name order,
            // so repeated runs pick the same type.
            ts.sort_by_key(|t| t.sort_key());
        }
        TypeHierarchy { buckets }
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(|ts| ts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get<I, S>(&self, elems: I) -> Option<&Type>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elems = elems.into_iter().map(|e| e.into()).collect::<BTreeSet<_>>();
        self.buckets
            .get(&elems.len())
            .and_then(|ts| ts.iter().find(|t| t.elems == elems))
    }

    /// Resolve the combination of `a` and `b` to the most general
    /// declared type their union subsumes. The placeholder variables
    /// of both types are unified as part of resolution.
    pub fn least_specific_subtype(
        &self,
        a: &Type,
        b: &Type,
        env: &mut Env,
    ) -> UnifyResult<Type> {
        let union = a.union(b);
        let resvar = unify(a.var(), b.var(), env, Some(self))?;
        for (_, ts) in self.buckets.range(union.spec()..) {
            for t in ts.iter() {
                if union.subsumes(t) {
                    return Ok(Type::with_constraints(
                        t.elems.clone(),
                        resvar,
                        t.constraints.clone(),
                    ));
                }
            }
        }
        Err(UnifyError::types(a.clone(), b.clone()))
    }
}
