use std::collections::HashSet;

use fnv::FnvHashMap;
use itertools::Itertools;

use crate::{
    error::UnifyResult,
    fs::Fs,
    ty::TypeHierarchy,
    unify::{unify, unify_fs},
    value::{Value, VarName},
};

/// Variable bindings plus the table of structures reachable through
/// a coreference binding. Every unification pass owns one.
#[derive(Clone, Debug, Default)]
pub struct Env {
    bindings: FnvHashMap<VarName, Value>,
    nodes: FnvHashMap<VarName, Fs>,
}

impl Env {
    pub fn new() -> Env {
        Env::default()
    }

    pub fn bind(&mut self, name: VarName, val: Value) {
        // log::debug!("bind {} = {}", name, val);
        self.bindings.insert(name, val);
    }

    pub fn get(&self, name: &VarName) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn is_bound(&self, name: &VarName) -> bool {
        self.bindings.contains_key(name)
    }

    /// Follow variable bindings to the end of the chain. An unbound
    /// variable dereferences to itself, so `deref` is idempotent, and
    /// a cyclic chain stops at the first revisited name.
    pub fn deref(&self, v: &Value) -> Value {
        let mut cur = v;
        let mut checked = HashSet::new();
        while let Value::Var(name) = cur {
            if !checked.insert(name.clone()) {
                break;
            }
            match self.bindings.get(name) {
                Some(next) => cur = next,
                _ => break,
            }
        }
        cur.clone()
    }

    /// Append every variable name along the binding chain of `v`.
    pub fn get_trace(&self, v: &Value, out: &mut Vec<VarName>) {
        let mut cur = v;
        let mut checked = HashSet::new();
        while let Value::Var(name) = cur {
            if !checked.insert(name.clone()) {
                break;
            }
            out.push(name.clone());
            match self.bindings.get(name) {
                Some(next) => cur = next,
                _ => break,
            }
        }
    }

    pub fn node(&self, name: &VarName) -> Option<&Fs> {
        self.nodes.get(name)
    }

    pub fn put_node(&mut self, name: VarName, fs: Fs) {
        self.nodes.insert(name, fs);
    }

    pub fn node_names(&self) -> Vec<VarName> {
        self.nodes.keys().cloned().sorted().collect()
    }

    /// Fold this environment's bindings and nodes into `into`.
    /// Bindings already present in `into` are unified rather than
    /// overwritten, so clashes surface as errors.
    pub fn add_bindings(
        &self,
        into: &mut Env,
        hier: Option<&TypeHierarchy>,
    ) -> UnifyResult<()> {
        for name in self.bindings.keys().cloned().sorted() {
            let val = self.deref(&Value::Var(name.clone()));
            unify(&Value::Var(name), &val, into, hier)?;
        }
        for name in self.node_names() {
            let fs = match self.nodes.get(&name) {
                Some(fs) => fs.clone(),
                _ => continue,
            };
            match into.node(&name).cloned() {
                Some(existing) => {
                    let mut fs = fs;
                    let merged = unify_fs(&existing, &mut fs, into, hier)?;
                    into.put_node(name, merged);
                }
                _ => into.put_node(name, fs),
            }
        }
        Ok(())
    }

    /// Combine two environments into a fresh one.
    pub fn merge(e1: &Env, e2: &Env, hier: Option<&TypeHierarchy>) -> UnifyResult<Env> {
        let mut env = Env::new();
        e1.add_bindings(&mut env, hier)?;
        e2.add_bindings(&mut env, hier)?;
        Ok(env)
    }
}
