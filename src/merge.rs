//! Coreference merging across a set of feature structures.
//!
//! Merging runs in phases over one shared [`Env`]: collect every
//! coreference class into the node table, iterate [`update_corefs`]
//! until the set stops changing, then resolve bindings into each
//! structure and prune duplicates. Any unification failure along the
//! way aborts the whole merge.

use std::collections::HashSet;

use crate::{
    env::Env,
    error::UnifyResult,
    fs::Fs,
    state::NameFactory,
    ty::{Type, TypeHierarchy},
    unify::{unify, unify_fs},
    value::{Value, VarName},
};

/// Walk `fs`, renaming non-canonical coreference variables to fresh
/// canonical names and registering every coreference class in the
/// node table of `env`.
pub fn collect_corefs(
    fs: &mut Fs,
    env: &mut Env,
    nf: &mut NameFactory,
    hier: Option<&TypeHierarchy>,
) -> UnifyResult<()> {
    if let Some(c) = fs.coref().cloned() {
        let cd = env.deref(&c);
        if let Value::Var(old) = &cd {
            if !old.is_canonical() {
                let fresh = nf.canonical_name();
                env.bind(old.clone(), Value::Var(fresh.clone()));
                fs.set_coref(Some(Value::Var(fresh)));
            }
        }
    }
    if let Some(c) = fs.coref().cloned() {
        if let Value::Var(name) = env.deref(&c) {
            let merged = match env.node(&name).cloned() {
                Some(node) => unify_fs(&node, fs, env, hier)?,
                _ => fs.clone(),
            };
            env.put_node(name, merged);
        }
    }
    for k in fs.keys() {
        if let Some(Value::Avm(child)) = fs.get_feat_mut(&k) {
            collect_corefs(child, env, nf, hier)?;
        }
    }
    Ok(())
}

/// Fold each coreference class node back into `fs` and resolve
/// variable-valued features that point at a class.
pub fn update_corefs(fs: &Fs, env: &mut Env, hier: Option<&TypeHierarchy>) -> UnifyResult<Fs> {
    update_corefs_seen(fs, env, hier, &mut HashSet::new())
}

fn update_corefs_seen(
    fs: &Fs,
    env: &mut Env,
    hier: Option<&TypeHierarchy>,
    seen: &mut HashSet<VarName>,
) -> UnifyResult<Fs> {
    let mut res = fs.clone();
    if let Some(c) = fs.coref() {
        if let Value::Var(name) = env.deref(c) {
            if let Some(mut node) = env.node(&name).cloned() {
                res = unify_fs(&res, &mut node, env, hier)?;
                env.put_node(name.clone(), res.clone());
            }
            if !seen.insert(name) {
                return Ok(res);
            }
        }
    }
    for k in res.keys() {
        let updated = match res.get_feat(&k) {
            Some(Value::Avm(child)) => {
                let child = child.clone();
                Some(Value::Avm(update_corefs_seen(&child, env, hier, seen)?))
            }
            Some(v @ Value::Var(_)) => {
                let d = env.deref(v);
                match &d {
                    Value::Var(n) => env.node(n).cloned().map(Value::Avm).or(Some(d.clone())),
                    _ => Some(d.clone()),
                }
            }
            _ => None,
        };
        if let Some(v) = updated {
            res.replace_feat(k, v);
        }
    }
    Ok(res)
}

/// Resolve every binding in `fs` against `env`. Type placeholders are
/// folded into the type, features are dereferenced, and when
/// `final_update` is set the binding annotations of disjunctions are
/// stripped from the output.
pub fn update_fs(
    fs: &Fs,
    env: &mut Env,
    final_update: bool,
    hier: Option<&TypeHierarchy>,
) -> UnifyResult<Fs> {
    update_fs_seen(fs, env, final_update, hier, &mut HashSet::new())
}

fn update_fs_seen(
    fs: &Fs,
    env: &mut Env,
    final_update: bool,
    hier: Option<&TypeHierarchy>,
    seen: &mut HashSet<VarName>,
) -> UnifyResult<Fs> {
    if !fs.is_typed() {
        return Ok(Fs::new());
    }
    let ty = match fs.ty() {
        Some(t) => Some(renew_type(t, env, hier)?),
        _ => None,
    };
    let coref = match fs.coref() {
        Some(c) => {
            let cd = env.deref(c);
            if &cd != c {
                Some(unify(&cd, c, env, hier)?)
            } else {
                Some(cd)
            }
        }
        _ => None,
    };
    let mut res = Fs::with(Default::default(), ty, coref);
    if let Some(Value::Var(name)) = res.coref() {
        if !seen.insert(name.clone()) {
            return Ok(res);
        }
    }
    for k in fs.keys() {
        let v = match fs.get_feat(&k) {
            Some(v) => v,
            _ => continue,
        };
        let updated = match v {
            Value::Atom(_) | Value::Adisj(_) => update_value(v, env, final_update),
            Value::Int(_) => v.clone(),
            Value::Var(_) => {
                let d = env.deref(v);
                let val = if &d != v {
                    unify(v, &d, env, hier)?
                } else {
                    v.clone()
                };
                if final_update {
                    strip_annotation(val)
                } else {
                    val
                }
            }
            Value::Avm(child) => {
                Value::Avm(update_fs_seen(child, env, final_update, hier, seen)?)
            }
        };
        res.set_feat(k, updated);
    }
    Ok(res)
}

fn renew_type(t: &Type, env: &mut Env, hier: Option<&TypeHierarchy>) -> UnifyResult<Type> {
    let tv = env.deref(t.var());
    Ok(match (&tv, hier) {
        // The placeholder resolved to a tag. Fold it into the type and
        // hand out a fresh placeholder.
        (Value::Atom(s), Some(h)) => {
            let other = Type::with_var(vec![s.clone()], tv.clone());
            let mut new_ty = h.least_specific_subtype(t, &other, env)?;
            let mut nf = NameFactory::new();
            new_ty.set_var(Value::Var(nf.canonical_name()));
            new_ty
        }
        (Value::Atom(s), _) => {
            let other = Type::with_var(vec![s.clone()], tv.clone());
            t.union(&other)
        }
        (Value::Var(_), _) => {
            let mut new_ty = t.clone();
            if &tv != t.var() {
                let v = unify(&tv, t.var(), env, hier)?;
                new_ty.set_var(v);
            }
            new_ty
        }
        _ => t.clone(),
    })
}

/// Resolve a constant or disjunction feature value against `env`.
fn update_value(v: &Value, env: &mut Env, final_update: bool) -> Value {
    match v {
        Value::Var(_) => {
            let val = env.deref(v);
            if final_update {
                strip_annotation(val)
            } else {
                val
            }
        }
        Value::Atom(s) => {
            // Atoms double as semantic labels that a constraint may
            // have resolved to something else.
            match env.get(&VarName::new(s.clone())) {
                Some(bound) => bound.clone(),
                _ => v.clone(),
            }
        }
        Value::Adisj(vs) => {
            if let Some(Value::Var(ann)) = vs.first() {
                let bound = env.deref(&Value::Var(ann.clone()));
                let val = match bound {
                    Value::Var(n) => {
                        env.bind(n, v.clone());
                        v.clone()
                    }
                    other => other,
                };
                if final_update {
                    strip_annotation(val)
                } else {
                    val
                }
            } else {
                v.clone()
            }
        }
        _ => v.clone(),
    }
}

fn strip_annotation(v: Value) -> Value {
    match v {
        Value::Adisj(vs) => {
            let members = vs.into_iter().filter(|m| !m.is_var()).collect();
            Value::Adisj(members)
        }
        v => v,
    }
}

/// Merge a set of typed structures under one environment. Returns the
/// merged set, or None when any structure in the set fails to unify
/// with its coreference class.
pub fn merge_fs(
    frames: &[Fs],
    env: &mut Env,
    nf: &mut NameFactory,
    hier: Option<&TypeHierarchy>,
) -> Option<Vec<Fs>> {
    let mut clean = frames
        .iter()
        .filter(|fs| fs.is_typed())
        .cloned()
        .collect::<Vec<_>>();
    for fs in clean.iter_mut() {
        if let Err(e) = collect_corefs(fs, env, nf, hier) {
            log::debug!("merge aborted while collecting corefs: {}", e);
            return None;
        }
        // Early resolution pass for side effects on the environment.
        // The resolved structure itself is rebuilt after convergence.
        if let Err(e) = update_fs(fs, env, true, hier) {
            log::debug!("initial resolution pass failed: {}", e);
        }
    }
    let rounds = clean.len();
    for round in 0..rounds {
        let mut next = Vec::with_capacity(clean.len());
        for fs in clean.iter() {
            match update_corefs(fs, env, hier) {
                Ok(fs) => next.push(fs),
                Err(e) => {
                    log::debug!("merge aborted in round {}: {}", round, e);
                    return None;
                }
            }
        }
        let converged = next == clean;
        clean = next;
        if converged {
            log::debug!("coref merge converged after {} rounds", round + 1);
            break;
        }
    }
    for fs in clean.iter_mut() {
        match update_fs(fs, env, true, hier) {
            Ok(updated) => *fs = updated,
            Err(e) => {
                log::debug!("merge aborted in final resolution: {}", e);
                return None;
            }
        }
        clean_corefs(fs, &mut HashSet::new());
    }
    Some(clean)
}

/// Replace repeated occurrences of a coreference class below `fs`
/// with a bare variable, keeping only the first expansion.
pub fn clean_corefs(fs: &mut Fs, seen: &mut HashSet<VarName>) {
    for k in fs.keys() {
        let repeat = match fs.get_feat(&k) {
            Some(Value::Avm(child)) => match child.coref() {
                Some(Value::Var(n)) => {
                    if seen.contains(n) {
                        Some(n.clone())
                    } else {
                        seen.insert(n.clone());
                        None
                    }
                }
                _ => None,
            },
            _ => None,
        };
        match repeat {
            Some(n) => fs.replace_feat(k, Value::Var(n)),
            _ => {
                if let Some(Value::Avm(child)) = fs.get_feat_mut(&k) {
                    clean_corefs(child, seen);
                }
            }
        }
    }
}

/// Drop duplicate structures from a merged set: a later structure
/// with an already seen coreference class, or one that is embedded in
/// another structure of the set.
pub fn cleanup(frames: &[Fs]) -> Vec<Fs> {
    let mut seen_corefs = HashSet::new();
    let mut kept = vec![];
    for fs in frames.iter() {
        match coref_name(fs) {
            Some(n) => {
                if seen_corefs.insert(n.clone()) {
                    kept.push(fs.clone());
                }
            }
            _ => kept.push(fs.clone()),
        }
    }
    let mut out = vec![];
    for (i, fs) in kept.iter().enumerate() {
        let embedded = kept.iter().enumerate().any(|(j, other)| {
            i != j
                && coref_name(fs) != coref_name(other)
                && included(fs, other, &mut HashSet::new())
        });
        if !embedded {
            out.push(fs.clone());
        }
    }
    out
}

/// True if a structure with the coreference class of `fs1` occurs
/// anywhere below the top level of `fs2`.
pub fn included(fs1: &Fs, fs2: &Fs, seen: &mut HashSet<VarName>) -> bool {
    if let Some(n) = coref_name(fs2) {
        if !seen.insert(n.clone()) {
            return false;
        }
    }
    for k in fs2.keys() {
        if let Some(Value::Avm(child)) = fs2.get_feat(&k) {
            if let (Some(cn), Some(n1)) = (coref_name(child), coref_name(fs1)) {
                if cn == n1 {
                    return true;
                }
            }
            if included(fs1, child, seen) {
                return true;
            }
        }
    }
    false
}

fn coref_name(fs: &Fs) -> Option<&VarName> {
    match fs.coref() {
        Some(Value::Var(n)) => Some(n),
        _ => None,
    }
}
