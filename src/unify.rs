//! Unification over values and feature structures.
//!
//! All binding effects go through the [`Env`] passed in, so a failed
//! unification can leave bindings behind. Callers that need rollback
//! unify against a scratch copy of the environment.

use std::collections::HashSet;

use fnv::FnvHashMap;

use crate::{
    env::Env,
    error::{UnifyError, UnifyResult},
    fs::Fs,
    ty::TypeHierarchy,
    value::{Value, VarName},
};

/// Unify two values. The result is the most general value subsumed by
/// both, with variable bindings recorded in `env`.
pub fn unify(
    a: &Value,
    b: &Value,
    env: &mut Env,
    hier: Option<&TypeHierarchy>,
) -> UnifyResult<Value> {
    unify_seen(a, b, env, hier, &mut HashSet::new())
}

/// Unify two feature structures attribute by attribute. `f2` is taken
/// mutably because an untyped `f2` adopts the coreference binding of a
/// typed `f1` as part of unification.
pub fn unify_fs(
    f1: &Fs,
    f2: &mut Fs,
    env: &mut Env,
    hier: Option<&TypeHierarchy>,
) -> UnifyResult<Fs> {
    unify_fs_seen(f1, f2, env, hier, &mut HashSet::new())
}

fn unify_seen(
    a: &Value,
    b: &Value,
    env: &mut Env,
    hier: Option<&TypeHierarchy>,
    seen: &mut HashSet<VarName>,
) -> UnifyResult<Value> {
    // Trivial equality.
    if a == b {
        return Ok(b.clone());
    }
    match (a, b) {
        (Value::Atom(_), Value::Adisj(_)) => unify_seen(b, a, env, hier, seen),
        (Value::Atom(_), Value::Var(_)) | (Value::Int(_), Value::Var(_)) => {
            let bb = env.deref(b);
            match bb {
                Value::Var(n) => {
                    env.bind(n, a.clone());
                    Ok(a.clone())
                }
                _ => unify_seen(a, &bb, env, hier, seen),
            }
        }
        (Value::Avm(f1), Value::Avm(f2)) => {
            let mut f2 = f2.clone();
            let res = unify_fs_seen(f1, &mut f2, env, hier, seen)?;
            Ok(Value::Avm(res))
        }
        (Value::Avm(fs), Value::Var(v)) => unify_avm_var(fs, v, env, hier, seen),
        (Value::Adisj(vs), Value::Atom(_)) => {
            if let Some(w) = adisj_redirect(vs, a, env) {
                return unify_seen(&w, b, env, hier, seen);
            }
            if vs.iter().any(|m| m == b) {
                if let Some(ann) = a.adisj_binding() {
                    env.bind(ann.clone(), b.clone());
                }
                Ok(b.clone())
            } else {
                Err(UnifyError::mismatch(a.clone(), b.clone()))
            }
        }
        (Value::Adisj(xs), Value::Adisj(ys)) => {
            if let Some(w) = adisj_redirect(xs, a, env) {
                return unify_seen(&w, b, env, hier, seen);
            }
            if let Some(w) = adisj_redirect(ys, b, env) {
                return unify_seen(a, &w, env, hier, seen);
            }
            unify_adisj_adisj(a, xs, b, ys, env)
        }
        (Value::Adisj(vs), Value::Var(_)) => {
            if let Some(w) = adisj_redirect(vs, a, env) {
                return unify_seen(&w, b, env, hier, seen);
            }
            let bb = env.deref(b);
            match bb {
                Value::Var(n) => match a.adisj_binding() {
                    Some(ann) => {
                        env.bind(n, Value::Var(ann.clone()));
                        Ok(a.clone())
                    }
                    _ => {
                        let mut members = vec![Value::Var(n.clone())];
                        members.extend(vs.iter().cloned());
                        let res = Value::Adisj(members);
                        env.bind(n, res.clone());
                        Ok(res)
                    }
                },
                _ => unify_seen(a, &bb, env, hier, seen),
            }
        }
        (Value::Var(_), Value::Var(_)) => unify_var_var(a, b, env, hier, seen),
        (Value::Var(_), _) => {
            let aa = env.deref(a);
            unify_seen(b, &aa, env, hier, seen)
        }
        _ => Err(UnifyError::mismatch(a.clone(), b.clone())),
    }
}

/// A disjunction whose binding annotation already resolved elsewhere
/// stands for that resolution. Returns the redirect target, or binds
/// an unbound annotation to the disjunction itself and returns None.
fn adisj_redirect(vs: &[Value], whole: &Value, env: &mut Env) -> Option<Value> {
    if let Some(Value::Var(ann)) = vs.first() {
        let v = env.deref(&Value::Var(ann.clone()));
        match v {
            Value::Var(n) => {
                env.bind(n, whole.clone());
                None
            }
            v if &v == whole => None,
            v => Some(v),
        }
    } else {
        None
    }
}

fn unify_adisj_adisj(
    a: &Value,
    xs: &[Value],
    b: &Value,
    ys: &[Value],
    env: &mut Env,
) -> UnifyResult<Value> {
    // Keep the second side's member order. Annotation variables are
    // never members, so they drop out of the intersection.
    let members = ys
        .iter()
        .filter(|m| !m.is_var() && xs.contains(*m))
        .cloned()
        .collect::<Vec<_>>();
    match members.len() {
        0 => Err(UnifyError::mismatch(a.clone(), b.clone())),
        1 => {
            let res = members.into_iter().next().ok_or_else(|| {
                UnifyError::new("disjunction intersection lost its only member")
            })?;
            if let Some(ann) = a.adisj_binding() {
                env.bind(ann.clone(), res.clone());
            }
            if let Some(ann) = b.adisj_binding() {
                env.bind(ann.clone(), res.clone());
            }
            Ok(res)
        }
        _ => {
            let a_ann = a.adisj_binding();
            let b_ann = b.adisj_binding();
            let ann = a_ann.or(b_ann);
            let mut out = vec![];
            if let Some(ann) = ann {
                out.push(Value::Var(ann.clone()));
            }
            out.extend(members);
            let res = Value::Adisj(out);
            if let Some(ann) = ann {
                env.bind(ann.clone(), res.clone());
            }
            if let (Some(a_ann), Some(b_ann)) = (a_ann, b_ann) {
                if a_ann != b_ann {
                    env.bind(b_ann.clone(), Value::Var(a_ann.clone()));
                }
            }
            Ok(res)
        }
    }
}

fn unify_avm_var(
    fs: &Fs,
    v: &VarName,
    env: &mut Env,
    hier: Option<&TypeHierarchy>,
    seen: &mut HashSet<VarName>,
) -> UnifyResult<Value> {
    let bb = env.deref(&Value::Var(v.clone()));
    match bb {
        Value::Var(n) => match fs.coref() {
            Some(c) => {
                let cd = env.deref(c);
                if cd == Value::Var(n.clone()) {
                    // The variable names this structure's coreference
                    // class. Merge into the class node.
                    match env.node(&n).cloned() {
                        Some(node) => {
                            let mut fs = fs.clone();
                            let merged = unify_fs_seen(&node, &mut fs, env, hier, seen)?;
                            env.put_node(n, merged.clone());
                            Ok(Value::Avm(merged))
                        }
                        _ => {
                            env.put_node(n, fs.clone());
                            Ok(Value::Avm(fs.clone()))
                        }
                    }
                } else {
                    env.bind(n, cd);
                    Ok(Value::Avm(fs.clone()))
                }
            }
            _ => {
                env.bind(n, Value::Avm(fs.clone()));
                Ok(Value::Avm(fs.clone()))
            }
        },
        Value::Avm(other) => {
            let mut other = other;
            let res = unify_fs_seen(fs, &mut other, env, hier, seen)?;
            Ok(Value::Avm(res))
        }
        _ => Err(UnifyError::mismatch(Value::Avm(fs.clone()), bb)),
    }
}

fn unify_var_var(
    a: &Value,
    b: &Value,
    env: &mut Env,
    hier: Option<&TypeHierarchy>,
    seen: &mut HashSet<VarName>,
) -> UnifyResult<Value> {
    let aa = env.deref(a);
    let bb = env.deref(b);
    if let (Value::Var(an), Value::Var(_)) = (&aa, &bb) {
        if &aa == a && &bb == b {
            // Both unbound. Alias one to the other.
            if let (Value::Var(an), Value::Var(bn)) = (a, b) {
                env.bind(an.clone(), Value::Var(bn.clone()));
            }
            return Ok(a.clone());
        }
        let mut trace = vec![];
        env.get_trace(b, &mut trace);
        if trace.contains(an) {
            // Already in the same binding class.
            return Ok(aa);
        }
    }
    unify_seen(&aa, &bb, env, hier, seen)
}

fn unify_fs_seen(
    f1: &Fs,
    f2: &mut Fs,
    env: &mut Env,
    hier: Option<&TypeHierarchy>,
    seen: &mut HashSet<VarName>,
) -> UnifyResult<Fs> {
    if let Some(Value::Var(c1)) = f1.coref() {
        // A structure revisited through its own coreference unifies
        // to itself; this bounds recursion on cyclic structures.
        if !seen.insert(c1.clone()) {
            return Ok(f1.clone());
        }
    }

    let mut avm = FnvHashMap::default();
    let mut keys = f1.keys();
    for k in f2.keys() {
        if !keys.contains(&k) {
            keys.push(k);
        }
    }
    keys.sort();
    for k in keys {
        let v1 = f1.get_feat(&k).cloned();
        let v2 = f2.get_feat(&k).cloned();
        let res = match (v1, v2) {
            (Some(v1), Some(v2)) => unify_seen(&v1, &v2, env, hier, seen)
                .map_err(|e| UnifyError::feature(k.clone(), e))?,
            (Some(v), _) | (_, Some(v)) => {
                if v.is_var() {
                    env.deref(&v)
                } else {
                    v
                }
            }
            _ => continue,
        };
        avm.insert(k, res);
    }

    let ty = match (f1.ty(), f2.ty()) {
        (Some(t1), Some(t2)) => Some(match hier {
            Some(h) => h.least_specific_subtype(t1, t2, env)?,
            _ => t1.union(t2),
        }),
        (Some(t), _) | (_, Some(t)) => Some(t.clone()),
        _ => None,
    };

    let coref = if f1.is_typed() && f2.is_typed() {
        match (f1.coref(), f2.coref()) {
            (Some(c1), Some(c2)) => {
                let c2 = c2.clone();
                Some(unify_seen(c1, &c2, env, hier, seen)?)
            }
            (Some(c), _) => Some(c.clone()),
            (_, Some(c)) => Some(c.clone()),
            _ => None,
        }
    } else if f1.is_typed() {
        let c = f1.coref().cloned();
        f2.set_coref(c.clone());
        c
    } else {
        f2.coref().cloned()
    };

    Ok(Fs::with(avm, ty, coref))
}

#[cfg(test)]
mod unify_tests {
    use super::*;
    use crate::ty::Type;

    #[test]
    fn test_ground_identity() {
        let mut env = Env::new();
        assert_eq!(
            unify(&Value::atom("sg"), &Value::atom("sg"), &mut env, None),
            Ok(Value::atom("sg"))
        );
        assert_eq!(
            unify(&Value::Int(2), &Value::Int(2), &mut env, None),
            Ok(Value::Int(2))
        );
    }

    #[test]
    fn test_atom_mismatch_both_directions() {
        let mut env = Env::new();
        assert!(unify(&Value::atom("sg"), &Value::atom("pl"), &mut env, None).is_err());
        assert!(unify(&Value::atom("pl"), &Value::atom("sg"), &mut env, None).is_err());
    }

    #[test]
    fn test_kind_mismatch() {
        let mut env = Env::new();
        assert!(unify(&Value::atom("sg"), &Value::Int(1), &mut env, None).is_err());
        assert!(unify(&Value::Int(1), &Value::Avm(Fs::new()), &mut env, None).is_err());
    }

    #[test]
    fn test_atom_binds_unbound_var() {
        let mut env = Env::new();
        let res = unify(&Value::atom("sg"), &var!(N), &mut env, None).unwrap();
        assert_eq!(res, Value::atom("sg"));
        assert_eq!(env.deref(&var!(N)), Value::atom("sg"));
    }

    #[test]
    fn test_var_follows_binding_to_conflict() {
        let mut env = Env::new();
        unify(&Value::atom("sg"), &var!(N), &mut env, None).unwrap();
        assert!(unify(&Value::atom("pl"), &var!(N), &mut env, None).is_err());
    }

    #[test]
    fn test_var_var_aliases_once() {
        let mut env = Env::new();
        unify(&var!(A), &var!(B), &mut env, None).unwrap();
        unify(&Value::atom("sg"), &var!(B), &mut env, None).unwrap();
        assert_eq!(env.deref(&var!(A)), Value::atom("sg"));
    }

    #[test]
    fn test_var_var_same_class_terminates() {
        let mut env = Env::new();
        unify(&var!(A), &var!(B), &mut env, None).unwrap();
        // A second pass over the same pair must not loop or rebind.
        let res = unify(&var!(A), &var!(B), &mut env, None).unwrap();
        assert!(res.is_var());
        let d1 = env.deref(&var!(A));
        let d2 = env.deref(&d1);
        assert_eq!(d1, d2);
    }

    #[test]
    fn test_avm_unify_merges_features() {
        let mut env = Env::new();
        let f1 = avm! { "cat" => Value::atom("np") };
        let f2 = avm! { "num" => Value::atom("sg") };
        let res = unify(&Value::Avm(f1), &Value::Avm(f2), &mut env, None).unwrap();
        let fs = res.avm().unwrap();
        assert_eq!(fs.get_feat("cat"), Some(&Value::atom("np")));
        assert_eq!(fs.get_feat("num"), Some(&Value::atom("sg")));
    }

    #[test]
    fn test_avm_conflict_reports_feature_path() {
        let mut env = Env::new();
        let f1 = avm! { "agr" => Value::Avm(avm! { "num" => Value::atom("sg") }) };
        let f2 = avm! { "agr" => Value::Avm(avm! { "num" => Value::atom("pl") }) };
        let err = unify(&Value::Avm(f1), &Value::Avm(f2), &mut env, None).unwrap_err();
        assert_eq!(err.path(), vec!["agr", "num"]);
    }

    #[test]
    fn test_avm_var_binds_structure() {
        let mut env = Env::new();
        let fs = avm! { "cat" => Value::atom("np") };
        unify(&Value::Avm(fs.clone()), &var!(F), &mut env, None).unwrap();
        assert_eq!(env.deref(&var!(F)), Value::Avm(fs));
    }

    #[test]
    fn test_avm_var_upserts_class_node() {
        let mut env = Env::new();
        let mut f1 = Fs::typed(Type::new(vec!["np"]), Some(var!(C)));
        f1.set_feat("num", Value::atom("sg"));
        unify(&Value::Avm(f1), &var!(C), &mut env, None).unwrap();
        let node = env.node(&VarName::new("C")).unwrap();
        assert_eq!(node.get_feat("num"), Some(&Value::atom("sg")));

        let mut f2 = Fs::typed(Type::new(vec!["np"]), Some(var!(C)));
        f2.set_feat("case", Value::atom("nom"));
        unify(&Value::Avm(f2), &var!(C), &mut env, None).unwrap();
        let node = env.node(&VarName::new("C")).unwrap();
        assert_eq!(node.get_feat("num"), Some(&Value::atom("sg")));
        assert_eq!(node.get_feat("case"), Some(&Value::atom("nom")));
    }

    #[test]
    fn test_adisj_atom_membership() {
        let mut env = Env::new();
        let d = adisj!["red", "green", "blue"];
        let res = unify(&d, &Value::atom("green"), &mut env, None).unwrap();
        assert_eq!(res, Value::atom("green"));
        assert!(unify(&d, &Value::atom("yellow"), &mut env, None).is_err());
    }

    #[test]
    fn test_adisj_intersection() {
        let mut env = Env::new();
        let a = adisj!["red", "green", "blue"];
        let b = adisj!["green", "blue", "yellow"];
        let res = unify(&a, &b, &mut env, None).unwrap();
        assert_eq!(res, adisj!["green", "blue"]);
        // Order of the operands does not change the members.
        let mut env = Env::new();
        let res2 = unify(&b, &a, &mut env, None).unwrap();
        assert_eq!(res, res2);
    }

    #[test]
    fn test_adisj_singleton_intersection_is_atom() {
        let mut env = Env::new();
        let a = adisj!["red", "green"];
        let b = adisj!["green", "yellow"];
        assert_eq!(unify(&a, &b, &mut env, None), Ok(Value::atom("green")));
    }

    #[test]
    fn test_adisj_empty_intersection_fails() {
        let mut env = Env::new();
        let a = adisj!["red"];
        let b = adisj!["yellow"];
        assert!(unify(&a, &b, &mut env, None).is_err());
    }

    #[test]
    fn test_adisj_annotation_binds_on_narrowing() {
        let mut env = Env::new();
        let a = Value::Adisj(vec![var!(D), Value::atom("sg"), Value::atom("pl")]);
        let res = unify(&a, &Value::atom("sg"), &mut env, None).unwrap();
        assert_eq!(res, Value::atom("sg"));
        assert_eq!(env.deref(&var!(D)), Value::atom("sg"));
    }

    #[test]
    fn test_adisj_annotation_redirect() {
        let mut env = Env::new();
        let a = Value::Adisj(vec![var!(D), Value::atom("sg"), Value::atom("pl")]);
        unify(&a, &Value::atom("sg"), &mut env, None).unwrap();
        // The annotation is resolved now, so the disjunction stands
        // for the resolution and rejects the other member.
        assert!(unify(&a, &Value::atom("pl"), &mut env, None).is_err());
    }

    #[test]
    fn test_adisj_var_annotates_and_binds() {
        let mut env = Env::new();
        let a = adisj!["sg", "pl"];
        let res = unify(&a, &var!(N), &mut env, None).unwrap();
        assert_eq!(res.adisj_binding(), Some(&VarName::new("N")));
        assert_eq!(env.deref(&var!(N)), res);
    }

    #[test]
    fn test_typed_avm_unify_resolves_type() {
        let h = TypeHierarchy::new(vec![
            Type::new(vec!["n"]),
            Type::new(vec!["sg"]),
            Type::new(vec!["n", "sg"]),
        ]);
        let mut env = Env::new();
        let f1 = Fs::typed(Type::new(vec!["n"]), Some(var!(A)));
        let mut f2 = Fs::typed(Type::new(vec!["sg"]), Some(var!(B)));
        let res = unify_fs(&f1, &mut f2, &mut env, Some(&h)).unwrap();
        let ty = res.ty().unwrap();
        assert!(ty.contains("n") && ty.contains("sg"));
        // The two coreference variables now share a class.
        let d = env.deref(&var!(A));
        assert!(d == var!(A) || d == var!(B));
    }

    #[test]
    fn test_untyped_side_adopts_coref() {
        let mut env = Env::new();
        let f1 = Fs::typed(Type::new(vec!["np"]), Some(var!(C)));
        let mut f2 = avm! { "num" => Value::atom("sg") };
        let res = unify_fs(&f1, &mut f2, &mut env, None).unwrap();
        assert_eq!(res.coref(), Some(&var!(C)));
        assert_eq!(f2.coref(), Some(&var!(C)));
    }

    #[test]
    fn test_cyclic_structure_unify_terminates() {
        let mut env = Env::new();
        let mut inner1 = Fs::typed(Type::new(vec!["e"]), Some(var!(R)));
        inner1.set_feat("tense", Value::atom("past"));
        let mut outer1 = Fs::typed(Type::new(vec!["e"]), Some(var!(R)));
        outer1.set_feat("next", Value::Avm(inner1));

        let mut inner2 = Fs::typed(Type::new(vec!["e"]), Some(var!(R)));
        inner2.set_feat("tense", Value::atom("past"));
        inner2.set_feat("mood", Value::atom("ind"));
        let mut outer2 = Fs::typed(Type::new(vec!["e"]), Some(var!(R)));
        outer2.set_feat("next", Value::Avm(inner2));

        let res = unify_fs(&outer1, &mut outer2, &mut env, None);
        assert!(res.is_ok());
    }
}
