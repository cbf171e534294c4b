//! Implicational constraints over typed feature structures.
//!
//! Two kinds are handled. A [`TypeConstraint`] rides on a type in the
//! hierarchy and asserts a value at an attribute path of every
//! structure carrying that type. A [`HierarchyConstraint`] is an
//! implication between two [`ConstraintLiteral`]s, checked against a
//! whole frame after merging. Constraint forms outside the supported
//! shapes are skipped with a warning rather than rejected.

use serde::{Deserialize, Serialize};

use crate::{
    env::Env,
    frame::Frame,
    fs::Fs,
    state::NameFactory,
    ty::{Type, TypeHierarchy},
    unify::unify_fs,
    utils::join,
    value::{Value, VarName},
};

/// An assertion attached to a type: every structure of that type has
/// `val` at the end of the `attributes` path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeConstraint {
    attributes: Vec<String>,
    ty: Type,
    val: Value,
}

impl TypeConstraint {
    pub fn new(attributes: Vec<String>, ty: Type, val: Value) -> TypeConstraint {
        TypeConstraint { attributes, ty, val }
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn val(&self) -> &Value {
        &self.val
    }

    /// The constraint as a unifiable structure: the constrained type
    /// at the top, one nested level per path segment, the value at
    /// the end.
    pub fn as_fs(&self) -> Fs {
        let mut nf = NameFactory::new();
        let mut fs = Fs::typed(self.ty.clone(), None);
        if let Some((first, rest)) = self.attributes.split_first() {
            fs.set_feat(first.clone(), nested_value(rest, &self.val, &mut nf));
        }
        fs
    }
}

fn nested_value(path: &[String], val: &Value, nf: &mut NameFactory) -> Value {
    match path.split_first() {
        Some((first, rest)) => {
            let mut fs = Fs::typed(
                Type::new(Vec::<String>::new()),
                Some(Value::Var(VarName::new(nf.unique_name()))),
            );
            fs.set_feat(first.clone(), nested_value(rest, val, nf));
            Value::Avm(fs)
        }
        _ => val.clone(),
    }
}

impl std::fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} = {}",
            self.ty,
            join(self.attributes.iter(), "."),
            self.val
        )
    }
}

/// One side of a hierarchy constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstraintLiteral {
    /// A set of type tags.
    Types(Vec<String>),
    /// A typed value at an attribute path. Tags prefixed with `@` are
    /// placeholders that any type satisfies.
    AttributeType {
        path: Vec<String>,
        ty: Vec<String>,
        value: String,
    },
    /// Two paths required to share a value.
    PathIdentity(Vec<String>, Vec<String>),
}

impl std::fmt::Display for ConstraintLiteral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintLiteral::Types(ts) => write!(f, "[{}]", join(ts.iter(), "-")),
            ConstraintLiteral::AttributeType { path, ty, value } => write!(
                f,
                "{}:[{}]={}",
                join(path.iter(), "."),
                join(ty.iter(), "-"),
                value
            ),
            ConstraintLiteral::PathIdentity(p1, p2) => {
                write!(f, "{} == {}", join(p1.iter(), "."), join(p2.iter(), "."))
            }
        }
    }
}

/// An implication between two literals: when the left side holds of a
/// structure, the right side is unified into it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HierarchyConstraint {
    pub left: ConstraintLiteral,
    pub right: ConstraintLiteral,
}

impl HierarchyConstraint {
    pub fn new(left: ConstraintLiteral, right: ConstraintLiteral) -> HierarchyConstraint {
        HierarchyConstraint { left, right }
    }
}

impl std::fmt::Display for HierarchyConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => {}", self.left, self.right)
    }
}

/// True if the structure at the end of `path` below `fs` carries
/// every tag in `tags`. Placeholder tags (prefixed `@`) hold of any
/// structure; every other tag requires a typed endpoint.
pub fn check_attr_constraint(fs: &Fs, path: &[String], tags: &[String]) -> bool {
    let mut cur = fs;
    for seg in path.iter() {
        match cur.get_feat(seg) {
            Some(Value::Avm(child)) => cur = child,
            _ => return false,
        }
    }
    tags.iter().all(|t| {
        t.starts_with('@') || cur.ty().map(|ty| ty.contains(t)).unwrap_or(false)
    })
}

fn path_fs(path: &[String], terminal: Fs) -> Fs {
    match path.split_first() {
        Some((first, rest)) => {
            let mut fs = Fs::new();
            fs.set_feat(first.clone(), Value::Avm(path_fs(rest, terminal)));
            fs
        }
        _ => terminal,
    }
}

/// Applies the constraints of a hierarchy to every structure of a
/// frame. Checking rewrites the frame, so the result replaces it.
pub struct ConstraintChecker<'a> {
    frame: Frame,
    constraints: Vec<HierarchyConstraint>,
    env: &'a mut Env,
    hier: Option<&'a TypeHierarchy>,
}

impl<'a> ConstraintChecker<'a> {
    pub fn new(
        frame: Frame,
        constraints: Vec<HierarchyConstraint>,
        env: &'a mut Env,
        hier: Option<&'a TypeHierarchy>,
    ) -> ConstraintChecker<'a> {
        ConstraintChecker {
            frame,
            constraints,
            env,
            hier,
        }
    }

    /// Run every constraint over every structure. None means some
    /// structure violated a constraint and the frame is rejected.
    pub fn check(mut self) -> Option<Frame> {
        let fss = self.frame.feature_structures().to_vec();
        let mut out = vec![];
        for fs in fss.iter() {
            let fs = self.check_attached(fs)?;
            let fs = self.check_hierarchy(&fs)?;
            out.push(fs);
        }
        Some(Frame::new(out, self.frame.relations().to_vec()))
    }

    fn check_attached(&mut self, fs: &Fs) -> Option<Fs> {
        let mut res = fs.clone();
        if let Some(t) = fs.ty() {
            for c in t.constraints().to_vec() {
                res = self.apply_attached(&c, res)?;
            }
        }
        for k in res.keys() {
            if let Some(Value::Avm(child)) = res.get_feat(&k) {
                let child = child.clone();
                let updated = self.check_attached(&child)?;
                res.replace_feat(k, Value::Avm(updated));
            }
        }
        Some(res)
    }

    fn apply_attached(&mut self, c: &TypeConstraint, mut fs: Fs) -> Option<Fs> {
        match unify_fs(&c.as_fs(), &mut fs, self.env, self.hier) {
            Ok(res) => Some(res),
            Err(e) => {
                log::debug!("structure violates type constraint {}: {}", c, e);
                None
            }
        }
    }

    fn check_hierarchy(&mut self, fs: &Fs) -> Option<Fs> {
        let mut res = fs.clone();
        let constraints = self.constraints.clone();
        for hc in constraints.iter() {
            res = self.apply_hierarchy(hc, res)?;
        }
        for k in res.keys() {
            if let Some(Value::Avm(child)) = res.get_feat(&k) {
                let child = child.clone();
                let updated = self.check_hierarchy(&child)?;
                res.replace_feat(k, Value::Avm(updated));
            }
        }
        Some(res)
    }

    fn apply_hierarchy(&mut self, hc: &HierarchyConstraint, mut fs: Fs) -> Option<Fs> {
        match (&hc.left, &hc.right) {
            (
                ConstraintLiteral::AttributeType { path, ty, .. },
                ConstraintLiteral::AttributeType {
                    path: rpath,
                    ty: rty,
                    value,
                },
            ) => {
                if !check_attr_constraint(&fs, path, ty) {
                    return Some(fs);
                }
                let tags = rty
                    .iter()
                    .filter(|t| !t.starts_with('@'))
                    .cloned()
                    .collect::<Vec<_>>();
                let terminal = Fs::typed(Type::new(tags), Some(Value::var(value.clone())));
                let probe = path_fs(rpath, terminal);
                match unify_fs(&probe, &mut fs, self.env, self.hier) {
                    Ok(res) => Some(res),
                    Err(e) => {
                        log::debug!("structure violates constraint {}: {}", hc, e);
                        None
                    }
                }
            }
            (ConstraintLiteral::Types(l), ConstraintLiteral::Types(r))
                if l.len() == 1 && r.len() == 1 =>
            {
                let fires = fs.ty().map(|t| t.contains(&l[0])).unwrap_or(false);
                if !fires {
                    return Some(fs);
                }
                let probe = Fs::typed(Type::new(vec![r[0].clone()]), None);
                match unify_fs(&probe, &mut fs, self.env, self.hier) {
                    Ok(res) => Some(res),
                    Err(e) => {
                        log::debug!("structure violates constraint {}: {}", hc, e);
                        None
                    }
                }
            }
            _ => {
                log::warn!("skipping constraint of unsupported form: {}", hc);
                Some(fs)
            }
        }
    }
}

#[cfg(test)]
mod constraints_tests {
    use super::*;

    fn attr(path: Vec<&str>, ty: Vec<&str>, value: &str) -> ConstraintLiteral {
        ConstraintLiteral::AttributeType {
            path: path.into_iter().map(String::from).collect(),
            ty: ty.into_iter().map(String::from).collect(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_as_fs_expands_path() {
        let c = TypeConstraint::new(
            vec![str!("agent"), str!("animate")],
            Type::new(vec!["action"]),
            Value::atom("yes"),
        );
        let fs = c.as_fs();
        assert!(fs.ty().map(|t| t.contains("action")).unwrap_or(false));
        let agent = fs.get_feat("agent").and_then(|v| v.avm()).unwrap();
        assert_eq!(agent.get_feat("animate"), Some(&Value::atom("yes")));
    }

    #[test]
    fn test_check_attr_constraint_walks_path() {
        let mut inner = Fs::typed(Type::new(vec!["animate", "human"]), None);
        inner.set_feat("num", Value::atom("sg"));
        let mut fs = Fs::typed(Type::new(vec!["action"]), None);
        fs.set_feat("agent", Value::Avm(inner));

        let path = vec![str!("agent")];
        assert!(check_attr_constraint(&fs, &path, &[str!("animate")]));
        assert!(check_attr_constraint(
            &fs,
            &path,
            &[str!("animate"), str!("human")]
        ));
        assert!(!check_attr_constraint(&fs, &path, &[str!("plant")]));
        assert!(!check_attr_constraint(&fs, &[str!("theme")], &[str!("animate")]));
    }

    #[test]
    fn test_check_attr_constraint_placeholders_always_hold() {
        let mut fs = Fs::typed(Type::new(vec!["action"]), None);
        fs.set_feat("agent", Value::Avm(Fs::new()));
        let path = vec![str!("agent")];
        assert!(check_attr_constraint(&fs, &path, &[str!("@x")]));
        assert!(!check_attr_constraint(&fs, &path, &[str!("animate")]));
    }

    #[test]
    fn test_attribute_constraint_creates_right_path() {
        let mut env = Env::new();
        let mut fs = Fs::typed(Type::new(vec!["action"]), None);
        fs.set_feat("agent", Value::Avm(Fs::typed(Type::new(vec!["animate"]), None)));
        let frame = Frame::new(vec![fs], vec![]);
        let hc = HierarchyConstraint::new(
            attr(vec!["agent"], vec!["animate"], "a"),
            attr(vec!["instrument"], vec!["tool"], "i"),
        );
        let checked = ConstraintChecker::new(frame, vec![hc], &mut env, None)
            .check()
            .unwrap();
        let fs = &checked.feature_structures()[0];
        let inst = fs.get_feat("instrument").and_then(|v| v.avm()).unwrap();
        assert!(inst.ty().map(|t| t.contains("tool")).unwrap_or(false));
        assert_eq!(inst.coref(), Some(&Value::var("i")));
    }

    #[test]
    fn test_attribute_constraint_does_not_fire_without_premise() {
        let mut env = Env::new();
        let fs = Fs::typed(Type::new(vec!["action"]), None);
        let frame = Frame::new(vec![fs.clone()], vec![]);
        let hc = HierarchyConstraint::new(
            attr(vec!["agent"], vec!["animate"], "a"),
            attr(vec!["instrument"], vec!["tool"], "i"),
        );
        let checked = ConstraintChecker::new(frame, vec![hc], &mut env, None)
            .check()
            .unwrap();
        assert!(!checked.feature_structures()[0].has_feat("instrument"));
    }

    #[test]
    fn test_types_constraint_extends_type() {
        let h = TypeHierarchy::new(vec![
            Type::new(vec!["verb"]),
            Type::new(vec!["event"]),
            Type::new(vec!["verb", "event"]),
        ]);
        let mut env = Env::new();
        let fs = Fs::typed(Type::new(vec!["verb"]), None);
        let frame = Frame::new(vec![fs], vec![]);
        let hc = HierarchyConstraint::new(
            ConstraintLiteral::Types(vec![str!("verb")]),
            ConstraintLiteral::Types(vec![str!("event")]),
        );
        let checked = ConstraintChecker::new(frame, vec![hc], &mut env, Some(&h))
            .check()
            .unwrap();
        let ty = checked.feature_structures()[0].ty().unwrap();
        assert!(ty.contains("verb") && ty.contains("event"));
    }

    #[test]
    fn test_unsupported_form_is_skipped() {
        let mut env = Env::new();
        let fs = Fs::typed(Type::new(vec!["action"]), None);
        let frame = Frame::new(vec![fs.clone()], vec![]);
        let hc = HierarchyConstraint::new(
            ConstraintLiteral::PathIdentity(vec![str!("a")], vec![str!("b")]),
            ConstraintLiteral::Types(vec![str!("event")]),
        );
        let checked = ConstraintChecker::new(frame, vec![hc], &mut env, None)
            .check()
            .unwrap();
        assert_eq!(checked.feature_structures()[0], fs);
    }

    #[test]
    fn test_attached_constraint_rejects_violation() {
        let mut env = Env::new();
        let c = TypeConstraint::new(
            vec![str!("polarity")],
            Type::new(vec!["claim"]),
            Value::atom("pos"),
        );
        let ty = Type::with_constraints(
            vec![str!("claim")].into_iter().collect(),
            Value::var("T"),
            vec![c],
        );
        let mut fs = Fs::typed(ty, None);
        fs.set_feat("polarity", Value::atom("neg"));
        let frame = Frame::new(vec![fs], vec![]);
        assert!(ConstraintChecker::new(frame, vec![], &mut env, None)
            .check()
            .is_none());
    }
}
