use serde::{Deserialize, Serialize};

use crate::{fs::Fs, state::NameFactory};

/// A binding name. Canonical names carry a `@` prefix and survive
/// coreference collection without being renamed again.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarName(pub String);

impl VarName {
    pub fn new<S: Into<String>>(name: S) -> VarName {
        VarName(name.into())
    }

    pub fn is_canonical(&self) -> bool {
        self.0.starts_with('@')
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for VarName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Atom(String),
    Int(i64),
    Avm(Fs),
    /// Atomic disjunction. An optional leading `Var` is the binding
    /// annotation and is not a member of the disjunction itself.
    Adisj(Vec<Value>),
    Var(VarName),
}

impl Value {
    pub fn atom<S: Into<String>>(s: S) -> Value {
        Value::Atom(s.into())
    }

    pub fn var<S: Into<String>>(s: S) -> Value {
        Value::Var(VarName::new(s))
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Value::Var(_))
    }

    pub fn is_avm(&self) -> bool {
        matches!(self, Value::Avm(_))
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Value::Atom(_))
    }

    pub fn var_name(&self) -> Option<&VarName> {
        match self {
            Value::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn avm(&self) -> Option<&Fs> {
        match self {
            Value::Avm(fs) => Some(fs),
            _ => None,
        }
    }

    pub fn avm_mut(&mut self) -> Option<&mut Fs> {
        match self {
            Value::Avm(fs) => Some(fs),
            _ => None,
        }
    }

    pub fn adisj(&self) -> Option<&[Value]> {
        match self {
            Value::Adisj(vs) => Some(vs.as_slice()),
            _ => None,
        }
    }

    /// The binding annotation of a disjunction, if one is attached.
    pub fn adisj_binding(&self) -> Option<&VarName> {
        match self {
            Value::Adisj(vs) => vs.first().and_then(|v| v.var_name()),
            _ => None,
        }
    }

    /// Copy of this value with every variable renamed through `nf`.
    /// Atoms are renamed only when they are known to `nf` already,
    /// which keeps semantic labels shared across renamed structures.
    pub fn renamed(&self, nf: &mut NameFactory) -> Value {
        match self {
            Value::Var(v) => Value::Var(VarName::new(nf.name_for(v.as_str()))),
            Value::Atom(s) if nf.is_known(s) => Value::Atom(nf.name_for(s)),
            Value::Atom(_) | Value::Int(_) => self.clone(),
            Value::Avm(fs) => Value::Avm(fs.renamed(nf)),
            Value::Adisj(vs) => Value::Adisj(vs.iter().map(|v| v.renamed(nf)).collect()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Atom(a), Value::Atom(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Var(a), Value::Var(b)) => a == b,
            (Value::Avm(a), Value::Avm(b)) => a == b,
            (Value::Adisj(a), Value::Adisj(b)) => {
                // Disjunctions are sets. Compare member text in sorted
                // order so {a|b} and {b|a} are the same value.
                let mut xs = a.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                let mut ys = b.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                xs.sort();
                ys.sort();
                xs == ys
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Atom(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Avm(fs) => write!(f, "{}", fs),
            Value::Adisj(vs) => {
                let (binding, members) = match vs.split_first() {
                    Some((Value::Var(v), rest)) => (Some(v), rest),
                    _ => (None, vs.as_slice()),
                };
                write!(f, "@")?;
                if let Some(v) = binding {
                    write!(f, "{}", v)?;
                }
                write!(f, "{{{}}}", crate::utils::join(members, "|"))
            }
            Value::Var(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn test_adisj_eq_is_order_insensitive() {
        let a = adisj!["red", "green", "blue"];
        let b = adisj!["blue", "red", "green"];
        assert_eq!(a, b);
    }

    #[test]
    fn test_adisj_eq_respects_members() {
        let a = adisj!["red", "green"];
        let b = adisj!["red", "yellow"];
        assert_ne!(a, b);
    }

    #[test]
    fn test_adisj_display_with_binding() {
        let v = Value::Adisj(vec![var!(X1), Value::atom("sg"), Value::atom("pl")]);
        assert_eq!(v.to_string(), "@X1{sg|pl}");
    }

    #[test]
    fn test_canonical_names() {
        assert!(VarName::new("@X0_1").is_canonical());
        assert!(!VarName::new("X0_1").is_canonical());
    }

    #[test]
    fn test_renamed_maps_vars_consistently() {
        let mut nf = NameFactory::new();
        let a = var!(X).renamed(&mut nf);
        let b = var!(X).renamed(&mut nf);
        let c = var!(Y).renamed(&mut nf);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
