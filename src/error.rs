use crate::{ty::Type, value::Value};

pub type UnifyResult<T> = Result<T, UnifyError>;

#[derive(Clone, Debug, PartialEq)]
pub enum UnifyErrorKind {
    Message(String),
    /// Two values with no common instance.
    Mismatch(Value, Value),
    /// The combined type has no entry in the declared hierarchy.
    Types(Type, Type),
    /// A failure underneath a named feature.
    Feature(String, Box<UnifyError>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnifyError {
    pub kind: UnifyErrorKind,
}

impl UnifyError {
    pub fn new<S: Into<String>>(msg: S) -> UnifyError {
        UnifyError {
            kind: UnifyErrorKind::Message(msg.into()),
        }
    }

    pub fn mismatch(a: Value, b: Value) -> UnifyError {
        UnifyError {
            kind: UnifyErrorKind::Mismatch(a, b),
        }
    }

    pub fn types(a: Type, b: Type) -> UnifyError {
        UnifyError {
            kind: UnifyErrorKind::Types(a, b),
        }
    }

    pub fn feature<S: Into<String>>(feat: S, err: UnifyError) -> UnifyError {
        UnifyError {
            kind: UnifyErrorKind::Feature(feat.into(), Box::new(err)),
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            UnifyErrorKind::Message(msg) => msg.clone(),
            UnifyErrorKind::Mismatch(a, b) => {
                format!("cannot unify `{}` and `{}`", a, b)
            }
            UnifyErrorKind::Types(a, b) => {
                format!("types `{}` and `{}` have no common subtype", a, b)
            }
            UnifyErrorKind::Feature(feat, err) => {
                format!("feature {}: {}", feat, err.message())
            }
        }
    }

    /// The innermost feature path leading to the failure, if any.
    pub fn path(&self) -> Vec<&str> {
        let mut path = vec![];
        let mut err = self;
        while let UnifyErrorKind::Feature(feat, inner) = &err.kind {
            path.push(feat.as_str());
            err = inner;
        }
        path
    }
}

impl std::fmt::Display for UnifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for UnifyError {}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_feature_context_nests() {
        let inner = UnifyError::mismatch(
            Value::Atom(str!("a")),
            Value::Atom(str!("b")),
        );
        let err = UnifyError::feature("agent", UnifyError::feature("cat", inner));
        assert_eq!(err.message(), "feature agent: feature cat: cannot unify `a` and `b`");
        assert_eq!(err.path(), vec!["agent", "cat"]);
    }
}
