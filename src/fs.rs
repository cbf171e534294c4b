use std::collections::HashSet;

use fnv::FnvHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    state::NameFactory,
    ty::Type,
    value::{Value, VarName},
};

/// An attribute-value matrix. A typed structure carries a type from
/// the hierarchy and usually a coreference binding; an untyped one is
/// a plain attribute map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fs {
    avm: FnvHashMap<String, Value>,
    ty: Option<Box<Type>>,
    coref: Option<Box<Value>>,
}

impl Fs {
    pub fn new() -> Fs {
        Fs::default()
    }

    pub fn typed(ty: Type, coref: Option<Value>) -> Fs {
        Fs {
            avm: FnvHashMap::default(),
            ty: Some(Box::new(ty)),
            coref: coref.map(Box::new),
        }
    }

    pub fn with(avm: FnvHashMap<String, Value>, ty: Option<Type>, coref: Option<Value>) -> Fs {
        Fs {
            avm,
            ty: ty.map(Box::new),
            coref: coref.map(Box::new),
        }
    }

    pub fn size(&self) -> usize {
        self.avm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avm.is_empty() && self.ty.is_none() && self.coref.is_none()
    }

    pub fn is_typed(&self) -> bool {
        self.ty.is_some()
    }

    pub fn ty(&self) -> Option<&Type> {
        self.ty.as_deref()
    }

    pub fn set_ty(&mut self, ty: Option<Type>) {
        self.ty = ty.map(Box::new);
    }

    pub fn coref(&self) -> Option<&Value> {
        self.coref.as_deref()
    }

    pub fn set_coref(&mut self, coref: Option<Value>) {
        self.coref = coref.map(Box::new);
    }

    /// Set a feature unless it is already present. The first write
    /// wins; later writes for the same name are dropped.
    pub fn set_feat<S: Into<String>>(&mut self, feat: S, val: Value) {
        let feat = feat.into();
        if self.avm.contains_key(&feat) {
            log::debug!("feature {} already set, keeping existing value", feat);
            return;
        }
        self.avm.insert(feat, val);
    }

    /// Set a feature, replacing any existing value.
    pub fn replace_feat<S: Into<String>>(&mut self, feat: S, val: Value) {
        self.avm.insert(feat.into(), val);
    }

    pub fn get_feat(&self, feat: &str) -> Option<&Value> {
        self.avm.get(feat)
    }

    pub fn get_feat_mut(&mut self, feat: &str) -> Option<&mut Value> {
        self.avm.get_mut(feat)
    }

    /// The feature's value when it is a constant.
    pub fn get_const_feat(&self, feat: &str) -> Option<&Value> {
        match self.avm.get(feat) {
            Some(v @ Value::Atom(_)) | Some(v @ Value::Int(_)) => Some(v),
            _ => None,
        }
    }

    pub fn has_feat(&self, feat: &str) -> bool {
        self.avm.contains_key(feat)
    }

    pub fn remove_feat(&mut self, feat: &str) -> Option<Value> {
        self.avm.remove(feat)
    }

    /// Feature names in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.avm.keys().cloned().sorted().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.avm.iter()
    }

    /// Copy of this structure with every variable renamed through `nf`.
    pub fn renamed(&self, nf: &mut NameFactory) -> Fs {
        let avm = self
            .avm
            .iter()
            .map(|(k, v)| (k.clone(), v.renamed(nf)))
            .collect();
        let ty = self.ty.as_ref().map(|t| {
            let mut t = (**t).clone();
            t.set_var(t.var().renamed(nf));
            Box::new(t)
        });
        let coref = self.coref.as_ref().map(|c| Box::new(c.renamed(nf)));
        Fs { avm, ty, coref }
    }

    fn display_rec(&self, seen: &mut HashSet<VarName>) -> String {
        if let Some(Value::Var(v)) = self.coref.as_deref() {
            if !seen.insert(v.clone()) {
                // Already printed under this binding.
                return format!("({})[...]", v);
            }
        }
        let mut out = String::new();
        if let Some(Value::Var(v)) = self.coref.as_deref() {
            out.push_str(&format!("({})", v));
        }
        out.push('[');
        if let Some(t) = &self.ty {
            out.push_str(&t.to_string());
        }
        for k in self.keys() {
            let v = match &self.avm[&k] {
                Value::Avm(fs) => fs.display_rec(seen),
                v => v.to_string(),
            };
            out.push_str(&format!("\n  {} = {}", k, v));
        }
        out.push(']');
        out
    }
}

impl std::fmt::Display for Fs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_rec(&mut HashSet::new()))
    }
}
