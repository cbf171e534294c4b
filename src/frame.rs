use serde::{Deserialize, Serialize};

use crate::{fs::Fs, state::NameFactory, utils, value::Value};

/// A named relation between values, carried alongside the feature
/// structures of a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    name: String,
    arguments: Vec<Value>,
}

impl Relation {
    pub fn new<S: Into<String>>(name: S, arguments: Vec<Value>) -> Relation {
        Relation {
            name: name.into(),
            arguments,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn renamed(&self, nf: &mut NameFactory) -> Relation {
        Relation {
            name: self.name.clone(),
            arguments: self.arguments.iter().map(|v| v.renamed(nf)).collect(),
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, utils::join(self.arguments.iter(), ", "))
    }
}

/// A set of feature structures plus the relations over them. One
/// frame is the unit that merging and constraint checking work on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    feature_structures: Vec<Fs>,
    relations: Vec<Relation>,
}

impl Frame {
    pub fn new(feature_structures: Vec<Fs>, relations: Vec<Relation>) -> Frame {
        Frame {
            feature_structures,
            relations,
        }
    }

    pub fn feature_structures(&self) -> &[Fs] {
        &self.feature_structures
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn add_fs(&mut self, fs: Fs) {
        self.feature_structures.push(fs);
    }

    pub fn add_relation(&mut self, rel: Relation) {
        self.relations.push(rel);
    }

    pub fn is_empty(&self) -> bool {
        self.feature_structures.is_empty() && self.relations.is_empty()
    }

    /// Copy of this frame with every variable renamed through `nf`.
    /// Structures and relations share the factory, so a variable used
    /// in both keeps linking them after the rename.
    pub fn renamed(&self, nf: &mut NameFactory) -> Frame {
        Frame {
            feature_structures: self
                .feature_structures
                .iter()
                .map(|fs| fs.renamed(nf))
                .collect(),
            relations: self.relations.iter().map(|r| r.renamed(nf)).collect(),
        }
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "frame {{")?;
        for fs in self.feature_structures.iter() {
            writeln!(f, "{}", utils::indent(fs.to_string(), 2))?;
        }
        for r in self.relations.iter() {
            writeln!(f, "{}", utils::indent(r.to_string(), 2))?;
        }
        write!(f, "}}")
    }
}
