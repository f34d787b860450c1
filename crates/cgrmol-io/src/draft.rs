//! Molecule draft data model
//!
//! The normalized output of both readers and the input of the writer. Atom
//! indices stored in bonds and properties are 1-based, as in the file.

use std::fmt;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::error::{MolError, MolResult};

/// A single atom as read from an atom block
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    /// Element symbol (or `L` for an atom list placeholder)
    pub element: String,
    /// Isotope / mass difference (0 = unset)
    pub isotope: i32,
    /// Formal charge
    pub charge: i32,
    /// Atom-to-atom mapping number (0 = unmapped)
    pub map: u32,
    /// Reaction mark
    pub mark: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AtomRecord {
    /// Create a neutral, unmapped atom at the given position
    pub fn new(element: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        AtomRecord {
            element: element.into(),
            isotope: 0,
            charge: 0,
            map: 0,
            mark: "0".to_string(),
            x,
            y,
            z,
        }
    }

    /// Set the formal charge
    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = charge;
        self
    }

    /// Set the mapping number
    pub fn with_map(mut self, map: u32) -> Self {
        self.map = map;
        self
    }

    /// Set the reaction mark
    pub fn with_mark(mut self, mark: impl Into<String>) -> Self {
        self.mark = mark.into();
        self
    }
}

/// A bond between two 1-based atom indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BondRecord {
    pub atom1: usize,
    pub atom2: usize,
    /// Bond order/type code
    pub order: u8,
    /// V2000 stereo code
    pub stereo: u8,
}

impl BondRecord {
    pub fn new(atom1: usize, atom2: usize, order: u8, stereo: u8) -> Self {
        BondRecord {
            atom1,
            atom2,
            order,
            stereo,
        }
    }
}

/// Tag of an extended property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Isotope,
    Radical,
    Charge,
    /// Atom may be any of the listed elements
    AtomList,
    /// Atom may be any element except the listed ones
    AtomNotList,
    /// Free-form generic data carried by a `DAT` group (lower-cased name)
    Data(String),
}

impl PropertyKind {
    /// The tag string used in files and in the draft
    pub fn as_str(&self) -> &str {
        match self {
            PropertyKind::Isotope => "isotope",
            PropertyKind::Radical => "radical",
            PropertyKind::Charge => "charge",
            PropertyKind::AtomList => "atomlist",
            PropertyKind::AtomNotList => "atomnotlist",
            PropertyKind::Data(name) => name,
        }
    }

    /// Whether this kind is written as an atom-level `M  ISO`/`RAD`/`ALS` line
    pub fn is_atom_level(&self) -> bool {
        matches!(
            self,
            PropertyKind::Isotope
                | PropertyKind::Radical
                | PropertyKind::AtomList
                | PropertyKind::AtomNotList
        )
    }
}

impl From<&str> for PropertyKind {
    fn from(tag: &str) -> Self {
        match tag {
            "isotope" => PropertyKind::Isotope,
            "radical" => PropertyKind::Radical,
            "charge" => PropertyKind::Charge,
            "atomlist" => PropertyKind::AtomList,
            "atomnotlist" => PropertyKind::AtomNotList,
            other => PropertyKind::Data(other.to_string()),
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of an extended property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Single(String),
    List(Vec<String>),
}

impl PropertyValue {
    /// The value as a slice of items; a single value is a one-item slice
    pub fn items(&self) -> &[String] {
        match self {
            PropertyValue::Single(value) => std::slice::from_ref(value),
            PropertyValue::List(values) => values,
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            PropertyValue::Single(value) => Some(value),
            PropertyValue::List(_) => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Single(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Single(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::List(values)
    }
}

/// Extended property attached to one atom or an atom pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    /// 1-based anchor atom indices (one or two)
    pub atoms: SmallVec<[usize; 2]>,
    pub kind: PropertyKind,
    pub value: PropertyValue,
}

impl PropertyRecord {
    pub fn new(
        atoms: impl IntoIterator<Item = usize>,
        kind: PropertyKind,
        value: impl Into<PropertyValue>,
    ) -> Self {
        PropertyRecord {
            atoms: atoms.into_iter().collect(),
            kind,
            value: value.into(),
        }
    }

    /// Property anchored to a single atom
    pub fn atom(atom: usize, kind: PropertyKind, value: impl Into<PropertyValue>) -> Self {
        Self::new([atom], kind, value)
    }
}

/// Complete result of reading one molecule block
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeDraft {
    pub atoms: Vec<AtomRecord>,
    pub bonds: Vec<BondRecord>,
    /// Extended properties in insertion order
    pub extended_properties: Vec<PropertyRecord>,
    /// Filled by callers handling title/comment lines
    pub meta: AHashMap<String, String>,
    /// Filled by callers handling color annotations
    pub colors: AHashMap<String, String>,
}

impl MoleculeDraft {
    /// Create a draft; a molecule without atoms is rejected
    pub fn new(
        atoms: Vec<AtomRecord>,
        bonds: Vec<BondRecord>,
        extended_properties: Vec<PropertyRecord>,
    ) -> MolResult<Self> {
        if atoms.is_empty() {
            return Err(MolError::EmptyMolecule);
        }
        Ok(MoleculeDraft {
            atoms,
            bonds,
            extended_properties,
            meta: AHashMap::new(),
            colors: AHashMap::new(),
        })
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Properties of the given kind, in order
    pub fn properties_of<'a>(
        &'a self,
        kind: &'a PropertyKind,
    ) -> impl Iterator<Item = &'a PropertyRecord> + 'a {
        self.extended_properties
            .iter()
            .filter(move |prop| &prop.kind == kind)
    }
}
