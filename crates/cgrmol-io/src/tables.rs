//! Code tables shared by the readers and the writer
//!
//! MDL charge codes, V3000 stereo configuration codes, the known element set
//! used for atom list complements, and placement of data sgroup labels.

use std::sync::OnceLock;

use ahash::AHashSet;

use crate::draft::AtomRecord;
use crate::error::{MolError, MolResult};

/// Element symbols in atomic-number order (H..Og)
pub const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Atom lists longer than this are written as their complement
pub const HALF_TABLE: usize = ELEMENTS.len() / 2;

static ELEMENT_SET: OnceLock<AHashSet<&'static str>> = OnceLock::new();

fn element_set() -> &'static AHashSet<&'static str> {
    ELEMENT_SET.get_or_init(|| ELEMENTS.iter().copied().collect())
}

/// Check whether a symbol belongs to the known element set
pub fn is_element(symbol: &str) -> bool {
    element_set().contains(symbol)
}

/// Known elements not present in `symbols`, in atomic-number order
pub fn complement<S: AsRef<str>>(symbols: &[S]) -> Vec<&'static str> {
    let excluded: AHashSet<&str> = symbols.iter().map(|s| s.as_ref()).collect();
    ELEMENTS
        .iter()
        .copied()
        .filter(|symbol| !excluded.contains(symbol))
        .collect()
}

/// Decode an MDL atom-block charge code
///
/// Code 4 is the doublet radical marker and carries no charge.
pub fn charge_from_mdl(code: u8) -> Option<i32> {
    match code {
        0 | 4 => Some(0),
        1 => Some(3),
        2 => Some(2),
        3 => Some(1),
        5 => Some(-1),
        6 => Some(-2),
        7 => Some(-3),
        _ => None,
    }
}

/// Encode a formal charge as an MDL atom-block charge code
pub fn charge_to_mdl(charge: i32) -> MolResult<u8> {
    match charge {
        -3 => Ok(7),
        -2 => Ok(6),
        -1 => Ok(5),
        0 => Ok(0),
        1 => Ok(3),
        2 => Ok(2),
        3 => Ok(1),
        other => Err(MolError::UnsupportedCharge(other)),
    }
}

/// Map a V3000 `CFG` value to a V2000 bond stereo code
pub fn stereo_from_cfg(cfg: &str) -> Option<u8> {
    match cfg {
        "0" => Some(0),
        "1" => Some(1),
        "2" => Some(4),
        "3" => Some(6),
        _ => None,
    }
}

/// 2-D position for a data sgroup label anchored on `atoms`
///
/// A single atom places the label just right of it. For a pair the label sits
/// next to the midpoint, nudged off the line joining the atoms.
pub fn anchor_position(atoms: &[&AtomRecord]) -> Option<(f64, f64)> {
    let first = atoms.first()?;
    if atoms.len() == 1 {
        return Some((first.x + 0.25, first.y));
    }
    let last = atoms.last()?;

    let x = (first.x + last.x) / 2.0 + 0.2;
    let mut y = (first.y + last.y) / 2.0;
    let dx = last.x - first.x;
    let dy = last.y - first.y;
    if dx > 0.0 {
        y += if dy > 0.0 { -0.2 } else { 0.2 };
    } else if dx < 0.0 {
        y += if dy < 0.0 { -0.2 } else { 0.2 };
    }
    Some((x, y))
}
