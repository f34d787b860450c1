//! V2000 connection table reader
//!
//! Consumes a fixed-column atom block, a bond block and the `M  ` property
//! block up to `M  END`, one line per call.

use std::str::FromStr;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::draft::{AtomRecord, BondRecord, MoleculeDraft, PropertyKind, PropertyRecord, PropertyValue};
use crate::error::{MolError, MolResult};
use crate::tables::charge_from_mdl;
use crate::traits::MolBlockReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixedState {
    ReadingAtoms,
    ReadingBonds,
    ReadingProperties,
    Done,
    Consumed,
}

/// Kind of a line inside the property block; `M  END` is handled by the
/// reader state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyLine {
    AtomList,
    Isotope,
    Radical,
    Charge,
    GroupTypes,
    GroupAtoms,
    GroupType,
    GroupValue,
    Other,
}

impl PropertyLine {
    fn classify(line: &str) -> Self {
        match line.get(0..6) {
            Some("M  ALS") => PropertyLine::AtomList,
            Some("M  ISO") => PropertyLine::Isotope,
            Some("M  RAD") => PropertyLine::Radical,
            Some("M  CHG") => PropertyLine::Charge,
            Some("M  STY") => PropertyLine::GroupTypes,
            Some("M  SAL") => PropertyLine::GroupAtoms,
            Some("M  SDT") => PropertyLine::GroupType,
            Some("M  SED") => PropertyLine::GroupValue,
            _ => PropertyLine::Other,
        }
    }
}

/// Atom-level property slot; an atom list and its negation share one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AtomSlot {
    List,
    Isotope,
    Radical,
    Charge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PropertyKey {
    Atom(AtomSlot, usize),
    Group(u32),
}

/// Property being assembled; `M  STY` groups are filled field by field
#[derive(Debug, Clone, Default)]
struct PendingProperty {
    atoms: Option<SmallVec<[usize; 2]>>,
    kind: Option<PropertyKind>,
    value: Option<PropertyValue>,
}

impl PendingProperty {
    fn complete(record: PropertyRecord) -> Self {
        PendingProperty {
            atoms: Some(record.atoms),
            kind: Some(record.kind),
            value: Some(record.value),
        }
    }

    fn into_record(self) -> Option<PropertyRecord> {
        Some(PropertyRecord {
            atoms: self.atoms?,
            kind: self.kind?,
            value: self.value?,
        })
    }
}

/// Incremental V2000 reader
///
/// Created from the counts line; every later line is routed by the current
/// state: atom lines until the declared atom count is reached, then bond
/// lines, then property lines until `M  END`.
#[derive(Debug)]
pub struct FixedReader {
    state: FixedState,
    atoms_count: usize,
    bonds_count: usize,
    atoms: Vec<AtomRecord>,
    bonds: Vec<BondRecord>,
    props: IndexMap<PropertyKey, PendingProperty>,
    line_number: usize,
}

impl FixedReader {
    /// Create a reader from the counts line
    pub fn new(counts_line: &str) -> MolResult<Self> {
        let atoms_count: usize = parse_number(column(counts_line, 0, 3), 1, "atom count")?;
        if atoms_count == 0 {
            return Err(MolError::EmptyMolecule);
        }
        let bonds_count: usize = parse_number(column(counts_line, 3, 6), 1, "bond count")?;

        Ok(FixedReader {
            state: FixedState::ReadingAtoms,
            atoms_count,
            bonds_count,
            atoms: Vec::with_capacity(atoms_count),
            bonds: Vec::with_capacity(bonds_count),
            props: IndexMap::new(),
            line_number: 1,
        })
    }

    fn read_atom(&mut self, line: &str) -> MolResult<()> {
        let ln = self.line_number;
        let x = parse_number(column(line, 0, 10), ln, "x coordinate")?;
        let y = parse_number(column(line, 10, 20), ln, "y coordinate")?;
        let z = parse_number(column(line, 20, 30), ln, "z coordinate")?;

        let element = column(line, 31, 34).trim();
        if element.is_empty() {
            return Err(MolError::format(ln, "missing atom symbol"));
        }

        let isotope = parse_or_zero(column(line, 34, 36), ln, "mass difference")?;
        let code: u8 = parse_or_zero(column(line, 38, 39), ln, "charge code")?;
        let charge = charge_from_mdl(code)
            .ok_or_else(|| MolError::format(ln, format!("unknown charge code {}", code)))?;

        let mark = match column(line, 54, 57).trim() {
            "" => "0",
            mark => mark,
        };
        let map = parse_or_zero(column(line, 60, 63), ln, "atom map")?;

        self.atoms.push(AtomRecord {
            element: element.to_string(),
            isotope,
            charge,
            map,
            mark: mark.to_string(),
            x,
            y,
            z,
        });

        if self.atoms.len() == self.atoms_count {
            self.state = if self.bonds_count == 0 {
                FixedState::ReadingProperties
            } else {
                FixedState::ReadingBonds
            };
        }
        Ok(())
    }

    fn read_bond(&mut self, line: &str) -> MolResult<()> {
        let ln = self.line_number;
        self.bonds.push(BondRecord {
            atom1: parse_number(column(line, 0, 3), ln, "first bond atom")?,
            atom2: parse_number(column(line, 3, 6), ln, "second bond atom")?,
            order: parse_number(column(line, 6, 9), ln, "bond type")?,
            stereo: parse_or_zero(column(line, 9, 12), ln, "bond stereo")?,
        });

        if self.bonds.len() == self.bonds_count {
            self.state = FixedState::ReadingProperties;
        }
        Ok(())
    }

    fn read_property(&mut self, kind: PropertyLine, line: &str) -> MolResult<()> {
        let ln = self.line_number;
        match kind {
            PropertyLine::AtomList => {
                let atom: usize = parse_number(column(line, 7, 10), ln, "atom list atom")?;
                let count: usize = parse_number(column(line, 10, 13), ln, "atom list count")?;
                let kind = if column(line, 14, 15) == "F" {
                    PropertyKind::AtomList
                } else {
                    PropertyKind::AtomNotList
                };
                let elements = (0..count)
                    .map(|i| column(line, 16 + i * 4, 20 + i * 4).trim().to_string())
                    .collect::<Vec<_>>();
                self.props.insert(
                    PropertyKey::Atom(AtomSlot::List, atom),
                    PendingProperty::complete(PropertyRecord::atom(atom, kind, elements)),
                );
            }
            PropertyLine::Isotope | PropertyLine::Radical | PropertyLine::Charge => {
                let (slot, prop) = match kind {
                    PropertyLine::Isotope => (AtomSlot::Isotope, PropertyKind::Isotope),
                    PropertyLine::Radical => (AtomSlot::Radical, PropertyKind::Radical),
                    _ => (AtomSlot::Charge, PropertyKind::Charge),
                };
                let count: usize = parse_number(column(line, 6, 9), ln, "entry count")?;
                for i in 0..count {
                    let atom: usize =
                        parse_number(column(line, 10 + i * 8, 13 + i * 8), ln, "property atom")?;
                    let value = column(line, 14 + i * 8, 17 + i * 8).trim();
                    self.props.insert(
                        PropertyKey::Atom(slot, atom),
                        PendingProperty::complete(PropertyRecord::atom(atom, prop.clone(), value)),
                    );
                }
            }
            PropertyLine::GroupTypes => {
                let count: usize = parse_number(column(line, 6, 9), ln, "sgroup count")?;
                for i in 0..count {
                    if !column(line, 10 + 8 * i, 17 + 8 * i).contains("DAT") {
                        continue;
                    }
                    let id = parse_number(column(line, 10 + 8 * i, 13 + 8 * i), ln, "sgroup id")?;
                    self.props
                        .insert(PropertyKey::Group(id), PendingProperty::default());
                }
            }
            PropertyLine::GroupAtoms | PropertyLine::GroupType | PropertyLine::GroupValue => {
                let id = parse_number(column(line, 7, 10), ln, "sgroup id")?;
                let Some(group) = self.props.get_mut(&PropertyKey::Group(id)) else {
                    log::warn!("Line {}: data for undeclared sgroup {} ignored", ln, id);
                    return Ok(());
                };
                match kind {
                    PropertyLine::GroupAtoms => {
                        let count: usize =
                            parse_number(column(line, 10, 13), ln, "sgroup atom count")?;
                        let atoms = (0..count)
                            .map(|i| {
                                parse_number(column(line, 14 + 4 * i, 17 + 4 * i), ln, "sgroup atom")
                            })
                            .collect::<MolResult<SmallVec<_>>>()?;
                        group.atoms = Some(atoms);
                    }
                    PropertyLine::GroupType => {
                        let name = line.split_whitespace().last().unwrap_or_default();
                        group.kind = Some(PropertyKind::Data(name.to_lowercase()));
                    }
                    _ => {
                        let value = column(line, 10, line.len())
                            .trim()
                            .trim_end_matches('/')
                            .trim_end()
                            .to_lowercase();
                        group.value = Some(PropertyValue::Single(value));
                    }
                }
            }
            PropertyLine::Other => {
                log::debug!("Line {}: ignoring property line {:?}", ln, line);
            }
        }
        Ok(())
    }

    /// Accumulated properties in insertion order, with group ids ascending
    fn collect_properties(&mut self) -> Vec<PropertyRecord> {
        let mut entries: Vec<(PropertyKey, PendingProperty)> = self.props.drain(..).collect();

        let slots: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, (key, _))| matches!(key, PropertyKey::Group(_)))
            .map(|(i, _)| i)
            .collect();
        let mut groups: Vec<(PropertyKey, PendingProperty)> = slots
            .iter()
            .map(|&i| std::mem::replace(&mut entries[i], (PropertyKey::Group(0), PendingProperty::default())))
            .collect();
        groups.sort_by_key(|(key, _)| match key {
            PropertyKey::Group(id) => *id,
            PropertyKey::Atom(..) => 0,
        });
        for (slot, group) in slots.into_iter().zip(groups) {
            entries[slot] = group;
        }

        entries
            .into_iter()
            .filter_map(|(key, pending)| {
                let record = pending.into_record();
                if record.is_none() {
                    log::warn!("Dropping incomplete property {:?}", key);
                }
                record
            })
            .collect()
    }
}

impl MolBlockReader for FixedReader {
    fn feed(&mut self, line: &str) -> MolResult<bool> {
        let line = line.trim_end_matches(['\n', '\r']);
        self.line_number += 1;

        match self.state {
            FixedState::ReadingAtoms => self.read_atom(line)?,
            FixedState::ReadingBonds => self.read_bond(line)?,
            FixedState::ReadingProperties if line.starts_with("M  END") => {
                self.state = FixedState::Done;
                return Ok(true);
            }
            FixedState::ReadingProperties => {
                self.read_property(PropertyLine::classify(line), line)?
            }
            FixedState::Done | FixedState::Consumed => {
                return Err(MolError::protocol("line fed after M  END"));
            }
        }
        Ok(false)
    }

    fn is_complete(&self) -> bool {
        matches!(self.state, FixedState::Done | FixedState::Consumed)
    }

    fn take_draft(&mut self) -> MolResult<MoleculeDraft> {
        match self.state {
            FixedState::Done => {}
            FixedState::Consumed => return Err(MolError::protocol("molecule already taken")),
            _ => return Err(MolError::Incomplete),
        }
        self.state = FixedState::Consumed;

        let properties = self.collect_properties();
        MoleculeDraft::new(
            std::mem::take(&mut self.atoms),
            std::mem::take(&mut self.bonds),
            properties,
        )
    }
}

/// Fixed column slice, clipped to the line length
fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start..end).unwrap_or("")
}

fn parse_number<T: FromStr>(text: &str, line: usize, field: &'static str) -> MolResult<T> {
    let text = text.trim();
    text.parse()
        .map_err(|_| MolError::invalid_number(line, field, text))
}

/// Like [`parse_number`], but a blank column reads as zero
fn parse_or_zero<T: FromStr + Default>(text: &str, line: usize, field: &'static str) -> MolResult<T> {
    if text.trim().is_empty() {
        Ok(T::default())
    } else {
        parse_number(text, line, field)
    }
}
