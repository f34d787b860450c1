//! V2000 connection table writer
//!
//! Writes a molecule draft, including its extended properties, as a
//! fixed-column V2000 block.

use std::io::Write;

use crate::draft::{AtomRecord, MoleculeDraft, PropertyKind, PropertyRecord};
use crate::error::{MolError, MolResult};
use crate::tables::{anchor_position, charge_to_mdl, complement, HALF_TABLE};
use crate::traits::{Dialect, WriteOptions};

/// Data sgroups declared per `M  STY` line
const STY_PER_LINE: usize = 8;

/// V2000 block writer
pub struct FixedWriter<W> {
    writer: W,
    options: WriteOptions,
}

impl<W: Write> FixedWriter<W> {
    /// Create a new writer with default header lines
    pub fn new(writer: W) -> Self {
        FixedWriter {
            writer,
            options: WriteOptions::default(),
        }
    }

    /// Create a writer with explicit options
    pub fn with_options(writer: W, options: WriteOptions) -> Self {
        FixedWriter { writer, options }
    }

    /// Write one molecule block terminated by `M  END`
    pub fn write_molecule(&mut self, draft: &MoleculeDraft) -> MolResult<()> {
        let atoms = &draft.atoms;
        let bonds = &draft.bonds;

        if atoms.len() > 999 || bonds.len() > 999 {
            return Err(MolError::TooLarge {
                atoms: atoms.len(),
                bonds: bonds.len(),
            });
        }

        // Header: blank title, attribution, comment, counts
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", self.options.attribution)?;
        writeln!(self.writer, "{}", self.options.comment)?;
        writeln!(
            self.writer,
            "{:>3}{:>3}  0  0  0  0            999 {}",
            atoms.len(),
            bonds.len(),
            Dialect::V2000.tag()
        )?;

        for atom in atoms {
            writeln!(
                self.writer,
                "{:10.4}{:10.4}{:10.4} {:<3}{:>2}{:>3}  0  0  0  0  0{:>3}  0{:>3}  0  0",
                atom.x,
                atom.y,
                atom.z,
                atom.element,
                atom.isotope,
                charge_to_mdl(atom.charge)?,
                atom.mark,
                atom.map
            )?;
        }

        for bond in bonds {
            writeln!(
                self.writer,
                "{:>3}{:>3}{:>3}{:>3}  0  0  0",
                bond.atom1, bond.atom2, bond.order, bond.stereo
            )?;
        }

        for prop in draft
            .extended_properties
            .iter()
            .filter(|prop| prop.kind.is_atom_level())
        {
            self.write_atom_property(prop, atoms.len())?;
        }

        let data: Vec<&PropertyRecord> = draft
            .extended_properties
            .iter()
            .filter(|prop| matches!(prop.kind, PropertyKind::Data(_)))
            .collect();
        self.write_data_groups(&data, atoms)?;

        writeln!(self.writer, "M  END")?;
        Ok(())
    }

    fn write_atom_property(&mut self, prop: &PropertyRecord, atom_count: usize) -> MolResult<()> {
        let atom = first_atom(prop, atom_count)?;
        match &prop.kind {
            PropertyKind::Isotope => {
                writeln!(self.writer, "M  ISO  1 {:>3} {:>3}", atom, prop.value.items().join(","))?;
            }
            PropertyKind::Radical => {
                writeln!(self.writer, "M  RAD  1 {:>3} {:>3}", atom, prop.value.items().join(","))?;
            }
            PropertyKind::AtomList | PropertyKind::AtomNotList => {
                let negated = prop.kind == PropertyKind::AtomNotList;
                let items = prop.value.items();
                // long lists are written as the complement with the flag flipped
                let (symbols, negated): (Vec<&str>, bool) = if items.len() > HALF_TABLE {
                    (complement(items), !negated)
                } else {
                    (items.iter().map(String::as_str).collect(), negated)
                };
                let listed: String = symbols.iter().map(|s| format!("{:<4}", s)).collect();
                writeln!(
                    self.writer,
                    "M  ALS {:>3}{:>3} {} {}",
                    atom,
                    symbols.len(),
                    if negated { 'T' } else { 'F' },
                    listed
                )?;
            }
            PropertyKind::Charge | PropertyKind::Data(_) => {}
        }
        Ok(())
    }

    fn write_data_groups(&mut self, data: &[&PropertyRecord], atoms: &[AtomRecord]) -> MolResult<()> {
        for (chunk_index, chunk) in data.chunks(STY_PER_LINE).enumerate() {
            let declared: Vec<String> = (1..=chunk.len())
                .map(|i| format!("{:>3} DAT", i + chunk_index * STY_PER_LINE))
                .collect();
            writeln!(self.writer, "M  STY  {} {}", chunk.len(), declared.join(" "))?;
        }

        for (id, prop) in data.iter().enumerate().map(|(i, prop)| (i + 1, prop)) {
            let anchors = prop
                .atoms
                .iter()
                .map(|&index| {
                    index
                        .checked_sub(1)
                        .and_then(|i| atoms.get(i))
                        .ok_or(MolError::AtomIndexOutOfRange {
                            index,
                            atoms: atoms.len(),
                        })
                })
                .collect::<MolResult<Vec<_>>>()?;
            let (cx, cy) = anchor_position(&anchors).ok_or(MolError::AtomIndexOutOfRange {
                index: 0,
                atoms: atoms.len(),
            })?;

            let listed: Vec<String> = prop.atoms.iter().map(|a| format!("{:>3}", a)).collect();
            writeln!(
                self.writer,
                "M  SAL {:>3}{:>3} {}",
                id,
                prop.atoms.len(),
                listed.join(" ")
            )?;
            writeln!(self.writer, "M  SDT {:>3} {}", id, prop.kind)?;
            writeln!(
                self.writer,
                "M  SDD {:>3} {:10.4}{:10.4}    DAU   ALL  0       0",
                id, cx, cy
            )?;
            writeln!(self.writer, "M  SED {:>3} {}", id, prop.value.items().join(","))?;
        }
        Ok(())
    }

    /// Flush the underlying sink
    pub fn flush(&mut self) -> MolResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Recover the underlying sink
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Single anchor atom of an atom-level property, checked against the atom count
fn first_atom(prop: &PropertyRecord, atom_count: usize) -> MolResult<usize> {
    let atom = prop.atoms.first().copied().unwrap_or(0);
    if atom == 0 || atom > atom_count {
        return Err(MolError::AtomIndexOutOfRange {
            index: atom,
            atoms: atom_count,
        });
    }
    Ok(atom)
}

/// Write a molecule draft as a V2000 block string
pub fn write_molblock(draft: &MoleculeDraft) -> MolResult<String> {
    let mut writer = FixedWriter::new(Vec::new());
    writer.write_molecule(draft)?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| MolError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
