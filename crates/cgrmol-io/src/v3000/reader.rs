//! V3000 connection table reader
//!
//! A two-level state machine: the outer level tracks the `CTAB` block, the
//! inner level routes records to the atom, bond or sgroup parser selected by
//! the enclosing `BEGIN`/`END` markers.

use std::str::FromStr;

use crate::draft::{AtomRecord, BondRecord, MoleculeDraft, PropertyKind, PropertyRecord};
use crate::error::{MolError, MolResult};
use crate::tables::stereo_from_cfg;
use crate::traits::MolBlockReader;

use super::tokenizer::{tokenize, RecordCollector};

/// Placeholder symbol for atoms given as an element list
const LIST_SYMBOL: &str = "L";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CtabState {
    BeforeCtab,
    InCtab,
    AfterCtab,
    Consumed,
}

/// Sub-block whose records are currently being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubBlock {
    Atom,
    Bond,
    SGroup,
}

#[derive(Debug, Clone, Copy)]
struct Counts {
    atoms: usize,
    bonds: usize,
    sgroups: usize,
}

/// Incremental V3000 reader
#[derive(Debug)]
pub struct BlockReader {
    state: CtabState,
    counts: Option<Counts>,
    active: Option<SubBlock>,
    collector: RecordCollector,
    atoms: Vec<AtomRecord>,
    bonds: Vec<BondRecord>,
    props: Vec<PropertyRecord>,
    sgroups: usize,
    line_number: usize,
}

impl BlockReader {
    /// Create a reader; the V2000-style counts line of a V3000 file carries
    /// no counts and is not interpreted
    pub fn new(_counts_line: &str) -> Self {
        BlockReader {
            state: CtabState::BeforeCtab,
            counts: None,
            active: None,
            collector: RecordCollector::new(),
            atoms: Vec::new(),
            bonds: Vec::new(),
            props: Vec::new(),
            sgroups: 0,
            line_number: 1,
        }
    }

    fn read_ctab_line(&mut self, line: &str) -> MolResult<bool> {
        let ln = self.line_number;
        let upper = line.to_ascii_uppercase();

        if upper.starts_with("M  V30 END CTAB") {
            if self.atoms.is_empty() {
                return Err(MolError::EmptyMolecule);
            }
            self.state = CtabState::AfterCtab;
            return Ok(true);
        }

        let Some(counts) = self.counts else {
            if upper.starts_with("M  V30 COUNTS") {
                self.counts = Some(parse_counts(line, ln)?);
            } else if !line.trim().is_empty() {
                return Err(MolError::format(ln, "expected COUNTS line"));
            }
            return Ok(false);
        };

        if upper.starts_with("M  V30 COUNTS") {
            return Err(MolError::format(ln, "repeated COUNTS line"));
        } else if upper.starts_with("M  V30 BEGIN ATOM") {
            self.active = Some(SubBlock::Atom);
        } else if upper.starts_with("M  V30 BEGIN BOND") {
            self.active = Some(SubBlock::Bond);
        } else if upper.starts_with("M  V30 BEGIN SGROUP") {
            self.active = Some(SubBlock::SGroup);
        } else if let Some(name) = upper.strip_prefix("M  V30 END") {
            self.close_block(name.trim(), counts, ln)?;
        } else if let Some(block) = self.active {
            if let Some(record) = self.collector.push(line) {
                let fields = tokenize(&record)
                    .ok_or_else(|| MolError::format(ln, "unbalanced quote in record"))?;
                match block {
                    SubBlock::Atom => self.parse_atom(&fields, ln)?,
                    SubBlock::Bond => self.parse_bond(&fields, ln)?,
                    SubBlock::SGroup => self.parse_sgroup(&fields, ln)?,
                }
            }
        } else {
            log::debug!("Line {}: ignoring line outside sub-blocks", ln);
        }
        Ok(false)
    }

    fn close_block(&mut self, name: &str, counts: Counts, ln: usize) -> MolResult<()> {
        self.active = None;
        if self.collector.has_pending() {
            self.collector.reset();
            return Err(MolError::format(ln, "continued record not terminated"));
        }

        let (read, declared) = match name {
            "ATOM" => (self.atoms.len(), counts.atoms),
            "BOND" => (self.bonds.len(), counts.bonds),
            "SGROUP" => (self.sgroups, counts.sgroups),
            other => {
                log::debug!("Line {}: closed {} block", ln, other);
                return Ok(());
            }
        };
        if read != declared {
            return Err(MolError::format(
                ln,
                format!("invalid number of {} records", name),
            ));
        }
        Ok(())
    }

    /// `index symbol x y z map [KEY=VALUE...]`
    fn parse_atom(&mut self, fields: &[String], ln: usize) -> MolResult<()> {
        let [index, symbol, x, y, z, map, pairs @ ..] = fields else {
            return Err(MolError::format(ln, "atom record too short"));
        };
        let atom: usize = parse_field(index, ln, "atom index")?;

        let element = if symbol.starts_with('[') {
            self.props.push(PropertyRecord::atom(
                atom,
                PropertyKind::AtomList,
                list_items(symbol),
            ));
            LIST_SYMBOL
        } else if symbol
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("NOT"))
        {
            self.props.push(PropertyRecord::atom(
                atom,
                PropertyKind::AtomNotList,
                list_items(&symbol[3..]),
            ));
            LIST_SYMBOL
        } else {
            symbol.as_str()
        };

        let mut charge = 0;
        let mut mark = "0".to_string();
        for pair in pairs {
            let Some((key, value)) = pair.split_once('=') else {
                log::debug!("Line {}: ignoring atom field {:?}", ln, pair);
                continue;
            };
            let key = key.trim().to_ascii_uppercase();
            if !matches!(key.as_str(), "CHG" | "MASS" | "RAD" | "ISIDAMARK") {
                log::debug!("Line {}: ignoring atom key {}", ln, key);
                continue;
            }
            if value.is_empty() {
                return Err(MolError::format(ln, format!("empty value for {}", key)));
            }
            match key.as_str() {
                "CHG" => charge = parse_field(value, ln, "CHG")?,
                "MASS" => self
                    .props
                    .push(PropertyRecord::atom(atom, PropertyKind::Isotope, value)),
                "RAD" => self
                    .props
                    .push(PropertyRecord::atom(atom, PropertyKind::Radical, value)),
                _ => mark = value.to_string(),
            }
        }

        self.atoms.push(AtomRecord {
            element: element.to_string(),
            isotope: 0,
            charge,
            map: parse_field(map, ln, "atom map")?,
            mark,
            x: parse_field(x, ln, "x coordinate")?,
            y: parse_field(y, ln, "y coordinate")?,
            z: parse_field(z, ln, "z coordinate")?,
        });
        Ok(())
    }

    /// `index type atom1 atom2 [KEY=VALUE...]`
    fn parse_bond(&mut self, fields: &[String], ln: usize) -> MolResult<()> {
        let [_, order, atom1, atom2, pairs @ ..] = fields else {
            return Err(MolError::format(ln, "bond record too short"));
        };

        let mut stereo = 0;
        for pair in pairs {
            match pair.split_once('=') {
                Some((key, cfg)) if key.trim().eq_ignore_ascii_case("CFG") => {
                    stereo = stereo_from_cfg(cfg)
                        .ok_or_else(|| MolError::format(ln, format!("unknown CFG value {:?}", cfg)))?;
                }
                _ => log::debug!("Line {}: ignoring bond field {:?}", ln, pair),
            }
        }

        self.bonds.push(BondRecord {
            atom1: parse_field(atom1, ln, "first bond atom")?,
            atom2: parse_field(atom2, ln, "second bond atom")?,
            order: parse_field(order, ln, "bond type")?,
            stereo,
        });
        Ok(())
    }

    /// `index type extindex ATOMS=(n a1 [a2]) [KEY=VALUE...]`
    fn parse_sgroup(&mut self, fields: &[String], ln: usize) -> MolResult<()> {
        self.sgroups += 1;

        let Some(kind) = fields.get(1) else {
            return Err(MolError::format(ln, "sgroup record too short"));
        };
        if !kind.eq_ignore_ascii_case("DAT") {
            log::debug!("Line {}: ignoring {} sgroup", ln, kind);
            return Ok(());
        }

        let count_field = fields
            .get(3)
            .and_then(|f| f.strip_prefix("ATOMS=("))
            .ok_or_else(|| MolError::format(ln, "data sgroup without ATOMS list"))?;
        let count: usize = parse_field(count_field, ln, "sgroup atom count")?;
        if !(1..=2).contains(&count) {
            log::warn!("Line {}: data sgroup with {} atoms ignored", ln, count);
            return Ok(());
        }

        let anchors = fields
            .get(4..4 + count)
            .ok_or_else(|| MolError::format(ln, "truncated sgroup ATOMS list"))?;
        let atoms = anchors
            .iter()
            .map(|a| parse_field(a.trim_end_matches(')'), ln, "sgroup atom"))
            .collect::<MolResult<Vec<usize>>>()?;

        let mut name = None;
        let mut data = None;
        for pair in &fields[4 + count..] {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key.to_ascii_uppercase().as_str() {
                "FIELDNAME" => name = Some(value.to_lowercase()),
                "FIELDDATA" => data = Some(value.to_lowercase()),
                _ => {}
            }
        }

        match (name, data) {
            (Some(name), Some(data)) => {
                self.props.push(PropertyRecord::new(
                    atoms,
                    PropertyKind::Data(name),
                    data,
                ));
            }
            _ => log::warn!("Line {}: data sgroup without FIELDNAME/FIELDDATA dropped", ln),
        }
        Ok(())
    }
}

impl MolBlockReader for BlockReader {
    fn feed(&mut self, line: &str) -> MolResult<bool> {
        let line = line.trim_end_matches(['\n', '\r']);
        self.line_number += 1;

        match self.state {
            CtabState::BeforeCtab => {
                if line.to_ascii_uppercase().starts_with("M  V30 BEGIN CTAB") {
                    self.state = CtabState::InCtab;
                } else {
                    log::debug!("Line {}: ignoring line before CTAB", self.line_number);
                }
                Ok(false)
            }
            CtabState::InCtab => self.read_ctab_line(line),
            CtabState::AfterCtab | CtabState::Consumed => {
                Err(MolError::protocol("line fed after END CTAB"))
            }
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.state, CtabState::AfterCtab | CtabState::Consumed)
    }

    fn take_draft(&mut self) -> MolResult<MoleculeDraft> {
        match self.state {
            CtabState::AfterCtab => {}
            CtabState::Consumed => return Err(MolError::protocol("molecule already taken")),
            _ => return Err(MolError::Incomplete),
        }
        self.state = CtabState::Consumed;

        MoleculeDraft::new(
            std::mem::take(&mut self.atoms),
            std::mem::take(&mut self.bonds),
            std::mem::take(&mut self.props),
        )
    }
}

/// `M  V30 COUNTS na nb nsg ...`
fn parse_counts(line: &str, ln: usize) -> MolResult<Counts> {
    let mut values = line.get(13..).unwrap_or("").split_whitespace();
    let mut next = |field: &'static str| -> MolResult<usize> {
        let text = values
            .next()
            .ok_or_else(|| MolError::format(ln, format!("COUNTS line without {}", field)))?;
        parse_field(text, ln, field)
    };

    let atoms = next("atom count")?;
    if atoms == 0 {
        return Err(MolError::EmptyMolecule);
    }
    Ok(Counts {
        atoms,
        bonds: next("bond count")?,
        sgroups: next("sgroup count")?,
    })
}

/// Elements of `[A,B,...]`, brackets optional
fn list_items(text: &str) -> Vec<String> {
    text.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_field<T: FromStr>(text: &str, line: usize, field: &'static str) -> MolResult<T> {
    text.trim()
        .parse()
        .map_err(|_| MolError::invalid_number(line, field, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::PropertyValue;

    const COUNTS: &str = "  0  0  0     0  0            999 V3000";

    fn read(body: &str) -> MolResult<MoleculeDraft> {
        BlockReader::new(COUNTS).feed_all(body.lines())
    }

    const ETHANOL: &str = "\
M  V30 BEGIN CTAB
M  V30 COUNTS 3 2 0 0 0
M  V30 BEGIN ATOM
M  V30 1 C -1.27 0.248 0 0
M  V30 2 C 0.139 -0.308 0 2 CHG=1
M  V30 3 O 1.036 0.789 0 0 CHG=-1 ISIDAMARK=5
M  V30 END ATOM
M  V30 BEGIN BOND
M  V30 1 1 1 2
M  V30 2 2 2 3 CFG=2
M  V30 END BOND
M  V30 END CTAB
M  END";

    #[test]
    fn test_read_ethanol() {
        let draft = read(ETHANOL).unwrap();
        assert_eq!(draft.atom_count(), 3);
        assert_eq!(draft.bond_count(), 2);

        assert_eq!(draft.atoms[0].element, "C");
        assert_eq!(draft.atoms[0].mark, "0");
        assert!((draft.atoms[0].x + 1.27).abs() < 1e-9);
        assert_eq!(draft.atoms[1].map, 2);
        assert_eq!(draft.atoms[1].charge, 1);
        assert_eq!(draft.atoms[2].charge, -1);
        assert_eq!(draft.atoms[2].mark, "5");

        assert_eq!(draft.bonds[0], BondRecord::new(1, 2, 1, 0));
        assert_eq!(draft.bonds[1], BondRecord::new(2, 3, 2, 4));
        assert!(draft.extended_properties.is_empty());
    }

    #[test]
    fn test_missing_atom_line() {
        let body = ETHANOL.replace("M  V30 3 O 1.036 0.789 0 0 CHG=-1 ISIDAMARK=5\n", "");
        let err = read(&body).unwrap_err();
        match err {
            MolError::Format { line, message } => {
                assert_eq!(line, 7);
                assert!(message.contains("ATOM"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_bond_count_mismatch() {
        let body = ETHANOL.replace("M  V30 COUNTS 3 2 0 0 0", "M  V30 COUNTS 3 3 0 0 0");
        let err = read(&body).unwrap_err();
        assert!(matches!(err, MolError::Format { ref message, .. } if message.contains("BOND")));
    }

    #[test]
    fn test_zero_atom_counts() {
        let mut reader = BlockReader::new(COUNTS);
        reader.feed("M  V30 BEGIN CTAB").unwrap();
        let err = reader.feed("M  V30 COUNTS 0 0 0 0 0").unwrap_err();
        assert!(matches!(err, MolError::EmptyMolecule));
    }

    #[test]
    fn test_end_ctab_without_atoms() {
        let mut reader = BlockReader::new(COUNTS);
        reader.feed("M  V30 BEGIN CTAB").unwrap();
        let err = reader.feed("M  V30 END CTAB").unwrap_err();
        assert!(matches!(err, MolError::EmptyMolecule));
    }

    #[test]
    fn test_counts_required_and_unique() {
        let mut reader = BlockReader::new(COUNTS);
        reader.feed("M  V30 BEGIN CTAB").unwrap();
        assert!(!reader.feed("").unwrap());
        match reader.feed("M  V30 BEGIN ATOM").unwrap_err() {
            MolError::Format { line, message } => {
                assert_eq!(line, 4);
                assert!(message.contains("COUNTS"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let mut reader = BlockReader::new(COUNTS);
        reader.feed("M  V30 BEGIN CTAB").unwrap();
        reader.feed("M  V30 COUNTS 1 0 0 0 0").unwrap();
        reader.feed("M  V30 BEGIN ATOM").unwrap();
        assert!(matches!(
            reader.feed("M  V30 COUNTS 1 0 0 0 0"),
            Err(MolError::Format { .. })
        ));
    }

    #[test]
    fn test_case_insensitive_markers() {
        let body = "\
m  v30 begin ctab
M  V30 counts 1 0 0 0 0
M  V30 begin atom
M  V30 1 N 0 0 0 0
M  V30 end atom
M  V30 end ctab";
        let draft = read(body).unwrap();
        assert_eq!(draft.atoms[0].element, "N");
    }

    #[test]
    fn test_atom_lists_and_properties() {
        let body = "\
M  V30 BEGIN CTAB
M  V30 COUNTS 3 0 0 0 0
M  V30 BEGIN ATOM
M  V30 1 [N,O,S] 0 0 0 0
M  V30 2 \"NOT [Cl,Br]\" 1 0 0 0
M  V30 3 C 2 0 0 0 MASS=13 RAD=2 UNKNOWN=1
M  V30 END ATOM
M  V30 END CTAB";
        let draft = read(body).unwrap();
        assert_eq!(draft.atoms[0].element, "L");
        assert_eq!(draft.atoms[1].element, "L");
        assert_eq!(draft.atoms[2].isotope, 0);

        let props = &draft.extended_properties;
        assert_eq!(props.len(), 4);
        assert_eq!(props[0].kind, PropertyKind::AtomList);
        assert_eq!(props[0].value.items(), ["N", "O", "S"]);
        assert_eq!(props[1].kind, PropertyKind::AtomNotList);
        assert_eq!(props[1].atoms.as_slice(), &[2]);
        assert_eq!(props[1].value.items(), ["Cl", "Br"]);
        assert_eq!(props[2], PropertyRecord::atom(3, PropertyKind::Isotope, "13"));
        assert_eq!(props[3], PropertyRecord::atom(3, PropertyKind::Radical, "2"));
    }

    #[test]
    fn test_not_list_prefix_any_case() {
        let body = "\
M  V30 BEGIN CTAB
M  V30 COUNTS 3 0 0 0 0
M  V30 BEGIN ATOM
M  V30 1 \"not [N]\" 0 0 0 0
M  V30 2 \"Not [O,S]\" 1 0 0 0
M  V30 3 NOT[P] 2 0 0 0
M  V30 END ATOM
M  V30 END CTAB";
        let draft = read(body).unwrap();
        assert!(draft.atoms.iter().all(|atom| atom.element == "L"));

        let props = &draft.extended_properties;
        assert_eq!(props.len(), 3);
        assert!(props.iter().all(|p| p.kind == PropertyKind::AtomNotList));
        assert_eq!(props[0].value.items(), ["N"]);
        assert_eq!(props[1].value.items(), ["O", "S"]);
        assert_eq!(props[2].atoms.as_slice(), &[3]);
        assert_eq!(props[2].value.items(), ["P"]);
    }

    #[test]
    fn test_empty_key_value() {
        let body = "\
M  V30 BEGIN CTAB
M  V30 COUNTS 1 0 0 0 0
M  V30 BEGIN ATOM
M  V30 1 C 0 0 0 0 CHG=
M  V30 END ATOM
M  V30 END CTAB";
        assert!(matches!(read(body), Err(MolError::Format { line: 5, .. })));
    }

    #[test]
    fn test_unknown_cfg() {
        let body = "\
M  V30 BEGIN CTAB
M  V30 COUNTS 2 1 0 0 0
M  V30 BEGIN ATOM
M  V30 1 C 0 0 0 0
M  V30 2 C 1 0 0 0
M  V30 END ATOM
M  V30 BEGIN BOND
M  V30 1 1 1 2 CFG=9
M  V30 END BOND
M  V30 END CTAB";
        assert!(matches!(read(body), Err(MolError::Format { line: 9, .. })));
    }

    #[test]
    fn test_data_sgroups() {
        let body = "\
M  V30 BEGIN CTAB
M  V30 COUNTS 2 1 4 0 0
M  V30 BEGIN ATOM
M  V30 1 C 0 0 0 0
M  V30 2 C 1 0 0 0
M  V30 END ATOM
M  V30 BEGIN BOND
M  V30 1 1 1 2
M  V30 END BOND
M  V30 BEGIN SGROUP
M  V30 1 DAT 0 ATOMS=(2 1 2) FIELDNAME=DynBond -
M  V30 FIELDDATA=1>2
M  V30 2 DAT 0 ATOMS=(1 1) \"FIELDNAME=Some Name\" \"FIELDDATA=X Y\"
M  V30 3 SUP 0 ATOMS=(1 2) LABEL=Ph
M  V30 4 DAT 0 ATOMS=(1 2) FIELDNAME=lonely
M  V30 END SGROUP
M  V30 END CTAB";
        let draft = read(body).unwrap();
        let props = &draft.extended_properties;
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].atoms.as_slice(), &[1, 2]);
        assert_eq!(props[0].kind, PropertyKind::Data("dynbond".to_string()));
        assert_eq!(props[0].value, PropertyValue::Single("1>2".to_string()));
        assert_eq!(props[1].atoms.as_slice(), &[1]);
        assert_eq!(props[1].kind.as_str(), "some name");
        assert_eq!(props[1].value.as_single(), Some("x y"));
    }

    #[test]
    fn test_data_values_keep_quotes_and_names() {
        let body = "\
M  V30 BEGIN CTAB
M  V30 COUNTS 1 0 2 0 0
M  V30 BEGIN ATOM
M  V30 1 C 0 0 0 0
M  V30 END ATOM
M  V30 BEGIN SGROUP
M  V30 1 DAT 0 ATOMS=(1 1) FIELDNAME=len FIELDDATA=5\"
M  V30 2 DAT 0 ATOMS=(1 1) FIELDNAME=Isotope FIELDDATA=13
M  V30 END SGROUP
M  V30 END CTAB";
        let draft = read(body).unwrap();
        let props = &draft.extended_properties;
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].value.as_single(), Some("5\""));
        assert_eq!(props[1].kind, PropertyKind::Data("isotope".to_string()));
        assert!(!props[1].kind.is_atom_level());
    }

    #[test]
    fn test_sgroup_count_mismatch() {
        let body = "\
M  V30 BEGIN CTAB
M  V30 COUNTS 1 0 2 0 0
M  V30 BEGIN ATOM
M  V30 1 C 0 0 0 0
M  V30 END ATOM
M  V30 BEGIN SGROUP
M  V30 1 DAT 0 ATOMS=(1 1) FIELDNAME=a FIELDDATA=b
M  V30 END SGROUP
M  V30 END CTAB";
        assert!(matches!(
            read(body),
            Err(MolError::Format { ref message, .. }) if message.contains("SGROUP")
        ));
    }

    #[test]
    fn test_other_blocks_ignored() {
        let body = "\
M  V30 BEGIN CTAB
M  V30 COUNTS 1 0 0 0 0
M  V30 BEGIN ATOM
M  V30 1 C 0 0 0 0
M  V30 END ATOM
M  V30 BEGIN COLLECTION
M  V30 MDLV30/STEABS ATOMS=(1 1)
M  V30 END COLLECTION
M  V30 END CTAB";
        assert_eq!(read(body).unwrap().atom_count(), 1);
    }

    #[test]
    fn test_protocol() {
        let mut reader = BlockReader::new(COUNTS);
        assert!(matches!(reader.take_draft(), Err(MolError::Incomplete)));
        for line in ETHANOL.lines().take(11) {
            assert!(!reader.feed(line).unwrap());
        }
        assert!(matches!(reader.take_draft(), Err(MolError::Incomplete)));
        assert!(reader.feed("M  V30 END CTAB").unwrap());
        assert!(reader.is_complete());
        assert!(matches!(reader.feed("M  END"), Err(MolError::Protocol(_))));
        assert!(reader.take_draft().is_ok());
        assert!(matches!(reader.take_draft(), Err(MolError::Protocol(_))));
    }
}
