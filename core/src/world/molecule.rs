use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits reserved for the signed payload of a packed cell word.
pub const VALUE_BITS: u32 = 56;
/// Bit position of the type tag inside a packed cell word.
pub const TYPE_SHIFT: u32 = VALUE_BITS;
/// Mask selecting the payload bits of a packed cell word.
pub const VALUE_MASK: i64 = (1 << VALUE_BITS) - 1;
/// Smallest payload representable in a packed word.
pub const VALUE_MIN: i64 = -(1 << (VALUE_BITS - 1));
/// Largest payload representable in a packed word.
pub const VALUE_MAX: i64 = (1 << (VALUE_BITS - 1)) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoleculeKind {
    Code,
    Data,
    Energy,
    Structure,
}

impl MoleculeKind {
    pub fn tag(self) -> u8 {
        match self {
            MoleculeKind::Code => 0,
            MoleculeKind::Data => 1,
            MoleculeKind::Energy => 2,
            MoleculeKind::Structure => 3,
        }
    }

    /// Tags outside the known range decode as STRUCTURE so that garbage
    /// words read as impassable rather than executable.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => MoleculeKind::Code,
            1 => MoleculeKind::Data,
            2 => MoleculeKind::Energy,
            _ => MoleculeKind::Structure,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MoleculeKind::Code => "CODE",
            MoleculeKind::Data => "DATA",
            MoleculeKind::Energy => "ENERGY",
            MoleculeKind::Structure => "STRUCTURE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("CODE") {
            Some(MoleculeKind::Code)
        } else if s.eq_ignore_ascii_case("DATA") {
            Some(MoleculeKind::Data)
        } else if s.eq_ignore_ascii_case("ENERGY") {
            Some(MoleculeKind::Energy)
        } else if s.eq_ignore_ascii_case("STRUCTURE") {
            Some(MoleculeKind::Structure)
        } else {
            None
        }
    }
}

/// A typed cell value: kind tag plus a signed scalar payload, packed into a
/// single `i64` machine word. The all-zero word is the empty CODE cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Molecule {
    pub kind: MoleculeKind,
    pub value: i64,
}

impl Molecule {
    pub const EMPTY: Molecule = Molecule {
        kind: MoleculeKind::Code,
        value: 0,
    };

    pub fn new(kind: MoleculeKind, value: i64) -> Self {
        Self { kind, value }
    }

    pub fn code(value: i64) -> Self {
        Self::new(MoleculeKind::Code, value)
    }

    pub fn data(value: i64) -> Self {
        Self::new(MoleculeKind::Data, value)
    }

    pub fn energy(value: i64) -> Self {
        Self::new(MoleculeKind::Energy, value)
    }

    pub fn structure(value: i64) -> Self {
        Self::new(MoleculeKind::Structure, value)
    }

    pub fn to_word(self) -> i64 {
        ((self.kind.tag() as i64) << TYPE_SHIFT) | (self.value & VALUE_MASK)
    }

    pub fn from_word(word: i64) -> Self {
        let bits = word as u64;
        let kind = MoleculeKind::from_tag((bits >> TYPE_SHIFT) as u8);
        // Sign-extend the payload from VALUE_BITS.
        let value = ((bits << (64 - VALUE_BITS)) as i64) >> (64 - VALUE_BITS);
        Self { kind, value }
    }

    pub fn is_empty(self) -> bool {
        self.kind == MoleculeKind::Code && self.value == 0
    }
}

impl Default for Molecule {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.name(), self.value)
    }
}
