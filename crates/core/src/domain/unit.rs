use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical measurement unit for a cart line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Kg,
    G,
    Litre,
    Ml,
    Packet,
    Piece,
    Barrel,
    Dozen,
    Box,
    Bottle,
    Tin,
    Bag,
}

/// Every accepted spelling and the unit it canonicalizes to.
pub const UNIT_SPELLINGS: &[(&str, Unit)] = &[
    ("kg", Unit::Kg),
    ("kilo", Unit::Kg),
    ("kilos", Unit::Kg),
    ("kilogram", Unit::Kg),
    ("kilograms", Unit::Kg),
    ("g", Unit::G),
    ("gram", Unit::G),
    ("grams", Unit::G),
    ("litre", Unit::Litre),
    ("litres", Unit::Litre),
    ("liter", Unit::Litre),
    ("liters", Unit::Litre),
    ("l", Unit::Litre),
    ("ltr", Unit::Litre),
    ("ltrs", Unit::Litre),
    ("ml", Unit::Ml),
    ("millilitre", Unit::Ml),
    ("milliliter", Unit::Ml),
    ("packet", Unit::Packet),
    ("packets", Unit::Packet),
    ("pack", Unit::Packet),
    ("pkt", Unit::Packet),
    ("pkts", Unit::Packet),
    ("piece", Unit::Piece),
    ("pieces", Unit::Piece),
    ("pcs", Unit::Piece),
    ("pc", Unit::Piece),
    ("barrel", Unit::Barrel),
    ("barrels", Unit::Barrel),
    ("dozen", Unit::Dozen),
    ("box", Unit::Box),
    ("boxes", Unit::Box),
    ("bottle", Unit::Bottle),
    ("bottles", Unit::Bottle),
    ("tin", Unit::Tin),
    ("tins", Unit::Tin),
    ("bag", Unit::Bag),
    ("bags", Unit::Bag),
    ("sack", Unit::Bag),
    ("sacks", Unit::Bag),
];

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::G => "g",
            Self::Litre => "litre",
            Self::Ml => "ml",
            Self::Packet => "packet",
            Self::Piece => "piece",
            Self::Barrel => "barrel",
            Self::Dozen => "dozen",
            Self::Box => "box",
            Self::Bottle => "bottle",
            Self::Tin => "tin",
            Self::Bag => "bag",
        }
    }

    /// Resolves an exact (already lowercased) spelling.
    pub fn from_spelling(spelling: &str) -> Option<Self> {
        UNIT_SPELLINGS.iter().find(|(candidate, _)| *candidate == spelling).map(|(_, unit)| *unit)
    }

    pub fn is_spelling(word: &str) -> bool {
        Self::from_spelling(word).is_some()
    }

    /// All spellings ordered longest-first, so that an alternation built from them
    /// prefers `kilograms` over `kg` and `litres` over `l`.
    pub fn spellings_longest_first() -> Vec<&'static str> {
        let mut spellings = UNIT_SPELLINGS.iter().map(|(spelling, _)| *spelling).collect::<Vec<_>>();
        spellings.sort_by(|left, right| right.len().cmp(&left.len()).then(left.cmp(right)));
        spellings
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
