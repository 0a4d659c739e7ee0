//! Stateless item parser: free-form utterance in, structured item fields out.
//!
//! The pipeline normalizes the text, sets the accumulate/update flags, runs the
//! tier-one patterns and falls back to a left-to-right token scan when the
//! patterns leave a slot empty. Parsing never fails; the worst case is an empty
//! result with [`Confidence::None`].

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_ITEM_QUANTITY;
use crate::domain::unit::Unit;
use crate::vocabulary::{is_known_item, is_stop_word, TokenSet, ACCUMULATE_WORDS, UPDATE_FLAG_WORDS};

const NUMBER_WORDS: &[(&str, &str)] = &[
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("ten", "10"),
    ("half", "0.5"),
    ("quarter", "0.25"),
];

// A sign or leading point belongs to the number so the range clamp sees the real value.
const QUANTITY: &str = r"(?P<qty>-?(?:\d+(?:\.\d+)?|\.\d+))";
const NAME: &str = r"(?P<name>[a-z]+)";

/// Tier-one patterns in priority order: the first one that fills a quantity wins.
static TIER_ONE_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    let units = Unit::spellings_longest_first().join("|");
    let unit = format!(r"(?P<unit>{units})\b");

    [
        format!(r"{QUANTITY}\s*{unit}\s+(?:of\s+)?{NAME}"),
        format!(r"{NAME}\s+{QUANTITY}\s*{unit}"),
        format!(r"{QUANTITY}\s*{unit}"),
        format!(r"{NAME}\s+{QUANTITY}\b"),
    ]
    .map(|source| Regex::new(&source).expect("tier-one pattern is built from fixed tables"))
});

static NUMBER_WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let words = NUMBER_WORDS.iter().map(|(word, _)| *word).collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"\b(?:{words})\b")).expect("number-word pattern is built from fixed tables")
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    None,
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<Unit>,
    pub is_accumulate: bool,
    pub is_update: bool,
    pub confidence: Confidence,
}

impl ParseResult {
    pub fn has_any(&self) -> bool {
        self.name.is_some() || self.quantity.is_some() || self.unit.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.quantity.is_some() && self.unit.is_some()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ItemParser {
    max_quantity: f64,
}

impl Default for ItemParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEM_QUANTITY)
    }
}

impl ItemParser {
    pub fn new(max_quantity: f64) -> Self {
        Self { max_quantity }
    }

    pub fn parse(&self, raw_text: &str) -> ParseResult {
        if raw_text.trim().is_empty() {
            return ParseResult::default();
        }

        let text = self.normalize(raw_text);
        let tokens = TokenSet::new(&text);
        let mut result = ParseResult {
            is_accumulate: tokens.intersects(ACCUMULATE_WORDS),
            is_update: tokens.intersects(UPDATE_FLAG_WORDS),
            ..ParseResult::default()
        };

        match_patterns(&text, &mut result);
        if !result.is_complete() {
            scan_tokens(&text, &mut result);
        }

        assign_confidence(&mut result);
        self.clamp_quantity(&mut result);
        result
    }

    /// Lowercases, collapses whitespace and spells out small number words as digits.
    pub fn normalize(&self, raw_text: &str) -> String {
        let collapsed = raw_text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
        NUMBER_WORD_PATTERN
            .replace_all(&collapsed, |captures: &Captures<'_>| {
                let word = &captures[0];
                NUMBER_WORDS
                    .iter()
                    .find(|(candidate, _)| *candidate == word)
                    .map(|(_, digits)| (*digits).to_string())
                    .unwrap_or_else(|| word.to_string())
            })
            .into_owned()
    }

    fn clamp_quantity(&self, result: &mut ParseResult) {
        let Some(quantity) = result.quantity else {
            return;
        };
        if quantity <= 0.0 || quantity > self.max_quantity {
            result.quantity = None;
            if result.confidence == Confidence::High {
                result.confidence = Confidence::Medium;
            }
        }
    }
}

fn match_patterns(text: &str, result: &mut ParseResult) {
    for pattern in TIER_ONE_PATTERNS.iter() {
        let Some(captures) = pattern.captures(text) else {
            continue;
        };

        if result.quantity.is_none() {
            result.quantity = captures.name("qty").and_then(|m| parse_number(m.as_str()));
        }
        if result.unit.is_none() {
            result.unit = captures.name("unit").and_then(|m| Unit::from_spelling(m.as_str()));
        }
        if result.name.is_none() {
            result.name = captures
                .name("name")
                .map(|m| m.as_str())
                .filter(|candidate| is_valid_name(candidate))
                .map(str::to_string);
        }

        if result.quantity.is_some() {
            break;
        }
    }
}

fn scan_tokens(text: &str, result: &mut ParseResult) {
    for token in text.split_whitespace() {
        if result.quantity.is_none() {
            if let Some(quantity) = parse_number(token) {
                result.quantity = Some(quantity);
                continue;
            }
        }

        if result.unit.is_none() {
            if let Some(unit) = Unit::from_spelling(token) {
                result.unit = Some(unit);
                continue;
            }
        }

        if result.name.is_none() && is_valid_name(token) {
            result.name = Some(token.to_string());
        }
    }
}

fn assign_confidence(result: &mut ParseResult) {
    let known_name = result.name.as_deref().map(is_known_item).unwrap_or(false);

    result.confidence = if result.is_complete() {
        if known_name {
            Confidence::High
        } else {
            Confidence::Medium
        }
    } else if result.has_any() {
        let name_only = result.name.is_some() && result.quantity.is_none() && result.unit.is_none();
        if name_only && !known_name {
            // A lone unknown noun is not ordering intent.
            result.name = None;
            Confidence::None
        } else if result.name.is_some() || result.quantity.is_some() {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    } else {
        Confidence::None
    };
}

/// Whether a single lowercase word may be used as an item name.
pub fn is_valid_name(word: &str) -> bool {
    word.chars().count() >= 3
        && !is_stop_word(word)
        && !Unit::is_spelling(word)
        && word.parse::<f64>().is_err()
        && word.chars().all(char::is_alphabetic)
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use crate::domain::unit::Unit;
    use crate::parser::{is_valid_name, Confidence, ItemParser};

    fn parser() -> ItemParser {
        ItemParser::default()
    }

    #[test]
    fn quantity_unit_name_order() {
        let result = parser().parse("5 kg rice");
        assert_eq!(result.name.as_deref(), Some("rice"));
        assert_eq!(result.quantity, Some(5.0));
        assert_eq!(result.unit, Some(Unit::Kg));
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn name_quantity_unit_order() {
        let result = parser().parse("rice 5 kg");
        assert_eq!(result.name.as_deref(), Some("rice"));
        assert_eq!(result.quantity, Some(5.0));
        assert_eq!(result.unit, Some(Unit::Kg));
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn long_unit_spellings_win_over_prefixes() {
        let result = parser().parse("Add 2 kilograms of Sugar");
        assert_eq!(result.quantity, Some(2.0));
        assert_eq!(result.unit, Some(Unit::Kg));
        assert_eq!(result.name.as_deref(), Some("sugar"));

        let result = parser().parse("3 litres oil");
        assert_eq!(result.unit, Some(Unit::Litre));
        assert_eq!(result.name.as_deref(), Some("oil"));
    }

    #[test]
    fn glued_quantity_and_unit() {
        let result = parser().parse("2.5kg   dal");
        assert_eq!(result.quantity, Some(2.5));
        assert_eq!(result.unit, Some(Unit::Kg));
        assert_eq!(result.name.as_deref(), Some("dal"));
    }

    #[test]
    fn leading_decimal_point_is_part_of_the_quantity() {
        let result = parser().parse("add .5 kg rice");
        assert_eq!(result.quantity, Some(0.5));
        assert_eq!(result.unit, Some(Unit::Kg));
        assert_eq!(result.name.as_deref(), Some("rice"));
    }

    #[test]
    fn spelled_numbers_are_substituted() {
        let parser = parser();
        assert_eq!(parser.normalize("  Two   KG of  rice "), "2 kg of rice");
        assert_eq!(parser.normalize("someone"), "someone");

        let result = parser.parse("half kg ghee");
        assert_eq!(result.quantity, Some(0.5));
        assert_eq!(result.unit, Some(Unit::Kg));
        assert_eq!(result.name.as_deref(), Some("ghee"));
    }

    #[test]
    fn quantity_and_unit_alone_leave_name_empty() {
        let result = parser().parse("5 kg");
        assert_eq!(result.name, None);
        assert_eq!(result.quantity, Some(5.0));
        assert_eq!(result.unit, Some(Unit::Kg));
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn name_and_quantity_leave_unit_empty() {
        let result = parser().parse("rice 5");
        assert_eq!(result.name.as_deref(), Some("rice"));
        assert_eq!(result.quantity, Some(5.0));
        assert_eq!(result.unit, None);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn unit_must_end_on_a_word_boundary() {
        let result = parser().parse("5 grapes");
        assert_eq!(result.unit, None);
        assert_eq!(result.quantity, Some(5.0));
        assert_eq!(result.name.as_deref(), Some("grapes"));
    }

    #[test]
    fn token_scan_fills_remaining_slots() {
        let result = parser().parse("i need sugar packet 3");
        assert_eq!(result.name.as_deref(), Some("sugar"));
        assert_eq!(result.quantity, Some(3.0));
        assert_eq!(result.unit, Some(Unit::Packet));
    }

    #[test]
    fn known_name_alone_is_kept() {
        let result = parser().parse("rice");
        assert_eq!(result.name.as_deref(), Some("rice"));
        assert_eq!(result.quantity, None);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn unknown_name_alone_is_discarded() {
        let result = parser().parse("beautiful");
        assert_eq!(result.name, None);
        assert_eq!(result.confidence, Confidence::None);
        assert!(!result.has_any());
    }

    #[test]
    fn unknown_name_with_full_details_is_medium() {
        let result = parser().parse("4 packets biscuits");
        assert_eq!(result.name.as_deref(), Some("biscuits"));
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn unit_only_is_low_confidence() {
        let result = parser().parse("kg");
        assert_eq!(result.unit, Some(Unit::Kg));
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn out_of_range_quantities_are_discarded_from_every_tier() {
        let parser = parser();

        let from_patterns = parser.parse("10000 kg rice");
        assert_eq!(from_patterns.quantity, None);
        assert_eq!(from_patterns.name.as_deref(), Some("rice"));
        assert_eq!(from_patterns.confidence, Confidence::Medium);

        let zero = parser.parse("0 kg rice");
        assert_eq!(zero.quantity, None);

        let negative = parser.parse("sugar -3");
        assert_eq!(negative.quantity, None);
        assert_eq!(negative.name.as_deref(), Some("sugar"));

        let negative_with_unit = parser.parse("-2 kg rice");
        assert_eq!(negative_with_unit.quantity, None);
        assert_eq!(negative_with_unit.unit, Some(Unit::Kg));

        let boundary = parser.parse("9999 kg rice");
        assert_eq!(boundary.quantity, Some(9999.0));
        assert_eq!(boundary.confidence, Confidence::High);
    }

    #[test]
    fn configured_maximum_is_respected() {
        let result = ItemParser::new(10.0).parse("11 kg rice");
        assert_eq!(result.quantity, None);
    }

    #[test]
    fn flags_come_from_whole_tokens() {
        let parser = parser();
        assert!(parser.parse("add 2 kg more rice").is_accumulate);
        assert!(parser.parse("change rice to 3 kg").is_update);
        assert!(!parser.parse("moreover rice").is_accumulate);
    }

    #[test]
    fn command_verbs_never_become_names() {
        let result = parser().parse("remove rice");
        assert_eq!(result.name.as_deref(), Some("rice"));

        let result = parser().parse("change dal to 3 kg");
        assert_eq!(result.name.as_deref(), Some("dal"));
        assert_eq!(result.quantity, Some(3.0));
        assert_eq!(result.unit, Some(Unit::Kg));
        assert!(result.is_update);
    }

    #[test]
    fn blank_input_is_empty() {
        let result = parser().parse("   ");
        assert!(!result.has_any());
        assert_eq!(result.confidence, Confidence::None);
    }

    #[test]
    fn name_validity_rules() {
        assert!(is_valid_name("rice"));
        assert!(!is_valid_name("ab"));
        assert!(!is_valid_name("the"));
        assert!(!is_valid_name("kilos"));
        assert!(!is_valid_name("nan"));
        assert!(!is_valid_name("rice2"));
    }
}
