//! Closed word sets used by the item parser and the intent classifier.
//!
//! All matching is lexical: utterances are lowercased, split on whitespace and
//! intersected with these sets. No stemming, no fuzzy matching.

use std::collections::BTreeSet;

pub const KNOWN_ITEMS: &[&str] = &[
    "rice", "wheat", "sugar", "oil", "dal", "flour", "salt", "atta", "maida", "sooji", "poha",
    "tea", "coffee", "milk", "ghee", "butter", "bread", "ragi", "bajra", "jowar", "besan",
    "semolina", "suji", "mustard", "cumin", "turmeric", "chilli", "pepper", "onion", "potato",
    "tomato", "garlic", "ginger", "carrot", "cabbage", "brinjal", "spinach", "peas", "lemon",
    "coconut", "groundnut", "soya", "corn",
];

/// Words that can never be an item name. Includes the command verbs so that
/// "remove rice" or "change dal to 2 kg" surface the item rather than the verb.
pub const STOP_WORDS: &[&str] = &[
    "add", "put", "want", "i", "need", "of", "the", "a", "an", "please", "some", "more", "to",
    "and", "give", "me", "get", "would", "like", "could", "can", "also", "another", "few",
    "much", "many", "my", "your", "our", "this", "that", "it", "for", "with", "from", "in", "on",
    "at", "by", "about", "order", "buy", "purchase", "take", "bring", "send", "require", "have",
    "got", "man", "bro", "sir", "madam", "hey", "sup", "yo", "aight", "nah", "yep", "hmm",
    "okay", "ok", "oh", "ah", "uh", "um", "right", "sure", "well", "just", "now", "then",
    "here", "there", "let", "say", "tell", "know", "think", "said", "nothing", "something",
    "everything", "anything", "wrong", "reply", "properly", "what", "how", "when", "where",
    "why", "who", "which", "up", "down", "out", "off", "over", "under", "back", "remove",
    "delete", "drop", "change", "update", "modify", "replace", "edit", "fix", "set", "correct",
    "show", "list", "display", "cart", "confirm", "place", "finalize", "submit", "complete",
    "extra", "additional", "again", "yes", "yeah", "not", "instead", "make",
];

pub const AFFIRM_WORDS: &[&str] = &[
    "yes", "yeah", "yep", "yup", "correct", "right", "ok", "okay", "sure", "confirm",
    "absolutely", "definitely", "fine", "agreed", "proceed", "haan", "bilkul",
];

pub const DENY_WORDS: &[&str] = &[
    "no", "nope", "nah", "cancel", "wrong", "incorrect", "dont", "not", "stop", "wait", "hold",
    "different", "mistake", "error", "nahi",
];

/// "Add more of an existing item" markers.
pub const ACCUMULATE_WORDS: &[&str] = &["more", "extra", "additional", "another", "again"];

/// Markers that flag a parse as replacing an existing cart value.
pub const UPDATE_FLAG_WORDS: &[&str] =
    &["change", "update", "modify", "replace", "set", "correct", "edit"];

pub const EXIT_WORDS: &[&str] = &["bye", "goodbye", "exit", "quit", "finish", "done"];

pub const SHOW_CART_WORDS: &[&str] = &["show", "cart", "list", "display", "review", "summary"];

pub const CONFIRM_ORDER_WORDS: &[&str] = &["confirm", "place", "finalize", "submit", "complete"];

/// Classifier-level update vocabulary; wider than [`UPDATE_FLAG_WORDS`].
pub const UPDATE_WORDS: &[&str] =
    &["change", "update", "modify", "replace", "correct", "edit", "fix", "set"];

pub const REMOVE_WORDS: &[&str] = &["remove", "delete", "drop"];

pub const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "heya", "hiya"];

pub const ACKNOWLEDGEMENT_WORDS: &[&str] = &[
    "okay", "ok", "alright", "great", "fine", "cool", "sure", "thanks", "thank", "nice", "good",
    "perfect", "wonderful", "aight", "gotcha", "noted", "understood",
];

/// Idle-phase replies that close a thread without asking for anything.
pub const DEAD_END_WORDS: &[&str] = &[
    "no", "nope", "nah", "nothing", "nevermind", "never", "mind", "forget", "leave", "drop",
    "skip", "ignore",
];

pub fn is_known_item(word: &str) -> bool {
    KNOWN_ITEMS.contains(&word)
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Whitespace-token set of an utterance, for vocabulary intersection tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenSet<'a> {
    tokens: BTreeSet<&'a str>,
    count: usize,
}

impl<'a> TokenSet<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut tokens = BTreeSet::new();
        let mut count = 0;
        for token in text.split_whitespace() {
            tokens.insert(token);
            count += 1;
        }
        Self { tokens, count }
    }

    pub fn intersects(&self, words: &[&str]) -> bool {
        words.iter().any(|word| self.tokens.contains(word))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.tokens.contains(word)
    }

    pub fn iter(&self) -> impl Iterator<Item = &&'a str> {
        self.tokens.iter()
    }

    /// Number of tokens in the utterance, counting repeats.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{is_known_item, is_stop_word, TokenSet, ACCUMULATE_WORDS, EXIT_WORDS};

    #[test]
    fn token_set_matches_whole_words_only() {
        let tokens = TokenSet::new("add some moreover rice");
        assert!(!tokens.intersects(ACCUMULATE_WORDS));

        let tokens = TokenSet::new("add more rice");
        assert!(tokens.intersects(ACCUMULATE_WORDS));
    }

    #[test]
    fn token_count_includes_repeats() {
        let tokens = TokenSet::new("hi hi hi there");
        assert_eq!(tokens.len(), 4);
        assert!(!tokens.intersects(EXIT_WORDS));
    }

    #[test]
    fn command_verbs_are_stop_words_but_items_are_not() {
        assert!(is_stop_word("remove"));
        assert!(is_stop_word("change"));
        assert!(!is_stop_word("rice"));
        assert!(is_known_item("rice"));
        assert!(!is_known_item("caviar"));
    }
}
