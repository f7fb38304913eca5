//! Intent lexicon - fuzzy matching of free text against example phrases

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::application::errors::ConfigError;

/// Reserved intent returned when nothing matches
pub const UNKNOWN_INTENT: &str = "unknown_intent";

/// Reserved intent answered when a conversation is cancelled
pub const CANCEL_CONVERSATION: &str = "cancel_conversation";

/// Examples must score strictly below this normalized distance
pub const MATCH_THRESHOLD: f64 = 0.4;

const DEFAULT_UNKNOWN_RESPONSE: &str = "Sorry, I don't understand you.";
const DEFAULT_CANCEL_RESPONSE: &str = "Okay, let's stop here.";

/// A named intent with example phrases and candidate responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentEntry {
    pub name: String,
    pub examples: Vec<String>,
    pub responses: Vec<String>,
}

impl IntentEntry {
    pub fn new<E, R>(name: impl Into<String>, examples: E, responses: R) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            name: name.into(),
            examples: examples.into_iter().map(Into::into).collect(),
            responses: responses.into_iter().map(Into::into).collect(),
        }
    }
}

/// Lower-case, drop everything but word characters and whitespace, collapse whitespace
pub fn normalize(text: &str) -> String {
    let kept: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein distance over the longer string's length, in chars. Two empty strings score 0.
pub fn normalized_distance(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    strsim::levenshtein(a, b) as f64 / longest as f64
}

pub fn is_match(distance: f64) -> bool {
    distance < MATCH_THRESHOLD
}

struct Intent {
    entry: IntentEntry,
    normalized_examples: Vec<String>,
}

/// Read-only after construction, apart from the response RNG
pub struct IntentLexicon {
    intents: Vec<Intent>,
    rng: Mutex<StdRng>,
}

impl IntentLexicon {
    /// Intents are matched in the order given
    pub fn new(intents: Vec<IntentEntry>) -> Result<Self, ConfigError> {
        Self::with_rng(intents, StdRng::from_entropy())
    }

    /// Deterministic response selection
    pub fn with_seed(intents: Vec<IntentEntry>, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(intents, StdRng::seed_from_u64(seed))
    }

    fn with_rng(intents: Vec<IntentEntry>, rng: StdRng) -> Result<Self, ConfigError> {
        let intents = intents
            .into_iter()
            .map(|entry| {
                if entry.responses.is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "intent '{}' has no responses",
                        entry.name
                    )));
                }
                let normalized_examples = entry.examples.iter().map(|e| normalize(e)).collect();
                Ok(Intent {
                    entry,
                    normalized_examples,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Lexicon loaded with {} intents", intents.len());
        Ok(Self {
            intents,
            rng: Mutex::new(rng),
        })
    }

    /// First intent, in configured order, with any example close enough to `text`
    pub fn resolve_intent(&self, text: &str) -> &str {
        let cleaned = normalize(text);
        self.intents
            .iter()
            .find(|intent| {
                intent
                    .normalized_examples
                    .iter()
                    .any(|example| is_match(normalized_distance(example, &cleaned)))
            })
            .map(|intent| intent.entry.name.as_str())
            .unwrap_or(UNKNOWN_INTENT)
    }

    pub fn get_response(&self, text: &str) -> String {
        let intent = self.resolve_intent(text);
        tracing::debug!("Resolved intent '{}'", intent);
        self.get_response_by_intent(intent)
    }

    /// Random response of a named intent, with built-in defaults for the reserved ones
    pub fn get_response_by_intent(&self, intent: &str) -> String {
        if let Some(found) = self.find(intent) {
            return self.pick(&found.entry.responses);
        }
        match intent {
            CANCEL_CONVERSATION => DEFAULT_CANCEL_RESPONSE.to_string(),
            UNKNOWN_INTENT => DEFAULT_UNKNOWN_RESPONSE.to_string(),
            other => {
                tracing::warn!("Intent '{}' is not configured", other);
                self.get_response_by_intent(UNKNOWN_INTENT)
            }
        }
    }

    pub fn intent_names(&self) -> impl Iterator<Item = &str> {
        self.intents.iter().map(|intent| intent.entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    fn find(&self, name: &str) -> Option<&Intent> {
        self.intents.iter().find(|intent| intent.entry.name == name)
    }

    fn pick(&self, responses: &[String]) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        responses.choose(&mut *rng).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting() -> IntentEntry {
        IntentEntry::new("greeting", ["hello", "good morning"], ["hi there"])
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello,   World!! "), "hello world");
        assert_eq!(normalize("what's\tup?\n"), "whats up");
        assert_eq!(normalize("snake_case stays"), "snake_case stays");
        assert_eq!(normalize("Привет, МИР"), "привет мир");
        assert_eq!(normalize("?!..."), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for text in ["  Hello,   World!! ", "ÀÉÎ õü -- ok", "tabs\tand\nnewlines", "", "İstanbul"] {
            let once = normalize(text);
            assert_eq!(normalize(&once), once, "input: {:?}", text);
        }
    }

    #[test]
    fn test_distance() {
        assert_eq!(normalized_distance("hello", "helo"), 0.2);
        assert_eq!(normalized_distance("", ""), 0.0);
        assert_eq!(normalized_distance("abc", ""), 1.0);
        assert_eq!(normalized_distance("мир", "мир"), 0.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!is_match(0.4));
        assert!(is_match(0.39999));
        // 2 edits over 5 chars
        assert_eq!(normalized_distance("abcde", "abcxy"), 0.4);
        let lexicon = IntentLexicon::with_seed(vec![IntentEntry::new("x", ["abcde"], ["r"])], 1).unwrap();
        assert_eq!(lexicon.resolve_intent("abcxy"), UNKNOWN_INTENT);
        assert_eq!(lexicon.resolve_intent("abcdx"), "x");
    }

    #[test]
    fn test_typo_resolves_to_greeting() {
        let lexicon = IntentLexicon::with_seed(vec![greeting()], 7).unwrap();
        assert_eq!(lexicon.resolve_intent("helo"), "greeting");
        assert_eq!(lexicon.resolve_intent("Good morning!"), "greeting");
        assert_eq!(lexicon.get_response("helo"), "hi there");
    }

    #[test]
    fn test_first_intent_in_order_wins() {
        let lexicon = IntentLexicon::with_seed(
            vec![
                IntentEntry::new("first", ["hello"], ["1"]),
                IntentEntry::new("second", ["hello"], ["2"]),
            ],
            0,
        )
        .unwrap();
        assert_eq!(lexicon.resolve_intent("hello"), "first");
        assert_eq!(lexicon.intent_names().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn test_empty_input_matches_empty_example() {
        let lexicon = IntentLexicon::with_seed(
            vec![greeting(), IntentEntry::new("silence", [""], ["..."])],
            0,
        )
        .unwrap();
        assert_eq!(lexicon.resolve_intent(""), "silence");
        assert_eq!(lexicon.resolve_intent("!!!"), "silence");
    }

    #[test]
    fn test_unmatched_text_is_unknown() {
        let lexicon = IntentLexicon::with_seed(vec![greeting()], 0).unwrap();
        assert_eq!(lexicon.resolve_intent("quantum chromodynamics"), UNKNOWN_INTENT);
        assert_eq!(lexicon.get_response("quantum chromodynamics"), DEFAULT_UNKNOWN_RESPONSE);
    }

    #[test]
    fn test_reserved_intents_use_configured_responses() {
        let lexicon = IntentLexicon::with_seed(
            vec![
                IntentEntry::new(UNKNOWN_INTENT, Vec::<String>::new(), ["What?"]),
                IntentEntry::new(CANCEL_CONVERSATION, Vec::<String>::new(), ["Cancelled."]),
            ],
            0,
        )
        .unwrap();
        assert_eq!(lexicon.get_response("zzz"), "What?");
        assert_eq!(lexicon.get_response_by_intent(CANCEL_CONVERSATION), "Cancelled.");
        assert_eq!(lexicon.get_response_by_intent("not_configured"), "What?");
    }

    #[test]
    fn test_default_cancel_response() {
        let lexicon = IntentLexicon::with_seed(vec![], 0).unwrap();
        assert!(lexicon.is_empty());
        assert_eq!(lexicon.get_response_by_intent(CANCEL_CONVERSATION), DEFAULT_CANCEL_RESPONSE);
    }

    #[test]
    fn test_intent_without_responses_rejected() {
        let err = IntentLexicon::new(vec![IntentEntry::new("mute", ["x"], Vec::<String>::new())]);
        assert!(matches!(err, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_seeded_selection_is_deterministic() {
        let intents = || vec![IntentEntry::new("dice", ["roll"], ["1", "2", "3", "4", "5", "6"])];
        let a = IntentLexicon::with_seed(intents(), 42).unwrap();
        let b = IntentLexicon::with_seed(intents(), 42).unwrap();
        let rolls_a: Vec<String> = (0..10).map(|_| a.get_response("roll")).collect();
        let rolls_b: Vec<String> = (0..10).map(|_| b.get_response("roll")).collect();
        assert_eq!(rolls_a, rolls_b);
        assert!(rolls_a.iter().all(|r| ["1", "2", "3", "4", "5", "6"].contains(&r.as_str())));
    }
}
