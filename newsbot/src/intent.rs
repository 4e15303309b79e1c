//! Query intent classification.
//!
//! A query is lower-cased, split into word tokens and checked against an
//! ordered keyword table. The first entry with a whole-word hit decides the
//! intent, so a query mentioning both "category" and "sentiment" is a
//! category question.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the user is asking about the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Category,
    Sentiment,
    Entities,
    Topic,
    Summary,
    Unknown,
}

impl Intent {
    /// Supported intents in priority order.
    pub const PRIORITY: [Intent; 5] = [
        Intent::Category,
        Intent::Sentiment,
        Intent::Entities,
        Intent::Topic,
        Intent::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Category => "category",
            Intent::Sentiment => "sentiment",
            Intent::Entities => "entities",
            Intent::Topic => "topic",
            Intent::Summary => "summary",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "category" => Ok(Intent::Category),
            "sentiment" => Ok(Intent::Sentiment),
            "entities" | "entity" => Ok(Intent::Entities),
            "topic" => Ok(Intent::Topic),
            "summary" => Ok(Intent::Summary),
            "unknown" => Ok(Intent::Unknown),
            other => anyhow::bail!("unknown intent name: {}", other),
        }
    }
}

/// Lower-case and trim a raw query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Split text into lower-cased alphanumeric word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// One trigger, possibly several words long ("short version").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    words: Vec<String>,
}

impl Trigger {
    /// Returns `None` when the phrase has no word characters.
    pub fn new(phrase: &str) -> Option<Self> {
        let words = tokenize(phrase);
        if words.is_empty() {
            None
        } else {
            Some(Self { words })
        }
    }

    /// True when the trigger occurs as a contiguous run of whole tokens.
    pub fn matches(&self, tokens: &[String]) -> bool {
        tokens
            .windows(self.words.len())
            .any(|window| window.iter().zip(&self.words).all(|(t, w)| word_matches(t, w)))
    }
}

/// Exact match or a regular plural of the trigger word.
fn word_matches(token: &str, trigger: &str) -> bool {
    if token == trigger {
        return true;
    }
    let plural_s = token.strip_suffix('s').is_some_and(|stem| stem == trigger);
    let plural_es = token.strip_suffix("es").is_some_and(|stem| stem == trigger);
    let plural_ies = match (token.strip_suffix("ies"), trigger.strip_suffix('y')) {
        (Some(stem), Some(trigger_stem)) => !stem.is_empty() && stem == trigger_stem,
        _ => false,
    };
    plural_s || plural_es || plural_ies
}

fn builtin_triggers(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Category => &["category", "classify", "label"],
        Intent::Sentiment => &["sentiment", "emotion", "feeling", "tone"],
        Intent::Entities => &["entity", "entities", "person", "organization", "place", "location", "company"],
        Intent::Topic => &["topic", "theme", "subject"],
        Intent::Summary => &["summary", "summarize", "abstract", "short version"],
        Intent::Unknown => &[],
    }
}

/// Ordered (intent, triggers) entries. Order is priority.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    entries: Vec<(Intent, Vec<Trigger>)>,
}

impl KeywordTable {
    /// The built-in trigger sets in priority order.
    pub fn builtin() -> Self {
        let entries = Intent::PRIORITY
            .iter()
            .map(|intent| {
                let triggers: Vec<Trigger> =
                    builtin_triggers(*intent).iter().filter_map(|p| Trigger::new(p)).collect();
                (*intent, triggers)
            })
            .collect();

        Self { entries }
    }

    /// Append extra triggers to an intent's entry. Priority order is unchanged;
    /// `Unknown` has no entry and its extras are ignored.
    pub fn with_extra_triggers<I, S>(mut self, intent: Intent, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some((_, triggers)) = self.entries.iter_mut().find(|(i, _)| *i == intent) {
            for trigger in phrases.into_iter().filter_map(|p| Trigger::new(p.as_ref())) {
                if !triggers.contains(&trigger) {
                    triggers.push(trigger);
                }
            }
        }
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (Intent, &[Trigger])> {
        self.entries.iter().map(|(intent, triggers)| (*intent, triggers.as_slice()))
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Maps queries to intents. Pure; holds only its keyword table.
#[derive(Debug, Clone, Default)]
pub struct IntentClassifier {
    table: KeywordTable,
}

impl IntentClassifier {
    pub fn new(table: KeywordTable) -> Self {
        Self { table }
    }

    pub fn classify(&self, query: &str) -> Intent {
        let tokens = tokenize(&normalize_query(query));
        self.table
            .entries()
            .find(|(_, triggers)| triggers.iter().any(|t| t.matches(&tokens)))
            .map(|(intent, _)| intent)
            .unwrap_or(Intent::Unknown)
    }
}
