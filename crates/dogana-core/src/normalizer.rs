//! Rewrites a question into the text handed to the embedding step.
//!
//! The rewritten text is never shown to the user and never sent to the model;
//! the original question is always used for the answer.

use std::sync::LazyLock;

use regex::Regex;

use crate::intent::Intent;

/// Conversational fragments stripped from procedural questions, in removal order.
const FILLERS: &[&str] = &[
    "cosa devo fare per",
    "cosa devo fare",
    "come devo",
    "devo",
    "come posso",
    "posso",
    "what do i need to do to",
    "what do i need to do",
    "what must i do to",
    "what must i do",
    "how do i",
    "how can i",
    "do i need to",
    "can i",
    "?",
];

const PROCEDURAL_PREFIX: &str = "obblighi e autorizzazioni relativi a";
const CLASSIFICATION_PREFIX: &str = "classificazione normativa e allegati relativi a";

static FILLER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    FILLERS
        .iter()
        .filter_map(|fragment| Regex::new(&filler_pattern(fragment)).ok())
        .collect()
});

/// Case-insensitive literal match anywhere in the text, including inside
/// longer words; any run of whitespace may separate the words of a fragment.
fn filler_pattern(fragment: &str) -> String {
    let words: Vec<String> = fragment.split_whitespace().map(regex::escape).collect();
    format!("(?i){}", words.join(r"\s+"))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase `query` and remove every filler fragment, repeating until no
/// fragment is left.
#[must_use]
pub fn strip_fillers(query: &str) -> String {
    let mut text = query.to_lowercase();
    loop {
        let mut next = text.clone();
        for re in FILLER_PATTERNS.iter() {
            next = re.replace_all(&next, " ").into_owned();
        }
        if next == text {
            break;
        }
        text = next;
    }
    collapse_whitespace(&text)
}

/// `true` when `text` contains one of the filler fragments as a plain substring,
/// ignoring case.
#[must_use]
pub fn contains_filler(text: &str) -> bool {
    let text = text.to_lowercase();
    FILLERS.iter().any(|fragment| text.contains(fragment))
}

#[must_use]
pub fn normalize(query: &str, intent: Intent) -> String {
    match intent {
        Intent::Procedural => {
            let cleaned = strip_fillers(query);
            format!("{PROCEDURAL_PREFIX} {cleaned}").trim_end().to_owned()
        }
        Intent::Classification => format!("{CLASSIFICATION_PREFIX} {query}"),
        Intent::CodeSpecific | Intent::Generic => query.to_owned(),
    }
}
