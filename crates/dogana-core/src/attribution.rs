//! Deterministic source attribution.
//!
//! Citations are derived from registry metadata and evidence rows only; the
//! model's output is never parsed for sources.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::evidence::EvidenceRow;
use crate::registry::{CitationSource, RegistryEntry};

pub const DEFAULT_EURLEX_LANGUAGE: &str = "IT";

const HEADER: &str = "FONTI NORMATIVE (deterministiche)";
const SEPARATOR: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Citation {
    /// Fixed citation of an active registry entry.
    Static {
        label: String,
        identifier: String,
        url: String,
    },
    /// Identifier carried by an evidence row, with a derived EUR-Lex link.
    Dynamic { identifier: String, url: String },
}

impl Citation {
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Static { identifier, .. } | Self::Dynamic { identifier, .. } => identifier,
        }
    }
}

/// Ordered, duplicate-free citations for one answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    citations: Vec<Citation>,
}

#[must_use]
pub fn eurlex_url(identifier: &str, language: &str) -> String {
    format!("https://eur-lex.europa.eu/legal-content/{language}/TXT/?uri=CELEX:{identifier}")
}

impl Attribution {
    /// Static citations of `active_entries` (in the given order) followed by the
    /// first occurrence of each row-level identifier in `rows`.
    ///
    /// An identifier is emitted at most once across both kinds.
    #[must_use]
    pub fn collect(active_entries: &[&RegistryEntry], rows: &[EvidenceRow], language: &str) -> Self {
        let mut seen = HashSet::new();
        let mut citations = Vec::new();

        for entry in active_entries {
            if let CitationSource::StaticCelex {
                identifier,
                url,
                label,
            } = &entry.source
                && seen.insert(identifier.clone())
            {
                citations.push(Citation::Static {
                    label: label.clone(),
                    identifier: identifier.clone(),
                    url: url.clone(),
                });
            }
        }

        for identifier in rows.iter().filter_map(|r| r.citation_identifier.as_deref()) {
            if !identifier.is_empty() && seen.insert(identifier.to_owned()) {
                citations.push(Citation::Dynamic {
                    identifier: identifier.to_owned(),
                    url: eurlex_url(identifier, language),
                });
            }
        }

        Self { citations }
    }

    #[must_use]
    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    /// The printable citation block, or an empty string when there is nothing
    /// to cite.
    #[must_use]
    pub fn render(&self) -> String {
        if self.citations.is_empty() {
            return String::new();
        }

        let mut out = format!("\n{SEPARATOR}\n{HEADER}\n\n");
        for citation in &self.citations {
            match citation {
                Citation::Static {
                    label,
                    identifier,
                    url,
                } => {
                    let _ = writeln!(out, "{label}\nCELEX: {identifier}\n{url}\n");
                }
                Citation::Dynamic { identifier, url } => {
                    let _ = writeln!(out, "CELEX: {identifier}\n{url}\n");
                }
            }
        }
        out.push_str(SEPARATOR);
        out
    }
}
