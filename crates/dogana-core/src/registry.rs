//! Declarative list of collateral data sources.
//!
//! Each entry names a backing table, the pattern that recognises its codes in a
//! question, how codes are matched, and where citations come from. Entries are
//! parsed from TOML into [`RawEntry`] and validated once into [`RegistryEntry`];
//! a [`Registry`] is immutable afterwards.

use std::collections::HashSet;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

const BUILTIN_REGISTRY: &str = include_str!("../registry.toml");

const DEFAULT_CELEX_FIELD: &str = "celex_consolidated";
const DEFAULT_INDENT_FIELD: &str = "indent";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read registry file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse registry: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("registry has no entries")]
    Empty,

    #[error("duplicate registry id: {0}")]
    DuplicateId(String),

    #[error("unsupported match_mode {mode:?} (entry {id})")]
    UnsupportedMatchMode { id: String, mode: String },

    #[error("unsupported source kind {kind:?} (entry {id})")]
    UnsupportedSourceKind { id: String, kind: String },

    #[error("entry {id}: source kind {kind} requires `{field}`")]
    MissingField {
        id: String,
        kind: &'static str,
        field: &'static str,
    },

    #[error("entry {id}: invalid pattern: {source}")]
    InvalidPattern { id: String, source: regex::Error },

    #[error("entry {id}: {name:?} is not a plain table or column name")]
    InvalidIdentifier { id: String, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Prefix,
}

impl MatchMode {
    fn parse(id: &str, mode: &str) -> Result<Self, RegistryError> {
        match mode {
            "exact" => Ok(Self::Exact),
            "prefix" => Ok(Self::Prefix),
            other => Err(RegistryError::UnsupportedMatchMode {
                id: id.to_owned(),
                mode: other.to_owned(),
            }),
        }
    }
}

/// Where the citation for rows of an entry comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationSource {
    /// Identifier read per row from `field`.
    CelexField { field: String },
    /// One fixed citation for the whole source.
    StaticCelex {
        identifier: String,
        url: String,
        label: String,
    },
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub id: String,
    pub table: String,
    pub code_field: String,
    pub text_field: String,
    /// Compiled case-insensitive.
    pub pattern: Regex,
    pub label: String,
    pub match_mode: MatchMode,
    /// Set when the visible code must be rendered with its hierarchy level.
    pub display_code_field: Option<String>,
    pub indent_field: String,
    pub source: CitationSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSource {
    pub kind: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Registry entry as written in TOML, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    pub id: String,
    pub table: String,
    pub code_field: String,
    pub text_field: String,
    pub pattern: String,
    pub label: String,
    pub match_mode: String,
    #[serde(default)]
    pub display_code_field: Option<String>,
    #[serde(default)]
    pub indent_field: Option<String>,
    pub source: RawSource,
}

#[derive(Deserialize)]
struct RawRegistry {
    #[serde(default)]
    entry: Vec<RawEntry>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawEntry {
    fn validate(self) -> Result<RegistryEntry, RegistryError> {
        let id = self.id;

        for name in [&self.table, &self.code_field, &self.text_field]
            .into_iter()
            .chain(self.display_code_field.as_ref())
            .chain(self.indent_field.as_ref())
            .chain(self.source.field.as_ref())
        {
            if !dogana_store::is_identifier(name) {
                return Err(RegistryError::InvalidIdentifier {
                    id,
                    name: name.clone(),
                });
            }
        }

        let match_mode = MatchMode::parse(&id, &self.match_mode)?;

        let pattern = match RegexBuilder::new(&self.pattern)
            .case_insensitive(true)
            .build()
        {
            Ok(re) => re,
            Err(source) => return Err(RegistryError::InvalidPattern { id, source }),
        };

        let source = match self.source.kind.as_str() {
            "celex_field" => CitationSource::CelexField {
                field: self
                    .source
                    .field
                    .unwrap_or_else(|| DEFAULT_CELEX_FIELD.to_owned()),
            },
            "static_celex" => {
                let missing = |field| RegistryError::MissingField {
                    id: id.clone(),
                    kind: "static_celex",
                    field,
                };
                CitationSource::StaticCelex {
                    identifier: non_empty(self.source.identifier)
                        .ok_or_else(|| missing("identifier"))?,
                    url: non_empty(self.source.url).ok_or_else(|| missing("url"))?,
                    label: non_empty(self.source.label).unwrap_or_else(|| self.label.clone()),
                }
            }
            other => {
                return Err(RegistryError::UnsupportedSourceKind {
                    id,
                    kind: other.to_owned(),
                });
            }
        };

        Ok(RegistryEntry {
            id,
            table: self.table,
            code_field: self.code_field,
            text_field: self.text_field,
            pattern,
            label: self.label,
            match_mode,
            display_code_field: self.display_code_field,
            indent_field: self
                .indent_field
                .unwrap_or_else(|| DEFAULT_INDENT_FIELD.to_owned()),
            source,
        })
    }
}

/// Validated, ordered set of registry entries.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    /// Validate raw entries, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure encountered.
    pub fn from_raw(raw: Vec<RawEntry>) -> Result<Self, RegistryError> {
        if raw.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(raw.len());
        for entry in raw {
            if !seen.insert(entry.id.clone()) {
                return Err(RegistryError::DuplicateId(entry.id));
            }
            entries.push(entry.validate()?);
        }
        Ok(Self { entries })
    }

    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or any entry is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self, RegistryError> {
        let raw: RawRegistry = toml::from_str(content)?;
        Self::from_raw(raw.entry)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its content is invalid.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_toml_str(&content)?;
        tracing::debug!(
            "loaded {} registry entries from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// The registry shipped with the crate (`dual_use`, `nomenclature`,
    /// `dual_use_correlations`).
    ///
    /// # Errors
    ///
    /// Only fails if the embedded definition is broken.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUILTIN_REGISTRY)
    }

    #[must_use]
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
