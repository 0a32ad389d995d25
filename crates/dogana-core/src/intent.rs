use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    CodeSpecific,
    Classification,
    Procedural,
    Generic,
}

impl Intent {
    /// Keyword classification of the raw question.
    ///
    /// Never yields [`Intent::CodeSpecific`]; that is decided by [`Intent::resolve`]
    /// once registry matches are known.
    #[must_use]
    pub fn classify(question: &str) -> Self {
        let text = question.to_lowercase();

        if contains_procedural_indicators(&text) {
            Self::Procedural
        } else if contains_classification_indicators(&text) {
            Self::Classification
        } else {
            Self::Generic
        }
    }

    /// Final intent: procedural questions keep their intent even when a code
    /// is present, any other question with a registry match becomes code-specific.
    #[must_use]
    pub fn resolve(self, has_matches: bool) -> Self {
        match self {
            Self::Procedural => Self::Procedural,
            _ if has_matches => Self::CodeSpecific,
            other => other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CodeSpecific => "CODE_SPECIFIC",
            Self::Classification => "CLASSIFICATION",
            Self::Procedural => "PROCEDURAL",
            Self::Generic => "GENERIC",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn contains_procedural_indicators(text: &str) -> bool {
    const INDICATORS: &[&str] = &[
        "cosa devo fare",
        "obblighi",
        "procedura",
        "autorizzazione",
        "esportare",
        "what do i need to do",
        "what must i do",
        "obligations",
        "procedure",
        "authorisation",
        "authorization",
        "to export",
    ];
    INDICATORS.iter().any(|kw| text.contains(kw))
}

fn contains_classification_indicators(text: &str) -> bool {
    const INDICATORS: &[&str] = &[
        "che codice",
        "voce doganale",
        "classificazione",
        "which code",
        "what code",
        "customs heading",
        "classification",
    ];
    INDICATORS.iter().any(|kw| text.contains(kw))
}
