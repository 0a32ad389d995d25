use crate::registry::{Registry, RegistryEntry};

/// A registry entry whose pattern occurs in the question, with the matched
/// code uppercased.
#[derive(Debug, Clone)]
pub struct RegistryMatch<'r> {
    pub entry: &'r RegistryEntry,
    pub code: String,
}

/// Scans every registry pattern against `query`, in registry order.
///
/// Each entry contributes at most one match (its first occurrence); entries
/// with overlapping patterns all match, so the same code can be returned for
/// several entries.
#[must_use]
pub fn detect<'r>(registry: &'r Registry, query: &str) -> Vec<RegistryMatch<'r>> {
    if query.is_empty() {
        return Vec::new();
    }

    let matches: Vec<_> = registry
        .entries()
        .iter()
        .filter_map(|entry| {
            entry.pattern.find(query).map(|m| RegistryMatch {
                entry,
                code: m.as_str().to_uppercase(),
            })
        })
        .collect();

    for m in &matches {
        tracing::debug!("registry match: {} -> {}", m.entry.id, m.code);
    }
    matches
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ids<'a>(matches: &'a [RegistryMatch<'_>]) -> Vec<&'a str> {
        matches.iter().map(|m| m.entry.id.as_str()).collect()
    }

    #[test]
    fn dual_use_code_uppercased() {
        let registry = Registry::builtin().unwrap();
        let matches = detect(&registry, "dimmi il bene 2b002");
        assert_eq!(ids(&matches), ["dual_use"]);
        assert_eq!(matches[0].code, "2B002");
    }

    #[test]
    fn numeric_code_matches_every_numeric_entry() {
        let registry = Registry::builtin().unwrap();
        let matches = detect(&registry, "voce 8544");
        assert_eq!(ids(&matches), ["nomenclature", "dual_use_correlations"]);
        assert!(matches.iter().all(|m| m.code == "8544"));
    }

    #[test]
    fn all_entries_reported_in_registry_order() {
        let registry = Registry::builtin().unwrap();
        let matches = detect(&registry, "8544 e 2B002");
        assert_eq!(
            ids(&matches),
            ["dual_use", "nomenclature", "dual_use_correlations"]
        );
    }

    #[test]
    fn first_occurrence_per_entry() {
        let registry = Registry::builtin().unwrap();
        let matches = detect(&registry, "1A001 oppure 9E003");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].code, "1A001");
    }

    #[test]
    fn no_match_and_empty_input() {
        let registry = Registry::builtin().unwrap();
        assert!(detect(&registry, "").is_empty());
        assert!(detect(&registry, "regolamento generale").is_empty());
        assert!(detect(&registry, "123").is_empty());
    }

    #[test]
    fn unanchored_search() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(detect(&registry, "codice:87089997 ricambi").len(), 2);
    }

    proptest! {
        #[test]
        fn matches_follow_registry_order_and_are_uppercase(query in "[a-zA-Z0-9 ]{0,40}") {
            let registry = Registry::builtin().unwrap();
            let matches = detect(&registry, &query);
            let positions: Vec<usize> = matches
                .iter()
                .map(|m| {
                    registry
                        .entries()
                        .iter()
                        .position(|e| e.id == m.entry.id)
                        .unwrap()
                })
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
            for m in &matches {
                prop_assert_eq!(m.code.clone(), m.code.to_uppercase());
            }
        }
    }
}
