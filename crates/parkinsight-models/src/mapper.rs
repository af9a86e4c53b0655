//! Client feature names to model schema mapping.
//!
//! Clients submit camelCase names (`mdvpFo`, `nhr`, ...) that must be
//! translated onto the fixed 22-column schema the classifiers were trained
//! on. Schema features the client did not supply are filled from a table of
//! domain defaults, or `0.0` when no default is registered.

use parkinsight_core::{FeatureVector, SCHEMA_FEATURES};
use std::collections::BTreeMap;

/// Client alias -> schema feature name. Each alias maps to exactly one schema name.
pub const FEATURE_ALIASES: [(&str, &str); 22] = [
    ("mdvpFo", "MDVP:Fo(Hz)"),
    ("mdvpFhi", "MDVP:Fhi(Hz)"),
    ("mdvpFlo", "MDVP:Flo(Hz)"),
    ("mdvpJitter", "MDVP:Jitter(%)"),
    ("mdvpJitterAbs", "MDVP:Jitter(Abs)"),
    ("mdvpRap", "MDVP:RAP"),
    ("mdvpPpq", "MDVP:PPQ"),
    ("jitterDdp", "Jitter:DDP"),
    ("mdvpShimmer", "MDVP:Shimmer"),
    ("mdvpShimmerDb", "MDVP:Shimmer(dB)"),
    ("shimmerApq3", "Shimmer:APQ3"),
    ("shimmerApq5", "Shimmer:APQ5"),
    ("mdvpApq", "MDVP:APQ"),
    ("shimmerDda", "Shimmer:DDA"),
    ("nhr", "NHR"),
    ("hnr", "HNR"),
    ("rpde", "RPDE"),
    ("dfa", "DFA"),
    ("spread1", "spread1"),
    ("spread2", "spread2"),
    ("d2", "D2"),
    ("ppe", "PPE"),
];

/// Defaults for schema features clients usually omit.
pub const FEATURE_DEFAULTS: [(&str, f64); 9] = [
    ("MDVP:Jitter(Abs)", 0.00005),
    ("MDVP:RAP", 0.003),
    ("MDVP:PPQ", 0.003),
    ("Jitter:DDP", 0.009),
    ("MDVP:Shimmer(dB)", 0.35),
    ("Shimmer:APQ3", 0.02),
    ("Shimmer:APQ5", 0.025),
    ("MDVP:APQ", 0.03),
    ("Shimmer:DDA", 0.06),
];

/// Result of mapping client features onto the schema.
#[derive(Debug, Clone)]
pub struct MappedFeatures {
    /// Fully populated schema vector.
    pub vector: FeatureVector,
    /// Schema names filled from the default table or with `0.0`.
    pub defaulted: Vec<&'static str>,
}

/// Schema name for a client alias.
#[must_use]
pub fn resolve_alias(alias: &str) -> Option<&'static str> {
    FEATURE_ALIASES
        .iter()
        .find(|(a, _)| *a == alias)
        .map(|(_, schema)| *schema)
}

/// Registered default for a schema feature.
#[must_use]
pub fn default_for(schema_name: &str) -> Option<f64> {
    FEATURE_DEFAULTS
        .iter()
        .find(|(name, _)| *name == schema_name)
        .map(|(_, v)| *v)
}

/// Client names in `external` that are not known aliases.
#[must_use]
pub fn unknown_aliases(external: &BTreeMap<String, f64>) -> Vec<String> {
    external
        .keys()
        .filter(|k| resolve_alias(k).is_none())
        .cloned()
        .collect()
}

/// Map client-named features onto the full schema.
///
/// Never fails: every schema name ends up with a value. Unknown client names
/// are ignored here; reject them beforehand with [`unknown_aliases`] if needed.
#[must_use]
pub fn prepare_model_input(external: &BTreeMap<String, f64>) -> MappedFeatures {
    let mut values: [Option<f64>; 22] = [None; 22];

    for (alias, schema) in FEATURE_ALIASES {
        if let Some(value) = external.get(alias) {
            if let Some(idx) = parkinsight_core::schema_index(schema) {
                values[idx] = Some(*value);
            }
        }
    }

    let mut vector = FeatureVector::zeros();
    let mut defaulted = Vec::new();
    let mut without_default = Vec::new();
    for (idx, name) in SCHEMA_FEATURES.iter().enumerate() {
        let value = match values[idx] {
            Some(v) => v,
            None => {
                defaulted.push(*name);
                default_for(name).unwrap_or_else(|| {
                    without_default.push(*name);
                    0.0
                })
            }
        };
        vector.set(name, value);
    }

    if !without_default.is_empty() {
        tracing::warn!(
            features = ?without_default,
            "Missing features with no registered default, using 0.0"
        );
    }
    if !defaulted.is_empty() {
        tracing::debug!(features = ?defaulted, "Filled missing features with defaults");
    }

    MappedFeatures { vector, defaulted }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn thirteen_features() -> BTreeMap<String, f64> {
        [
            ("mdvpFo", 119.992),
            ("mdvpFhi", 157.302),
            ("mdvpFlo", 74.997),
            ("mdvpJitter", 0.00784),
            ("mdvpShimmer", 0.04374),
            ("nhr", 0.02211),
            ("hnr", 21.033),
            ("rpde", 0.414783),
            ("dfa", 0.815285),
            ("spread1", -4.813031),
            ("spread2", 0.266482),
            ("d2", 2.301442),
            ("ppe", 0.284654),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect()
    }

    #[test]
    fn test_alias_table_is_one_to_one() {
        let schema: std::collections::BTreeSet<_> =
            FEATURE_ALIASES.iter().map(|(_, s)| *s).collect();
        assert_eq!(schema.len(), SCHEMA_FEATURES.len());
        for name in SCHEMA_FEATURES {
            assert!(schema.contains(name), "no alias for {name}");
        }
    }

    #[test]
    fn test_thirteen_features_fill_remaining_nine_from_defaults() {
        let mapped = prepare_model_input(&thirteen_features());
        assert_eq!(mapped.vector.as_slice().len(), 22);
        assert_eq!(mapped.defaulted.len(), 9);
        assert_eq!(mapped.vector.get("MDVP:Fo(Hz)"), Some(119.992));
        assert_eq!(mapped.vector.get("PPE"), Some(0.284654));
        assert_eq!(mapped.vector.get("MDVP:Jitter(Abs)"), Some(0.00005));
        assert_eq!(mapped.vector.get("Shimmer:DDA"), Some(0.06));
        for (name, _) in FEATURE_DEFAULTS {
            assert!(mapped.defaulted.contains(&name));
        }
    }

    #[test]
    fn test_supplied_value_wins_over_default() {
        let mut input = thirteen_features();
        input.insert("mdvpRap".to_string(), 0.0099);
        let mapped = prepare_model_input(&input);
        assert_eq!(mapped.vector.get("MDVP:RAP"), Some(0.0099));
        assert!(!mapped.defaulted.contains(&"MDVP:RAP"));
    }

    #[test]
    fn test_empty_input_never_fails() {
        let mapped = prepare_model_input(&BTreeMap::new());
        assert_eq!(mapped.defaulted.len(), 22);
        assert_eq!(mapped.vector.get("MDVP:Fo(Hz)"), Some(0.0));
        assert_eq!(mapped.vector.get("MDVP:PPQ"), Some(0.003));
    }

    #[test]
    fn test_unknown_aliases_reported() {
        let mut input = thirteen_features();
        input.insert("loudness".to_string(), 3.0);
        assert_eq!(unknown_aliases(&input), vec!["loudness".to_string()]);
        assert!(unknown_aliases(&thirteen_features()).is_empty());
        let mapped = prepare_model_input(&input);
        assert_eq!(mapped.defaulted.len(), 9);
    }

    #[test]
    fn test_resolve_alias() {
        assert_eq!(resolve_alias("d2"), Some("D2"));
        assert_eq!(resolve_alias("D2"), None);
        assert_eq!(default_for("MDVP:Shimmer(dB)"), Some(0.35));
        assert_eq!(default_for("HNR"), None);
    }
}
