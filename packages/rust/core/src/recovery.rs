//! Turning generation outcomes into a complete 11-field analysis.
//!
//! Success is flattened as-is. A schema violation goes through the partial
//! salvage below; anything else gets the total-failure placeholders. Either
//! way the caller always receives every field.

use serde_json::{Map, Value};
use tracing::warn;

use paperlens_shared::{AiFields, FIELD_NAMES};

use crate::generation::GenerationOutcome;

/// Text that precedes the raw function arguments in a schema-violation message.
pub const ARGUMENTS_MARKER: &str = "Function Structure arguments:";

/// Text that follows the raw function arguments in a schema-violation message.
pub const TRAILING_MARKER: &str = "are not valid JSON";

/// How a record's analysis was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Schema-conformant result from the service.
    Generated,
    /// Some fields salvaged from a schema violation, the rest placeholders.
    Salvaged,
    /// Schema violation with nothing salvageable: partial-failure placeholders.
    Defaulted,
    /// Generation failed outright: total-failure placeholders.
    Failed,
    /// The worker task itself died: total-failure placeholders.
    Escaped,
}

/// A complete analysis plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub fields: AiFields,
    pub disposition: Disposition,
}

impl Resolved {
    /// Backstop for a worker task that never returned.
    pub fn escaped() -> Self {
        Self {
            fields: AiFields::total_failure(),
            disposition: Disposition::Escaped,
        }
    }
}

/// Map one generation outcome to a complete analysis.
pub fn resolve_outcome(outcome: GenerationOutcome, record_id: &str) -> Resolved {
    match outcome {
        GenerationOutcome::Success(result) => Resolved {
            fields: result.into(),
            disposition: Disposition::Generated,
        },
        GenerationOutcome::SchemaViolation(raw) => salvage_partial(&raw, record_id),
        GenerationOutcome::OtherFailure(reason) => {
            warn!(id = record_id, error = %reason, "generation failed, using failure placeholders");
            Resolved {
                fields: AiFields::total_failure(),
                disposition: Disposition::Failed,
            }
        }
    }
}

/// Recover whatever fields a schema-violation message still carries.
///
/// Fields that cannot be recovered keep their partial-failure placeholder.
/// If the arguments cannot be extracted or reparsed, the whole partial set is
/// returned unchanged.
pub fn salvage_partial(raw: &str, record_id: &str) -> Resolved {
    let mut fields = AiFields::partial_failure();

    let Some(arguments) = extract_arguments(raw) else {
        warn!(id = record_id, "schema violation without embedded arguments");
        return Resolved {
            fields,
            disposition: Disposition::Defaulted,
        };
    };

    // Abstracts carry LaTeX like `$\alpha$`, which is not a valid JSON escape.
    let escaped = arguments.replace('\\', "\\\\");

    let map = match serde_json::from_str::<Map<String, Value>>(&escaped) {
        Ok(map) => map,
        Err(e) => {
            warn!(id = record_id, error = %e, "failed to parse partial arguments, using partial placeholders");
            return Resolved {
                fields,
                disposition: Disposition::Defaulted,
            };
        }
    };

    let recovered: Vec<&'static str> = known_string_fields(&map)
        .into_iter()
        .filter_map(|(name, value)| fields.set(name, value).then_some(name))
        .collect();

    if recovered.is_empty() {
        warn!(id = record_id, "no fields recovered from schema violation");
        return Resolved {
            fields,
            disposition: Disposition::Defaulted,
        };
    }

    warn!(id = record_id, fields = ?recovered, "using partial analysis");
    Resolved {
        fields,
        disposition: Disposition::Salvaged,
    }
}

/// The text between the two markers, trimmed. The trailing marker is optional.
fn extract_arguments(raw: &str) -> Option<&str> {
    let (_, rest) = raw.split_once(ARGUMENTS_MARKER)?;
    let arguments = match rest.split_once(TRAILING_MARKER) {
        Some((head, _)) => head,
        None => rest,
    };
    let arguments = arguments.trim();
    (!arguments.is_empty()).then_some(arguments)
}

/// String values of schema fields, lifting a nested `value` block.
fn known_string_fields(map: &Map<String, Value>) -> Vec<(&'static str, String)> {
    let nested = map.get("value").and_then(Value::as_object);

    FIELD_NAMES
        .iter()
        .filter_map(|name| {
            let value = map
                .get(*name)
                .or_else(|| nested.and_then(|block| block.get(*name)))?;
            value.as_str().map(|s| (*name, s.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperlens_shared::{
        AnalysisResult, TOTAL_FAILURE_SENTINEL, ValueAssessment, partial_failure_sentinel,
    };

    fn violation(arguments: &str) -> String {
        format!("{ARGUMENTS_MARKER}\n\n{arguments}\n\n{TRAILING_MARKER}. Received error: EOF")
    }

    fn assert_only_salvaged(fields: &AiFields, salvaged: &[(&str, &str)]) {
        for name in FIELD_NAMES {
            let expected = salvaged
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .or_else(|| partial_failure_sentinel(name));
            assert_eq!(fields.get(name), expected, "field {name}");
        }
    }

    #[test]
    fn marker_matches_function_name() {
        assert!(ARGUMENTS_MARKER.contains(paperlens_shared::FUNCTION_NAME));
    }

    #[test]
    fn salvages_single_field() {
        let resolved = salvage_partial(&violation(r#"{"core_problem":"partial"}"#), "b");
        assert_eq!(resolved.disposition, Disposition::Salvaged);
        assert_only_salvaged(&resolved.fields, &[("core_problem", "partial")]);
    }

    #[test]
    fn truncated_arguments_yield_partial_sentinels() {
        let raw = violation(r#"{"core_problem":"partial","key_insight":"cut off mid"#);
        let resolved = salvage_partial(&raw, "b");
        assert_eq!(resolved.disposition, Disposition::Defaulted);
        assert_eq!(resolved.fields, AiFields::partial_failure());
    }

    #[test]
    fn escaped_quotes_never_leak_a_cut_value() {
        // Doubling turns `\"` into `\\"`, which closes the string early.
        let raw = violation(r#"{"core_problem":"the \"router\" heads","method":"m"}"#);
        let resolved = salvage_partial(&raw, "b");
        assert_eq!(resolved.disposition, Disposition::Defaulted);
        assert_eq!(resolved.fields, AiFields::partial_failure());
    }

    #[test]
    fn latex_backslashes_survive() {
        let raw = violation(r#"{"method_formula":"$\alpha = \frac{a}{b}$","core_finding":"ok"}"#);
        let resolved = salvage_partial(&raw, "x");
        assert_eq!(resolved.disposition, Disposition::Salvaged);
        assert_eq!(resolved.fields.method_formula, r"$\alpha = \frac{a}{b}$");
        assert_eq!(resolved.fields.core_finding, "ok");
    }

    #[test]
    fn nested_value_block_is_lifted() {
        let raw = violation(
            r#"{"core_problem":"p","value":{"value_score":"high","transferability":"t"},"summary_core":7}"#,
        );
        let resolved = salvage_partial(&raw, "x");
        assert_only_salvaged(
            &resolved.fields,
            &[("core_problem", "p"), ("value_score", "high"), ("transferability", "t")],
        );
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let resolved = salvage_partial(&violation(r#"{"verdict":"great","method":"m"}"#), "x");
        assert_only_salvaged(&resolved.fields, &[("method", "m")]);
        assert!(resolved.fields.to_value().get("verdict").is_none());
    }

    #[test]
    fn missing_marker_yields_partial_sentinels() {
        let resolved = salvage_partial(r#"model said {"core_problem":"partial"}"#, "x");
        assert_eq!(resolved.disposition, Disposition::Defaulted);
        assert_eq!(resolved.fields, AiFields::partial_failure());
    }

    #[test]
    fn unparsable_payload_yields_partial_sentinels() {
        let resolved = salvage_partial(&violation("this is not json at all"), "x");
        assert_eq!(resolved.disposition, Disposition::Defaulted);
        assert_eq!(resolved.fields, AiFields::partial_failure());
    }

    #[test]
    fn trailing_marker_is_optional() {
        let raw = format!("{ARGUMENTS_MARKER} {{\"method\":\"m\"}}");
        let resolved = salvage_partial(&raw, "x");
        assert_only_salvaged(&resolved.fields, &[("method", "m")]);
    }

    #[test]
    fn other_failure_uses_total_sentinels() {
        let resolved = resolve_outcome(GenerationOutcome::OtherFailure("timeout".into()), "c");
        assert_eq!(resolved.disposition, Disposition::Failed);
        assert!(resolved.fields.iter().all(|(_, v)| v == TOTAL_FAILURE_SENTINEL));
    }

    #[test]
    fn success_is_flattened() {
        let result = AnalysisResult {
            core_problem: "p".into(),
            key_insight: "k".into(),
            method: "m".into(),
            method_formula: "f".into(),
            core_finding: "c".into(),
            value: ValueAssessment {
                mechanism_insight: "mi".into(),
                action_value: "av".into(),
                transferability: "t".into(),
                value_score: "v".into(),
            },
            summary_core: "sc".into(),
            summary_layman: "sl".into(),
        };
        let resolved = resolve_outcome(GenerationOutcome::Success(result), "a");
        assert_eq!(resolved.disposition, Disposition::Generated);
        assert_eq!(resolved.fields.value_score, "v");
        assert!(resolved.fields.iter().all(|(_, v)| !paperlens_shared::is_sentinel(v)));
    }

    #[test]
    fn partial_and_total_sets_differ() {
        let partial = resolve_outcome(GenerationOutcome::SchemaViolation("garbage".into()), "b");
        let total = resolve_outcome(GenerationOutcome::OtherFailure("boom".into()), "c");
        assert_eq!(partial.fields, AiFields::partial_failure());
        assert_eq!(total.fields, AiFields::total_failure());
        assert_ne!(partial.fields, total.fields);
    }
}
