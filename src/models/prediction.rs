//! Interpretation of hosted prediction responses.
//!
//! The endpoint answers in one of two shapes per record: `{displayName, confidence}` or
//! `{classes, scores}`. Anything else is reported as unrecognized.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    Classified { label: String, confidence: f64 },
    /// `classes`/`scores` present but empty or of different lengths.
    Mismatched,
    Unrecognized,
}

impl PredictionOutcome {
    pub fn interpret(prediction: &Value) -> Self {
        let Some(fields) = prediction.as_object() else {
            return PredictionOutcome::Unrecognized;
        };

        if let (Some(name), Some(confidence)) = (fields.get("displayName"), fields.get("confidence"))
        {
            return PredictionOutcome::Classified {
                label: label_text(first_if_array(name)),
                confidence: first_if_array(confidence).as_f64().unwrap_or(0.0),
            };
        }

        if let (Some(classes), Some(scores)) = (fields.get("classes"), fields.get("scores")) {
            return classify_by_max_score(classes, scores);
        }

        PredictionOutcome::Unrecognized
    }

    /// Confidence as a percentage rounded to two decimals.
    pub fn confidence_percent(&self) -> Option<f64> {
        match self {
            PredictionOutcome::Classified { confidence, .. } => {
                Some((confidence * 100.0 * 100.0).round() / 100.0)
            }
            _ => None,
        }
    }
}

fn classify_by_max_score(classes: &Value, scores: &Value) -> PredictionOutcome {
    let (Some(classes), Some(scores)) = (classes.as_array(), scores.as_array()) else {
        return PredictionOutcome::Mismatched;
    };
    if scores.is_empty() || classes.len() != scores.len() {
        return PredictionOutcome::Mismatched;
    }

    // First maximum wins on ties; non-numeric scores count as 0.
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, score) in scores.iter().enumerate() {
        let value = score.as_f64().unwrap_or(0.0);
        if value > best_score {
            best = i;
            best_score = value;
        }
    }

    PredictionOutcome::Classified {
        label: label_text(&classes[best]),
        confidence: scores[best].as_f64().unwrap_or(0.0),
    }
}

fn first_if_array(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(value),
        other => other,
    }
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One interpreted prediction, labelled with the record's customer id.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRow {
    pub customer_id: String,
    #[serde(flatten)]
    pub outcome: PredictionOutcome,
}

/// Customer id of the n-th (0-based) record, or a positional placeholder.
pub fn customer_id_for(record: Option<&Map<String, Value>>, index: usize) -> String {
    record
        .and_then(|fields| {
            fields
                .iter()
                .find(|(key, _)| normalize_column(key) == "customer_id")
                .map(|(_, value)| label_text(value))
        })
        .filter(|id| !id.is_empty() && id != "null")
        .unwrap_or_else(|| format!("CustID_{}_NotFound", index + 1))
}

fn normalize_column(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_name_shape() {
        let outcome = PredictionOutcome::interpret(&json!({"displayName": "HIGH", "confidence": 0.87}));
        assert_eq!(
            outcome,
            PredictionOutcome::Classified {
                label: "HIGH".into(),
                confidence: 0.87
            }
        );
        assert_eq!(outcome.confidence_percent(), Some(87.0));
    }

    #[test]
    fn test_display_name_with_non_numeric_confidence() {
        let outcome =
            PredictionOutcome::interpret(&json!({"displayName": "LOW", "confidence": "n/a"}));
        assert_eq!(
            outcome,
            PredictionOutcome::Classified {
                label: "LOW".into(),
                confidence: 0.0
            }
        );
    }

    #[test]
    fn test_classes_scores_picks_max() {
        let outcome = PredictionOutcome::interpret(
            &json!({"classes": ["LOW", "MEDIUM", "HIGH"], "scores": [0.1, 0.123456, 0.05]}),
        );
        assert_eq!(
            outcome,
            PredictionOutcome::Classified {
                label: "MEDIUM".into(),
                confidence: 0.123456
            }
        );
        assert_eq!(outcome.confidence_percent(), Some(12.35));
    }

    #[test]
    fn test_display_name_shape_takes_precedence() {
        let outcome = PredictionOutcome::interpret(&json!({
            "displayName": "A", "confidence": 0.5,
            "classes": ["B"], "scores": [0.9]
        }));
        assert!(matches!(outcome, PredictionOutcome::Classified { ref label, .. } if label == "A"));
    }

    #[test]
    fn test_mismatched_and_unrecognized() {
        assert_eq!(
            PredictionOutcome::interpret(&json!({"classes": ["A", "B"], "scores": [0.9]})),
            PredictionOutcome::Mismatched
        );
        assert_eq!(
            PredictionOutcome::interpret(&json!({"classes": [], "scores": []})),
            PredictionOutcome::Mismatched
        );
        assert_eq!(
            PredictionOutcome::interpret(&json!({"value": 3})),
            PredictionOutcome::Unrecognized
        );
        assert_eq!(
            PredictionOutcome::interpret(&json!([1, 2])),
            PredictionOutcome::Unrecognized
        );
        assert_eq!(PredictionOutcome::Mismatched.confidence_percent(), None);
    }

    #[test]
    fn test_customer_id_lookup() {
        let record = json!({"Customer ID": "C-001", "credit_score": 700});
        assert_eq!(customer_id_for(record.as_object(), 0), "C-001");

        let numeric = json!({"customer_id": 42});
        assert_eq!(customer_id_for(numeric.as_object(), 0), "42");

        let without = json!({"company_name": "Apex"});
        assert_eq!(customer_id_for(without.as_object(), 2), "CustID_3_NotFound");
        assert_eq!(customer_id_for(None, 0), "CustID_1_NotFound");
    }

    #[test]
    fn test_row_serialization() {
        let row = PredictionRow {
            customer_id: "C-1".into(),
            outcome: PredictionOutcome::Unrecognized,
        };
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({"customer_id": "C-1", "status": "unrecognized"})
        );
    }
}
