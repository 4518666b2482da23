//! Prediction service output.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Diagnosis returned by the prediction service for one reading.
///
/// Every field is optional and nothing is validated. Absent fields stay
/// absent; a text field sent as another JSON type keeps its JSON text, and a
/// non-string recommendation is treated as absent. Callers decide how to
/// present a missing label or recommendation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(
        default,
        deserialize_with = "deserialize_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub machine_id: Option<String>,
    /// Categorical prediction. Integer class indices are normalized to their
    /// decimal string.
    #[serde(
        default,
        deserialize_with = "deserialize_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub prediction: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub recommendation: Option<String>,
    /// Raw confidence payload, kept as sent. See [`Diagnosis::class_scores`].
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub probabilities: Value,
}

/// Confidence for a single class label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScore {
    pub label: String,
    pub score: f64,
}

impl Diagnosis {
    /// Interpret the confidence payload.
    ///
    /// Accepts an object of `label -> score` or an array of scores (labels are
    /// the class indices). Entries whose score is not a number are skipped.
    /// Scores are reported as sent; they need not sum to 1.
    #[must_use]
    pub fn class_scores(&self) -> Vec<ClassScore> {
        match &self.probabilities {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(idx, value)| {
                    value.as_f64().map(|score| ClassScore {
                        label: idx.to_string(),
                        score,
                    })
                })
                .collect(),
            Value::Object(map) => map
                .iter()
                .filter_map(|(label, value)| {
                    value.as_f64().map(|score| ClassScore {
                        label: label.clone(),
                        score,
                    })
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Highest-scoring class, if any scores are present.
    #[must_use]
    pub fn top_class(&self) -> Option<ClassScore> {
        self.class_scores()
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

fn deserialize_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }))
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}
