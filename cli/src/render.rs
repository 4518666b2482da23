//! Plain-text rendering of diagnoses and ledger records.

use sentinel_types::{Diagnosis, LedgerRecord, truncate_with_ellipsis};

const MACHINE_COLUMN_WIDTH: usize = 20;
const ABSENT: &str = "-";

pub(crate) fn diagnosis(diagnosis: &Diagnosis, recommendations: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Machine:    {}\n",
        diagnosis.machine_id.as_deref().unwrap_or(ABSENT)
    ));
    out.push_str(&format!(
        "Condition:  {}\n",
        diagnosis.prediction.as_deref().unwrap_or(ABSENT)
    ));
    out.push_str(&format!(
        "Status:     {}\n",
        diagnosis.status.as_deref().unwrap_or(ABSENT)
    ));

    out.push_str("\nRecommendations:\n");
    if recommendations.is_empty() {
        out.push_str("  (none)\n");
    }
    for line in recommendations {
        out.push_str(&format!("  - {line}\n"));
    }

    let scores = diagnosis.class_scores();
    if !scores.is_empty() {
        out.push_str("\nConfidence:\n");
        for score in scores {
            out.push_str(&format!("  {:<24} {:>6.1}%\n", score.label, score.score * 100.0));
        }
    }
    out
}

pub(crate) fn records(records: &[LedgerRecord]) -> String {
    if records.is_empty() {
        return "No records on the ledger.\n".to_string();
    }

    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "#{:<4} {:<width$} {:<12} {}\n",
            record.index,
            truncate_with_ellipsis(&record.machine_id, MACHINE_COLUMN_WIDTH),
            record.condition,
            record.committed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            width = MACHINE_COLUMN_WIDTH,
        ));
        for line in record.recommendation.lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(&format!("      {line}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use sentinel_types::{Diagnosis, LedgerRecord, RawRecord};
    use serde_json::json;

    use super::{diagnosis, records};

    #[test]
    fn diagnosis_lists_bullets_and_scores() {
        let d = Diagnosis {
            machine_id: Some("MACH-001".to_string()),
            prediction: Some("Warning".to_string()),
            status: Some("Tool Wear Failure".to_string()),
            recommendation: None,
            probabilities: json!({"Normal": 0.25, "Warning": 0.75}),
        };
        let out = diagnosis(&d, &["replace tool".to_string()]);

        assert!(out.contains("Condition:  Warning\n"));
        assert!(out.contains("  - replace tool\n"));
        assert!(out.contains("Warning"));
        assert!(out.contains("75.0%"));
        assert!(out.contains("25.0%"));
    }

    #[test]
    fn sparse_diagnosis_renders_placeholders() {
        let out = diagnosis(&Diagnosis::default(), &[]);
        assert!(out.contains("Machine:    -\n"));
        assert!(out.contains("(none)"));
        assert!(!out.contains("Confidence"));
    }

    #[test]
    fn records_one_header_per_entry() {
        let raw = RawRecord {
            machine_id: "MACH-001".to_string(),
            condition: "Warning".to_string(),
            recommendation: "replace tool\ncheck bearing".to_string(),
            timestamp_secs: 0,
        };
        let record = LedgerRecord::from_raw(0, raw).unwrap();
        let out = records(&[record]);

        let mut lines = out.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("#0"));
        assert!(header.contains("MACH-001"));
        assert!(header.contains("Warning"));
        assert!(header.ends_with("1970-01-01 00:00:00 UTC"));
        assert_eq!(lines.next().unwrap().trim(), "replace tool");
        assert_eq!(lines.next().unwrap().trim(), "check bearing");
    }

    #[test]
    fn empty_ledger() {
        assert_eq!(records(&[]), "No records on the ledger.\n");
    }
}
