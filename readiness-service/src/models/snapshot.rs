//! Snapshot model - a point-in-time readiness report.

use super::session::Domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFinding {
    pub finding: String,
    pub domain: Domain,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub description: String,
    pub domain: Domain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strength {
    pub description: String,
    pub domain: Domain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStep {
    pub priority: u32,
    pub action: String,
    pub rationale: String,
    pub domain: Domain,
}

/// An assumption the founder should test before relying on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationItem {
    pub source_domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_topic: Option<String>,
    pub title: String,
    pub description: String,
    pub validation_step: String,
}

/// Report body, stored as a single JSONB document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotReport {
    pub key_findings: Vec<KeyFinding>,
    pub risks: Vec<Risk>,
    pub strengths: Vec<Strength>,
    pub next_steps: Vec<NextStep>,
    pub validation_items: Vec<ValidationItem>,
}

impl SnapshotReport {
    /// Next steps ordered by priority, 1 first.
    pub fn normalized(mut self) -> Self {
        self.next_steps.sort_by_key(|step| step.priority);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.key_findings.is_empty()
            && self.risks.is_empty()
            && self.strengths.is_empty()
            && self.next_steps.is_empty()
            && self.validation_items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Uuid,
    pub session_id: Uuid,
    #[serde(flatten)]
    pub report: SnapshotReport,
    pub created_at: DateTime<Utc>,
}

/// Database row for `snapshots`.
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub report: Json<SnapshotReport>,
    pub created_at: DateTime<Utc>,
}

impl From<SnapshotRow> for Snapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            report: row.report.0,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_uses_camel_case_wire_format() {
        let report = SnapshotReport {
            validation_items: vec![ValidationItem {
                source_domain: Domain::Gtm,
                source_topic: None,
                title: "Channel".into(),
                description: "Paid search converts".into(),
                validation_step: "Run a two week test".into(),
            }],
            key_findings: vec![KeyFinding {
                finding: "Clear niche".into(),
                domain: Domain::Market,
                confidence: Confidence::High,
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["keyFindings"][0]["confidence"], "high");
        assert_eq!(json["validationItems"][0]["sourceDomain"], "gtm");
        assert_eq!(json["validationItems"][0]["validationStep"], "Run a two week test");
        assert!(json["validationItems"][0].get("sourceTopic").is_none());
        assert_eq!(json["nextSteps"], serde_json::json!([]));
    }

    #[test]
    fn partial_report_deserializes_with_defaults() {
        let report: SnapshotReport =
            serde_json::from_str(r#"{"risks":[{"description":"Thin runway","domain":"financials"}]}"#)
                .unwrap();
        assert_eq!(report.risks.len(), 1);
        assert!(report.key_findings.is_empty());
        assert!(!report.is_empty());
    }

    #[test]
    fn normalized_orders_next_steps_by_priority() {
        let step = |priority| NextStep {
            priority,
            action: format!("step {}", priority),
            rationale: String::new(),
            domain: Domain::Product,
        };
        let report = SnapshotReport {
            next_steps: vec![step(3), step(1), step(2)],
            ..Default::default()
        }
        .normalized();

        let order: Vec<u32> = report.next_steps.iter().map(|s| s.priority).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn snapshot_flattens_report() {
        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            report: SnapshotReport::default(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("keyFindings").is_some());
        assert!(json.get("sessionId").is_some());
        assert!(json.get("report").is_none());
    }
}
