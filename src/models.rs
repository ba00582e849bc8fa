use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One recorded dispute instance, written once by the enrichment pipeline.
/// Read-only to the analytics engine.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub id: Uuid,
    pub relationship_id: Uuid,
    pub topic: String,
    pub started_at: DateTime<Utc>,
    /// Subjective intensity 1-10 assigned during enrichment; absent when the
    /// enrichment pass could not determine one.
    pub resentment_level: Option<i32>,
    pub unmet_needs: Vec<String>,
    pub has_past_references: bool,
    /// Back-reference to the conflict this one continues or escalates from.
    /// At most one parent per conflict; the links form a forest.
    pub parent_conflict_id: Option<Uuid>,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// One extracted escalation-relevant utterance.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerPhrase {
    pub id: Uuid,
    pub relationship_id: Uuid,
    pub conflict_id: Uuid,
    pub phrase: String,
    pub category: String,
    pub speaker: String,
    pub emotional_intensity: i32,
    /// Seconds into the conflict transcript; ordering key within a conflict.
    pub timestamp_in_transcript: f64,
    pub is_pattern_trigger: bool,
    pub references_past_conflict: bool,
}

/// One underlying need identified during enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct UnmetNeed {
    pub id: Uuid,
    pub relationship_id: Uuid,
    pub conflict_id: Uuid,
    pub need: String,
    pub confidence: f64,
    pub first_identified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub risk_score: f64,
    pub interpretation: RiskLevel,
    pub unresolved_issues: usize,
    pub days_until_predicted_conflict: Option<i64>,
    pub recommendations: Vec<String>,
}

/// A causal sequence of conflicts, ordered root first.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictChain {
    pub conflicts: Vec<Conflict>,
    pub root_cause: String,
    pub surface_issue: String,
    pub unmet_needs: Vec<String>,
    pub resolution_attempts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhraseStats {
    pub phrase: String,
    pub category: String,
    pub usage_count: usize,
    pub avg_intensity: f64,
    pub escalation_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhraseSequence {
    pub phrases: Vec<String>,
    pub frequency: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChronicNeed {
    pub need: String,
    pub conflict_count: usize,
    pub first_appeared: DateTime<Utc>,
    pub is_chronic: bool,
    pub percentage_of_conflicts: f64,
}
