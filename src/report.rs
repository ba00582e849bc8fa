use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    ChronicNeed, Conflict, ConflictChain, PhraseSequence, PhraseStats, RiskReport, TriggerPhrase,
    UnmetNeed,
};
use crate::{chains, needs, phrases, risk};

/// All four analytics for one relationship, bundled for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub relationship_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub risk: RiskReport,
    pub chains: Vec<ConflictChain>,
    pub phrase_stats: Vec<PhraseStats>,
    pub phrase_sequences: Vec<PhraseSequence>,
    pub chronic_needs: Vec<ChronicNeed>,
}

/// Runs the four independent passes over one snapshot of the record set.
/// The top escalating phrase feeds the risk recommendations; everything else
/// is computed in isolation.
pub fn build_analytics(
    relationship_id: Uuid,
    conflicts: &[Conflict],
    trigger_phrases: &[TriggerPhrase],
    unmet_needs: &[UnmetNeed],
    window_size: usize,
    now: DateTime<Utc>,
) -> AnalyticsReport {
    let phrase_stats = phrases::analyze_phrases(relationship_id, trigger_phrases);
    let risk = risk::score(relationship_id, conflicts, phrase_stats.first(), now);

    AnalyticsReport {
        relationship_id,
        generated_at: now,
        risk,
        chains: chains::trace_chains(relationship_id, conflicts),
        phrase_sequences: phrases::find_sequences(
            relationship_id,
            conflicts,
            trigger_phrases,
            window_size,
            now,
        ),
        chronic_needs: needs::detect_chronic_needs(relationship_id, conflicts, unmet_needs),
        phrase_stats,
    }
}

pub fn render_markdown(report: &AnalyticsReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Conflict Insights Report");
    let _ = writeln!(
        output,
        "Relationship {} (generated {})",
        report.relationship_id,
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Escalation Risk");
    let _ = writeln!(
        output,
        "- Score {:.2} ({})",
        report.risk.risk_score,
        report.risk.interpretation.as_str()
    );
    let _ = writeln!(output, "- Unresolved issues: {}", report.risk.unresolved_issues);
    match report.risk.days_until_predicted_conflict {
        Some(days) => {
            let _ = writeln!(output, "- Next conflict predicted in roughly {days} days");
        }
        None => {
            let _ = writeln!(output, "- Not enough history to predict the next conflict");
        }
    }
    for recommendation in &report.risk.recommendations {
        let _ = writeln!(output, "- {recommendation}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Conflict Chains");
    if report.chains.is_empty() {
        let _ = writeln!(output, "No linked conflicts found.");
    } else {
        for chain in &report.chains {
            let _ = writeln!(
                output,
                "- '{}' traces back to '{}' across {} conflicts ({} resolved along the way); needs: {}",
                chain.surface_issue,
                chain.root_cause,
                chain.conflicts.len(),
                chain.resolution_attempts,
                if chain.unmet_needs.is_empty() {
                    "none recorded".to_string()
                } else {
                    chain.unmet_needs.join(", ")
                }
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trigger Phrases");
    if report.phrase_stats.is_empty() {
        let _ = writeln!(output, "No trigger phrases extracted yet.");
    } else {
        for stats in report.phrase_stats.iter().take(10) {
            let _ = writeln!(
                output,
                "- \"{}\" ({}): used {} times, avg intensity {:.1}, escalated {:.0}% of the time",
                stats.phrase,
                stats.category,
                stats.usage_count,
                stats.avg_intensity,
                stats.escalation_rate * 100.0
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recurring Phrase Sequences");
    if report.phrase_sequences.is_empty() {
        let _ = writeln!(output, "No recurring sequences in the last 90 days.");
    } else {
        for sequence in report.phrase_sequences.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} (seen {} times)",
                sequence.phrases.join(" -> "),
                sequence.frequency
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Chronic Unmet Needs");
    if report.chronic_needs.is_empty() {
        let _ = writeln!(output, "No unmet needs recorded.");
    } else {
        for need in &report.chronic_needs {
            let _ = writeln!(
                output,
                "- {}{}: {} conflicts ({:.2}% of all), first seen {}",
                need.need,
                if need.is_chronic { " (chronic)" } else { "" },
                need.conflict_count,
                need.percentage_of_conflicts,
                need.first_appeared.format("%Y-%m-%d")
            );
        }
    }

    output
}
