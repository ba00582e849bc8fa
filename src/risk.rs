use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{Conflict, PhraseStats, RiskLevel, RiskReport};

const UNRESOLVED_WEIGHT: f64 = 0.4;
const RESENTMENT_WEIGHT: f64 = 0.3;
const RECENCY_WEIGHT: f64 = 0.2;
const RECURRENCE_WEIGHT: f64 = 0.1;

/// Five or more unresolved conflicts saturate the unresolved signal.
const UNRESOLVED_SATURATION: f64 = 5.0;
/// Trailing window for resentment averaging and recurrence gaps.
pub const TRAILING_WINDOW_DAYS: i64 = 30;
/// A most-recent gap at or under this many days counts as rapid recurrence.
const RAPID_GAP_DAYS: i64 = 7;

/// Escalation risk for one relationship: four weighted behavioral signals
/// combined into a 0-1 score. Never fails; a relationship with no conflicts
/// gets a zero report.
///
/// The recurrence signal and the days-until prediction are heuristics (a
/// shrinking-gap trend test), not fitted forecasts.
pub fn score(
    relationship_id: Uuid,
    conflicts: &[Conflict],
    top_phrase: Option<&PhraseStats>,
    now: DateTime<Utc>,
) -> RiskReport {
    let mut scoped: Vec<&Conflict> = conflicts
        .iter()
        .filter(|c| c.relationship_id == relationship_id)
        .collect();
    scoped.sort_by_key(|c| c.started_at);

    if scoped.is_empty() {
        return RiskReport {
            risk_score: 0.0,
            interpretation: RiskLevel::Low,
            unresolved_issues: 0,
            days_until_predicted_conflict: None,
            recommendations: Vec::new(),
        };
    }

    let unresolved_count = scoped.iter().filter(|c| !c.is_resolved).count();
    let unresolved_score = (unresolved_count as f64 / UNRESOLVED_SATURATION).min(1.0);

    let resentment_score = resentment_score(&scoped, now);
    let recency_score = recency_score(&scoped, now);

    let gaps = window_gaps(&scoped, now);
    let accelerating = is_rapid_recurrence(&gaps);
    let recurrence_score = if accelerating { 0.8 } else { 0.3 };

    let risk_score = (UNRESOLVED_WEIGHT * unresolved_score
        + RESENTMENT_WEIGHT * resentment_score
        + RECENCY_WEIGHT * recency_score
        + RECURRENCE_WEIGHT * recurrence_score)
        .clamp(0.0, 1.0);

    RiskReport {
        risk_score,
        interpretation: interpret(risk_score),
        unresolved_issues: unresolved_count,
        days_until_predicted_conflict: predict_next_gap(&scoped, accelerating),
        recommendations: build_recommendations(&scoped, top_phrase, accelerating),
    }
}

/// Bucket boundaries are closed on the lower bound: exactly 0.25 is medium.
pub fn interpret(risk_score: f64) -> RiskLevel {
    if risk_score < 0.25 {
        RiskLevel::Low
    } else if risk_score < 0.5 {
        RiskLevel::Medium
    } else if risk_score < 0.75 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

/// Mean resentment over the trailing window, scaled to 0-1. Conflicts with
/// no recorded resentment are excluded from the mean rather than counted as
/// zero. Falls back to the most recent conflict's value when the window has
/// no usable readings.
fn resentment_score(scoped: &[&Conflict], now: DateTime<Utc>) -> f64 {
    let cutoff = now - Duration::days(TRAILING_WINDOW_DAYS);
    let recent: Vec<i32> = scoped
        .iter()
        .filter(|c| c.started_at >= cutoff)
        .filter_map(|c| c.resentment_level)
        .collect();

    if !recent.is_empty() {
        let mean = recent.iter().sum::<i32>() as f64 / recent.len() as f64;
        return mean / 10.0;
    }

    scoped
        .last()
        .and_then(|c| c.resentment_level)
        .map(|level| level as f64 / 10.0)
        .unwrap_or(0.0)
}

/// Recency pushes risk up linearly; 30+ days since the last conflict floors
/// the signal at zero.
fn recency_score(scoped: &[&Conflict], now: DateTime<Utc>) -> f64 {
    let last = match scoped.last() {
        Some(conflict) => conflict,
        None => return 0.0,
    };
    let days_since_last = (now - last.started_at).num_days();
    (1.0 - days_since_last as f64 / TRAILING_WINDOW_DAYS as f64).clamp(0.0, 1.0)
}

/// Inter-conflict gaps in days, oldest first, for conflicts inside the
/// trailing window.
fn window_gaps(scoped: &[&Conflict], now: DateTime<Utc>) -> Vec<i64> {
    let cutoff = now - Duration::days(TRAILING_WINDOW_DAYS);
    let windowed: Vec<&&Conflict> = scoped.iter().filter(|c| c.started_at >= cutoff).collect();
    windowed
        .windows(2)
        .map(|pair| (pair[1].started_at - pair[0].started_at).num_days())
        .collect()
}

/// Rapid recurrence: intervals between conflicts are shrinking (monotonically
/// non-increasing) and the most recent gap is short.
fn is_rapid_recurrence(gaps: &[i64]) -> bool {
    if gaps.is_empty() {
        return false;
    }
    let non_increasing = gaps.windows(2).all(|pair| pair[1] <= pair[0]);
    non_increasing && gaps[gaps.len() - 1] <= RAPID_GAP_DAYS
}

/// Most recent inter-conflict gap, shrunk to 80% (never below one day) when
/// the recurrence trend is accelerating. None with fewer than two conflicts.
fn predict_next_gap(scoped: &[&Conflict], accelerating: bool) -> Option<i64> {
    if scoped.len() < 2 {
        return None;
    }
    let last = scoped[scoped.len() - 1];
    let previous = scoped[scoped.len() - 2];
    let last_gap = (last.started_at - previous.started_at).num_days();

    if accelerating {
        Some(((last_gap as f64 * 0.8).round() as i64).max(1))
    } else {
        Some(last_gap)
    }
}

fn build_recommendations(
    scoped: &[&Conflict],
    top_phrase: Option<&PhraseStats>,
    accelerating: bool,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(oldest_unresolved) = scoped.iter().find(|c| !c.is_resolved) {
        recommendations.push(format!(
            "Revisit the unresolved conflict about '{}' from {}; it has been open the longest.",
            oldest_unresolved.topic,
            oldest_unresolved.started_at.format("%Y-%m-%d")
        ));
    }

    if let Some(stats) = top_phrase {
        if stats.escalation_rate > 0.0 {
            recommendations.push(format!(
                "Watch for the phrase \"{}\"; it escalated {:.0}% of the conversations it appeared in.",
                stats.phrase,
                stats.escalation_rate * 100.0
            ));
        }
    }

    if accelerating {
        recommendations.push(
            "Conflicts are recurring at shorter intervals; consider a repair conversation soon."
                .to_string(),
        );
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn conflict(
        relationship_id: Uuid,
        days_ago: i64,
        resentment_level: Option<i32>,
        is_resolved: bool,
    ) -> Conflict {
        Conflict {
            id: Uuid::new_v4(),
            relationship_id,
            topic: "chores".to_string(),
            started_at: fixed_now() - Duration::days(days_ago),
            resentment_level,
            unmet_needs: vec![],
            has_past_references: false,
            parent_conflict_id: None,
            is_resolved,
            resolved_at: None,
        }
    }

    #[test]
    fn no_conflicts_yields_zero_report() {
        let report = score(Uuid::new_v4(), &[], None, fixed_now());
        assert_eq!(report.risk_score, 0.0);
        assert_eq!(report.interpretation, RiskLevel::Low);
        assert_eq!(report.unresolved_issues, 0);
        assert_eq!(report.days_until_predicted_conflict, None);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn bucket_boundaries_are_lower_inclusive() {
        assert_eq!(interpret(0.0), RiskLevel::Low);
        assert_eq!(interpret(0.2499), RiskLevel::Low);
        assert_eq!(interpret(0.25), RiskLevel::Medium);
        assert_eq!(interpret(0.4999), RiskLevel::Medium);
        assert_eq!(interpret(0.5), RiskLevel::High);
        assert_eq!(interpret(0.75), RiskLevel::Critical);
        assert_eq!(interpret(1.0), RiskLevel::Critical);
    }

    #[test]
    fn shrinking_gaps_with_high_resentment_is_critical() {
        let relationship_id = Uuid::new_v4();
        // Gaps of 10, 6, and 3 days, most recent conflict yesterday.
        let conflicts = vec![
            conflict(relationship_id, 20, Some(8), false),
            conflict(relationship_id, 10, Some(8), false),
            conflict(relationship_id, 4, Some(8), false),
            conflict(relationship_id, 1, Some(8), false),
        ];

        let report = score(relationship_id, &conflicts, None, fixed_now());

        let expected = 0.4 * (4.0 / 5.0) + 0.3 * 0.8 + 0.2 * (1.0 - 1.0 / 30.0) + 0.1 * 0.8;
        assert!((report.risk_score - expected).abs() < 1e-9);
        assert!(report.risk_score >= 0.75);
        assert_eq!(report.interpretation, RiskLevel::Critical);
        assert_eq!(report.unresolved_issues, 4);
        // Last gap was 3 days and the trend is accelerating: 3 * 0.8 rounds to 2.
        assert_eq!(report.days_until_predicted_conflict, Some(2));
    }

    #[test]
    fn risk_score_stays_bounded_under_saturation() {
        let relationship_id = Uuid::new_v4();
        let conflicts: Vec<Conflict> = (0..40)
            .map(|i| conflict(relationship_id, i, Some(10), false))
            .collect();

        let report = score(relationship_id, &conflicts, None, fixed_now());
        assert!(report.risk_score <= 1.0);
        assert!(report.risk_score >= 0.0);
    }

    #[test]
    fn missing_resentment_is_excluded_not_zeroed() {
        let relationship_id = Uuid::new_v4();
        let conflicts = vec![
            conflict(relationship_id, 10, Some(8), true),
            conflict(relationship_id, 7, None, true),
            conflict(relationship_id, 2, Some(6), true),
        ];

        let report = score(relationship_id, &conflicts, None, fixed_now());

        // Mean of {8, 6} only; the absent reading must not pull it toward 0.
        let resentment = 7.0 / 10.0;
        let recency = 1.0 - 2.0 / 30.0;
        let expected = 0.3 * resentment + 0.2 * recency + 0.1 * 0.3;
        assert!((report.risk_score - expected).abs() < 1e-9);
    }

    #[test]
    fn stale_window_falls_back_to_latest_reading() {
        let relationship_id = Uuid::new_v4();
        let conflicts = vec![
            conflict(relationship_id, 90, Some(4), true),
            conflict(relationship_id, 45, Some(9), true),
        ];

        let report = score(relationship_id, &conflicts, None, fixed_now());

        // No conflicts in the trailing 30 days: resentment comes from the
        // most recent conflict, recency floors at 0.
        let expected = 0.3 * 0.9 + 0.1 * 0.3;
        assert!((report.risk_score - expected).abs() < 1e-9);
        assert_eq!(report.days_until_predicted_conflict, Some(45));
    }

    #[test]
    fn single_conflict_has_no_prediction() {
        let relationship_id = Uuid::new_v4();
        let conflicts = vec![conflict(relationship_id, 3, Some(5), false)];

        let report = score(relationship_id, &conflicts, None, fixed_now());
        assert_eq!(report.days_until_predicted_conflict, None);
    }

    #[test]
    fn steady_gaps_hold_the_prediction() {
        let relationship_id = Uuid::new_v4();
        // Gaps of 5 then 10 days: widening, so no acceleration adjustment.
        let conflicts = vec![
            conflict(relationship_id, 17, Some(5), true),
            conflict(relationship_id, 12, Some(5), true),
            conflict(relationship_id, 2, Some(5), true),
        ];

        let report = score(relationship_id, &conflicts, None, fixed_now());
        assert_eq!(report.days_until_predicted_conflict, Some(10));
    }

    #[test]
    fn other_relationships_are_filtered_out() {
        let relationship_id = Uuid::new_v4();
        let conflicts = vec![conflict(Uuid::new_v4(), 1, Some(10), false)];

        let report = score(relationship_id, &conflicts, None, fixed_now());
        assert_eq!(report.risk_score, 0.0);
        assert_eq!(report.unresolved_issues, 0);
    }

    #[test]
    fn recommendations_name_oldest_unresolved_and_top_phrase() {
        let relationship_id = Uuid::new_v4();
        let mut oldest = conflict(relationship_id, 25, Some(6), false);
        oldest.topic = "money".to_string();
        let conflicts = vec![
            oldest,
            conflict(relationship_id, 10, Some(6), true),
            conflict(relationship_id, 2, Some(6), false),
        ];
        let top_phrase = PhraseStats {
            phrase: "you always do this".to_string(),
            category: "absolutes".to_string(),
            usage_count: 8,
            avg_intensity: 7.5,
            escalation_rate: 0.75,
        };

        let report = score(relationship_id, &conflicts, Some(&top_phrase), fixed_now());

        assert!(report.recommendations[0].contains("money"));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("you always do this") && r.contains("75%")));
    }
}
