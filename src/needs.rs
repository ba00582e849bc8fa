use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ChronicNeed, Conflict, UnmetNeed};

/// A need recurring in at least this many distinct conflicts is chronic.
pub const CHRONIC_THRESHOLD: usize = 3;

/// Flags needs that keep resurfacing across conflicts. Counting is by
/// distinct conflict, so a need extracted twice from one transcript still
/// counts once. Percentage is against the relationship's full conflict
/// history, rounded to two decimals.
pub fn detect_chronic_needs(
    relationship_id: Uuid,
    conflicts: &[Conflict],
    needs: &[UnmetNeed],
) -> Vec<ChronicNeed> {
    let total_conflicts = conflicts
        .iter()
        .filter(|c| c.relationship_id == relationship_id)
        .count();

    let mut groups: HashMap<&str, (HashSet<Uuid>, DateTime<Utc>)> = HashMap::new();
    for need in needs.iter().filter(|n| n.relationship_id == relationship_id) {
        let entry = groups
            .entry(need.need.as_str())
            .or_insert_with(|| (HashSet::new(), need.first_identified_at));
        entry.0.insert(need.conflict_id);
        if need.first_identified_at < entry.1 {
            entry.1 = need.first_identified_at;
        }
    }

    let mut chronic: Vec<ChronicNeed> = groups
        .into_iter()
        .map(|(need, (conflict_ids, first_appeared))| {
            let conflict_count = conflict_ids.len();
            let percentage = if total_conflicts == 0 {
                0.0
            } else {
                let raw = conflict_count as f64 / total_conflicts as f64 * 100.0;
                (raw * 100.0).round() / 100.0
            };
            ChronicNeed {
                need: need.to_string(),
                conflict_count,
                first_appeared,
                is_chronic: conflict_count >= CHRONIC_THRESHOLD,
                percentage_of_conflicts: percentage,
            }
        })
        .collect();

    chronic.sort_by(|a, b| {
        b.conflict_count
            .cmp(&a.conflict_count)
            .then_with(|| a.need.cmp(&b.need))
    });
    chronic
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn conflict(relationship_id: Uuid, days_ago: i64) -> Conflict {
        Conflict {
            id: Uuid::new_v4(),
            relationship_id,
            topic: "topic".to_string(),
            started_at: fixed_now() - Duration::days(days_ago),
            resentment_level: None,
            unmet_needs: vec![],
            has_past_references: false,
            parent_conflict_id: None,
            is_resolved: false,
            resolved_at: None,
        }
    }

    fn need(
        relationship_id: Uuid,
        conflict_id: Uuid,
        tag: &str,
        days_ago: i64,
    ) -> UnmetNeed {
        UnmetNeed {
            id: Uuid::new_v4(),
            relationship_id,
            conflict_id,
            need: tag.to_string(),
            confidence: 0.9,
            first_identified_at: fixed_now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn three_distinct_conflicts_out_of_ten_is_chronic_at_thirty_percent() {
        let relationship_id = Uuid::new_v4();
        let conflicts: Vec<Conflict> =
            (0..10).map(|i| conflict(relationship_id, i)).collect();
        let needs = vec![
            need(relationship_id, conflicts[0].id, "feeling_heard", 0),
            need(relationship_id, conflicts[3].id, "feeling_heard", 3),
            need(relationship_id, conflicts[7].id, "feeling_heard", 7),
        ];

        let chronic = detect_chronic_needs(relationship_id, &conflicts, &needs);

        assert_eq!(chronic.len(), 1);
        assert_eq!(chronic[0].conflict_count, 3);
        assert!(chronic[0].is_chronic);
        assert_eq!(chronic[0].percentage_of_conflicts, 30.0);
        assert_eq!(chronic[0].first_appeared, fixed_now() - Duration::days(7));
    }

    #[test]
    fn two_conflicts_is_not_chronic() {
        let relationship_id = Uuid::new_v4();
        let conflicts: Vec<Conflict> =
            (0..4).map(|i| conflict(relationship_id, i)).collect();
        let needs = vec![
            need(relationship_id, conflicts[0].id, "autonomy", 0),
            need(relationship_id, conflicts[1].id, "autonomy", 1),
        ];

        let chronic = detect_chronic_needs(relationship_id, &conflicts, &needs);

        assert_eq!(chronic.len(), 1);
        assert!(!chronic[0].is_chronic);
        assert_eq!(chronic[0].conflict_count, 2);
        assert_eq!(chronic[0].percentage_of_conflicts, 50.0);
    }

    #[test]
    fn duplicate_rows_in_one_conflict_count_once() {
        let relationship_id = Uuid::new_v4();
        let conflicts = vec![conflict(relationship_id, 0), conflict(relationship_id, 1)];
        let needs = vec![
            need(relationship_id, conflicts[0].id, "respect", 0),
            need(relationship_id, conflicts[0].id, "respect", 0),
            need(relationship_id, conflicts[0].id, "respect", 0),
        ];

        let chronic = detect_chronic_needs(relationship_id, &conflicts, &needs);

        assert_eq!(chronic[0].conflict_count, 1);
        assert!(!chronic[0].is_chronic);
    }

    #[test]
    fn zero_conflicts_yields_zero_percentage() {
        let relationship_id = Uuid::new_v4();
        let orphan = need(relationship_id, Uuid::new_v4(), "security", 0);

        let chronic = detect_chronic_needs(relationship_id, &[], &[orphan]);

        assert_eq!(chronic.len(), 1);
        assert_eq!(chronic[0].percentage_of_conflicts, 0.0);
    }

    #[test]
    fn sorts_by_conflict_count_then_name() {
        let relationship_id = Uuid::new_v4();
        let conflicts: Vec<Conflict> =
            (0..3).map(|i| conflict(relationship_id, i)).collect();
        let mut needs = Vec::new();
        for c in &conflicts {
            needs.push(need(relationship_id, c.id, "quality_time", 1));
        }
        needs.push(need(relationship_id, conflicts[0].id, "appreciation", 1));
        needs.push(need(relationship_id, conflicts[1].id, "appreciation", 1));
        needs.push(need(relationship_id, conflicts[0].id, "autonomy", 1));
        needs.push(need(relationship_id, conflicts[1].id, "autonomy", 1));

        let chronic = detect_chronic_needs(relationship_id, &conflicts, &needs);

        assert_eq!(chronic[0].need, "quality_time");
        assert_eq!(chronic[1].need, "appreciation");
        assert_eq!(chronic[2].need, "autonomy");
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        let relationship_id = Uuid::new_v4();
        let conflicts: Vec<Conflict> =
            (0..3).map(|i| conflict(relationship_id, i)).collect();
        let needs = vec![need(relationship_id, conflicts[0].id, "rest", 0)];

        let chronic = detect_chronic_needs(relationship_id, &conflicts, &needs);

        // 1/3 of conflicts: 33.333... rounds to 33.33.
        assert_eq!(chronic[0].percentage_of_conflicts, 33.33);
    }
}
