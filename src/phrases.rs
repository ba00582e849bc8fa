use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{Conflict, PhraseSequence, PhraseStats, TriggerPhrase};

/// Sequence mining only looks at conflicts inside this trailing window.
pub const SEQUENCE_LOOKBACK_DAYS: i64 = 90;
/// Consecutive phrases per mined sequence.
pub const DEFAULT_SEQUENCE_WINDOW: usize = 5;

/// Per-phrase usage statistics, grouped by (phrase, category). Sorted by
/// escalation rate descending, then average intensity descending.
pub fn analyze_phrases(relationship_id: Uuid, phrases: &[TriggerPhrase]) -> Vec<PhraseStats> {
    let mut groups: HashMap<(String, String), (usize, i64, usize)> = HashMap::new();

    for phrase in phrases.iter().filter(|p| p.relationship_id == relationship_id) {
        let entry = groups
            .entry((phrase.phrase.clone(), phrase.category.clone()))
            .or_insert((0, 0, 0));
        entry.0 += 1;
        entry.1 += phrase.emotional_intensity as i64;
        if phrase.is_pattern_trigger {
            entry.2 += 1;
        }
    }

    let mut stats: Vec<PhraseStats> = groups
        .into_iter()
        .map(
            |((phrase, category), (count, total_intensity, trigger_count))| PhraseStats {
                phrase,
                category,
                usage_count: count,
                avg_intensity: total_intensity as f64 / count as f64,
                escalation_rate: trigger_count as f64 / count as f64,
            },
        )
        .collect();

    stats.sort_by(|a, b| {
        b.escalation_rate
            .partial_cmp(&a.escalation_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.avg_intensity
                    .partial_cmp(&a.avg_intensity)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then_with(|| a.phrase.cmp(&b.phrase))
    });
    stats
}

/// Mines recurring phrase sequences: contiguous runs of `window_size`
/// phrases in transcript order, counted across every conflict in the
/// trailing 90 days. Only sequences seen at least twice are reported,
/// most frequent first.
///
/// Runs are strictly contiguous; this is a sliding-window n-gram count,
/// not gapped-subsequence mining.
pub fn find_sequences(
    relationship_id: Uuid,
    conflicts: &[Conflict],
    phrases: &[TriggerPhrase],
    window_size: usize,
    now: DateTime<Utc>,
) -> Vec<PhraseSequence> {
    if window_size == 0 {
        return Vec::new();
    }

    let cutoff = now - Duration::days(SEQUENCE_LOOKBACK_DAYS);
    let recent_conflicts: Vec<Uuid> = conflicts
        .iter()
        .filter(|c| c.relationship_id == relationship_id && c.started_at >= cutoff)
        .map(|c| c.id)
        .collect();

    let mut by_conflict: HashMap<Uuid, Vec<&TriggerPhrase>> = HashMap::new();
    for phrase in phrases.iter().filter(|p| p.relationship_id == relationship_id) {
        by_conflict.entry(phrase.conflict_id).or_default().push(phrase);
    }

    let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
    for conflict_id in &recent_conflicts {
        let mut transcript = match by_conflict.get(conflict_id) {
            Some(phrases) => phrases.clone(),
            None => continue,
        };
        transcript.sort_by(|a, b| {
            a.timestamp_in_transcript
                .partial_cmp(&b.timestamp_in_transcript)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // A conflict with fewer phrases than the window contributes nothing.
        for run in transcript.windows(window_size) {
            let sequence: Vec<String> = run.iter().map(|p| p.phrase.clone()).collect();
            *counts.entry(sequence).or_insert(0) += 1;
        }
    }

    let mut sequences: Vec<PhraseSequence> = counts
        .into_iter()
        .filter(|(_, frequency)| *frequency >= 2)
        .map(|(phrases, frequency)| PhraseSequence { phrases, frequency })
        .collect();

    sequences.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.phrases.cmp(&b.phrases)));
    sequences
}
