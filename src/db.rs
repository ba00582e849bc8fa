use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Conflict, TriggerPhrase, UnmetNeed};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Fixed relationship id used by the seed fixtures, so the CLI can be
/// exercised immediately after `seed`.
pub const SEED_RELATIONSHIP: &str = "7d3f0e8a-5b1c-4f2d-9a6e-1c8b4d7f2a93";

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let relationship_id = Uuid::parse_str(SEED_RELATIONSHIP)?;
    let base = Utc
        .with_ymd_and_hms(2026, 1, 5, 20, 30, 0)
        .single()
        .context("invalid seed timestamp")?;

    sqlx::query(
        r#"
        INSERT INTO conflict_insights.relationships (id, partner_a, partner_b)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(relationship_id)
    .bind("Sam")
    .bind("Riley")
    .execute(pool)
    .await?;

    // Three conflicts forming one causal chain plus a standalone one,
    // spaced with shrinking gaps.
    let chain_root = Uuid::parse_str("f1a2b3c4-0001-4000-8000-000000000001")?;
    let chain_mid = Uuid::parse_str("f1a2b3c4-0002-4000-8000-000000000002")?;
    let chain_tip = Uuid::parse_str("f1a2b3c4-0003-4000-8000-000000000003")?;
    let standalone = Uuid::parse_str("f1a2b3c4-0004-4000-8000-000000000004")?;

    let conflicts: Vec<(Uuid, &str, DateTime<Utc>, Option<i32>, Vec<&str>, Option<Uuid>, bool)> = vec![
        (
            chain_root,
            "splitting the chores",
            base,
            Some(4),
            vec!["appreciation"],
            None,
            true,
        ),
        (
            chain_mid,
            "weekend plans fell through",
            base + Duration::days(12),
            Some(6),
            vec!["quality_time", "appreciation"],
            Some(chain_root),
            false,
        ),
        (
            chain_tip,
            "tone during dinner",
            base + Duration::days(19),
            Some(8),
            vec!["feeling_heard", "appreciation"],
            Some(chain_mid),
            false,
        ),
        (
            standalone,
            "budget for the trip",
            base + Duration::days(23),
            Some(7),
            vec!["security"],
            None,
            false,
        ),
    ];

    for (id, topic, started_at, resentment, needs, parent, resolved) in conflicts {
        let need_tags: Vec<String> = needs.iter().map(|n| n.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO conflict_insights.conflicts
            (id, relationship_id, topic, started_at, resentment_level, unmet_needs,
             has_past_references, parent_conflict_id, is_resolved, resolved_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(relationship_id)
        .bind(topic)
        .bind(started_at)
        .bind(resentment)
        .bind(&need_tags)
        .bind(parent.is_some())
        .bind(parent)
        .bind(resolved)
        .bind(if resolved { Some(started_at + Duration::days(1)) } else { None })
        .bind(format!("seed-conflict-{id}"))
        .execute(pool)
        .await?;
    }

    let phrases: Vec<(Uuid, &str, &str, &str, i32, f64, bool)> = vec![
        (chain_mid, "you always cancel on me", "absolutes", "partner_a", 8, 42.0, true),
        (chain_mid, "fine, whatever", "dismissive", "partner_b", 5, 118.0, false),
        (chain_tip, "here we go again", "temporal_reference", "partner_b", 7, 12.0, true),
        (chain_tip, "you always cancel on me", "absolutes", "partner_a", 9, 65.0, true),
        (chain_tip, "fine, whatever", "dismissive", "partner_b", 6, 130.0, false),
        (standalone, "we can't afford that", "catastrophizing", "partner_a", 6, 30.0, false),
    ];

    for (conflict_id, text, category, speaker, intensity, offset, is_trigger) in phrases {
        sqlx::query(
            r#"
            INSERT INTO conflict_insights.trigger_phrases
            (id, relationship_id, conflict_id, phrase, category, speaker,
             emotional_intensity, timestamp_in_transcript, is_pattern_trigger,
             references_past_conflict, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(relationship_id)
        .bind(conflict_id)
        .bind(text)
        .bind(category)
        .bind(speaker)
        .bind(intensity)
        .bind(offset)
        .bind(is_trigger)
        .bind(category == "temporal_reference")
        .bind(format!("seed-phrase-{conflict_id}-{offset}"))
        .execute(pool)
        .await?;
    }

    let needs: Vec<(Uuid, &str, f64, DateTime<Utc>)> = vec![
        (chain_root, "appreciation", 0.82, base),
        (chain_mid, "appreciation", 0.91, base + Duration::days(12)),
        (chain_mid, "quality_time", 0.77, base + Duration::days(12)),
        (chain_tip, "appreciation", 0.88, base + Duration::days(19)),
        (chain_tip, "feeling_heard", 0.84, base + Duration::days(19)),
        (standalone, "security", 0.79, base + Duration::days(23)),
    ];

    for (conflict_id, need, confidence, first_identified_at) in needs {
        sqlx::query(
            r#"
            INSERT INTO conflict_insights.unmet_needs
            (id, relationship_id, conflict_id, need, confidence, first_identified_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(relationship_id)
        .bind(conflict_id)
        .bind(need)
        .bind(confidence)
        .bind(first_identified_at)
        .bind(format!("seed-need-{conflict_id}-{need}"))
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_conflicts(
    pool: &PgPool,
    relationship_id: Uuid,
) -> anyhow::Result<Vec<Conflict>> {
    let rows = sqlx::query(
        r#"
        SELECT id, relationship_id, topic, started_at, resentment_level,
               unmet_needs, has_past_references, parent_conflict_id,
               is_resolved, resolved_at
        FROM conflict_insights.conflicts
        WHERE relationship_id = $1
        ORDER BY started_at
        "#,
    )
    .bind(relationship_id)
    .fetch_all(pool)
    .await?;

    let mut conflicts = Vec::new();
    for row in rows {
        conflicts.push(Conflict {
            id: row.get("id"),
            relationship_id: row.get("relationship_id"),
            topic: row.get("topic"),
            started_at: row.get("started_at"),
            resentment_level: row.get("resentment_level"),
            unmet_needs: row.get("unmet_needs"),
            has_past_references: row.get("has_past_references"),
            parent_conflict_id: row.get("parent_conflict_id"),
            is_resolved: row.get("is_resolved"),
            resolved_at: row.get("resolved_at"),
        });
    }

    Ok(conflicts)
}

pub async fn fetch_trigger_phrases(
    pool: &PgPool,
    relationship_id: Uuid,
) -> anyhow::Result<Vec<TriggerPhrase>> {
    let rows = sqlx::query(
        r#"
        SELECT id, relationship_id, conflict_id, phrase, category, speaker,
               emotional_intensity, timestamp_in_transcript,
               is_pattern_trigger, references_past_conflict
        FROM conflict_insights.trigger_phrases
        WHERE relationship_id = $1
        ORDER BY conflict_id, timestamp_in_transcript
        "#,
    )
    .bind(relationship_id)
    .fetch_all(pool)
    .await?;

    let mut phrases = Vec::new();
    for row in rows {
        phrases.push(TriggerPhrase {
            id: row.get("id"),
            relationship_id: row.get("relationship_id"),
            conflict_id: row.get("conflict_id"),
            phrase: row.get("phrase"),
            category: row.get("category"),
            speaker: row.get("speaker"),
            emotional_intensity: row.get("emotional_intensity"),
            timestamp_in_transcript: row.get("timestamp_in_transcript"),
            is_pattern_trigger: row.get("is_pattern_trigger"),
            references_past_conflict: row.get("references_past_conflict"),
        });
    }

    Ok(phrases)
}

pub async fn fetch_unmet_needs(
    pool: &PgPool,
    relationship_id: Uuid,
) -> anyhow::Result<Vec<UnmetNeed>> {
    let rows = sqlx::query(
        r#"
        SELECT id, relationship_id, conflict_id, need, confidence, first_identified_at
        FROM conflict_insights.unmet_needs
        WHERE relationship_id = $1
        ORDER BY first_identified_at
        "#,
    )
    .bind(relationship_id)
    .fetch_all(pool)
    .await?;

    let mut needs = Vec::new();
    for row in rows {
        needs.push(UnmetNeed {
            id: row.get("id"),
            relationship_id: row.get("relationship_id"),
            conflict_id: row.get("conflict_id"),
            need: row.get("need"),
            confidence: row.get("confidence"),
            first_identified_at: row.get("first_identified_at"),
        });
    }

    Ok(needs)
}

/// Bulk conflict import from an enrichment-pipeline export. Rows carry a
/// source key so re-imports are idempotent.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        relationship_id: Uuid,
        topic: String,
        started_at: DateTime<Utc>,
        resentment_level: Option<i32>,
        /// Semicolon-separated need tags.
        unmet_needs: Option<String>,
        has_past_references: bool,
        parent_conflict_id: Option<Uuid>,
        is_resolved: bool,
        resolved_at: Option<DateTime<Utc>>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        sqlx::query(
            r#"
            INSERT INTO conflict_insights.relationships (id, partner_a, partner_b)
            VALUES ($1, 'unknown', 'unknown')
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(row.relationship_id)
        .execute(pool)
        .await?;

        let need_tags: Vec<String> = row
            .unmet_needs
            .as_deref()
            .unwrap_or("")
            .split(';')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO conflict_insights.conflicts
            (id, relationship_id, topic, started_at, resentment_level, unmet_needs,
             has_past_references, parent_conflict_id, is_resolved, resolved_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.relationship_id)
        .bind(&row.topic)
        .bind(row.started_at)
        .bind(row.resentment_level)
        .bind(&need_tags)
        .bind(row.has_past_references)
        .bind(row.parent_conflict_id)
        .bind(row.is_resolved)
        .bind(row.resolved_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
