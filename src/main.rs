use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod chains;
mod db;
mod models;
mod needs;
mod phrases;
mod report;
mod risk;

#[derive(Parser)]
#[command(name = "conflict-insights")]
#[command(about = "Conflict intelligence and escalation analytics for Tandem", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import enriched conflicts from a CSV export
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Escalation risk score for one relationship
    Risk {
        #[arg(long)]
        relationship: Uuid,
    },
    /// Causal conflict chains for one relationship
    Chains {
        #[arg(long)]
        relationship: Uuid,
    },
    /// Trigger phrase statistics for one relationship
    Phrases {
        #[arg(long)]
        relationship: Uuid,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Recurring phrase sequences in the trailing 90 days
    Sequences {
        #[arg(long)]
        relationship: Uuid,
        #[arg(long, default_value_t = phrases::DEFAULT_SEQUENCE_WINDOW)]
        window_size: usize,
    },
    /// Chronic unmet needs for one relationship
    Needs {
        #[arg(long)]
        relationship: Uuid,
    },
    /// Full analytics report, markdown or JSON
    Report {
        #[arg(long)]
        relationship: Uuid,
        #[arg(long, default_value_t = phrases::DEFAULT_SEQUENCE_WINDOW)]
        window_size: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

struct RecordSet {
    conflicts: Vec<models::Conflict>,
    trigger_phrases: Vec<models::TriggerPhrase>,
    unmet_needs: Vec<models::UnmetNeed>,
}

/// One snapshot per invocation; the analytics run entirely in memory after
/// this.
async fn fetch_records(pool: &PgPool, relationship: Uuid) -> anyhow::Result<RecordSet> {
    Ok(RecordSet {
        conflicts: db::fetch_conflicts(pool, relationship).await?,
        trigger_phrases: db::fetch_trigger_phrases(pool, relationship).await?,
        unmet_needs: db::fetch_unmet_needs(pool, relationship).await?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!(
                "Seed data inserted for relationship {}.",
                db::SEED_RELATIONSHIP
            );
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} conflicts from {}.", csv.display());
        }
        Commands::Risk { relationship } => {
            let records = fetch_records(&pool, relationship).await?;
            let stats = phrases::analyze_phrases(relationship, &records.trigger_phrases);
            let report = risk::score(relationship, &records.conflicts, stats.first(), Utc::now());

            println!(
                "Risk score {:.2} ({}) across {} conflicts, {} unresolved",
                report.risk_score,
                report.interpretation.as_str(),
                records.conflicts.len(),
                report.unresolved_issues
            );
            match report.days_until_predicted_conflict {
                Some(days) => println!("Next conflict predicted in roughly {days} days."),
                None => println!("Not enough history to predict the next conflict."),
            }
            for recommendation in &report.recommendations {
                println!("- {recommendation}");
            }
        }
        Commands::Chains { relationship } => {
            let conflicts = db::fetch_conflicts(&pool, relationship).await?;
            let traced = chains::trace_chains(relationship, &conflicts);

            if traced.is_empty() {
                println!("No linked conflicts for this relationship.");
            } else {
                for chain in &traced {
                    println!(
                        "- '{}' traces back to '{}' across {} conflicts ({} resolved)",
                        chain.surface_issue,
                        chain.root_cause,
                        chain.conflicts.len(),
                        chain.resolution_attempts
                    );
                }
            }
        }
        Commands::Phrases {
            relationship,
            limit,
        } => {
            let trigger_phrases = db::fetch_trigger_phrases(&pool, relationship).await?;
            let stats = phrases::analyze_phrases(relationship, &trigger_phrases);

            if stats.is_empty() {
                println!("No trigger phrases for this relationship.");
            } else {
                for entry in stats.iter().take(limit) {
                    println!(
                        "- \"{}\" ({}): {} uses, avg intensity {:.1}, escalation rate {:.2}",
                        entry.phrase,
                        entry.category,
                        entry.usage_count,
                        entry.avg_intensity,
                        entry.escalation_rate
                    );
                }
            }
        }
        Commands::Sequences {
            relationship,
            window_size,
        } => {
            let records = fetch_records(&pool, relationship).await?;
            let sequences = phrases::find_sequences(
                relationship,
                &records.conflicts,
                &records.trigger_phrases,
                window_size,
                Utc::now(),
            );

            if sequences.is_empty() {
                println!("No recurring sequences in the trailing window.");
            } else {
                for sequence in &sequences {
                    println!(
                        "- {} (seen {} times)",
                        sequence.phrases.join(" -> "),
                        sequence.frequency
                    );
                }
            }
        }
        Commands::Needs { relationship } => {
            let records = fetch_records(&pool, relationship).await?;
            let chronic = needs::detect_chronic_needs(
                relationship,
                &records.conflicts,
                &records.unmet_needs,
            );

            if chronic.is_empty() {
                println!("No unmet needs recorded for this relationship.");
            } else {
                for entry in &chronic {
                    println!(
                        "- {}{}: {} conflicts ({:.2}%)",
                        entry.need,
                        if entry.is_chronic { " (chronic)" } else { "" },
                        entry.conflict_count,
                        entry.percentage_of_conflicts
                    );
                }
            }
        }
        Commands::Report {
            relationship,
            window_size,
            out,
            json,
        } => {
            let records = fetch_records(&pool, relationship).await?;
            let analytics = report::build_analytics(
                relationship,
                &records.conflicts,
                &records.trigger_phrases,
                &records.unmet_needs,
                window_size,
                Utc::now(),
            );

            if json {
                let payload = serde_json::to_string_pretty(&analytics)?;
                std::fs::write(&out, payload)?;
            } else {
                std::fs::write(&out, report::render_markdown(&analytics))?;
            }
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
