use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

mod attributes;
mod balance;
mod db;
mod distribution;
mod error;
#[cfg(test)]
mod fixtures;
mod models;
mod pipeline;
mod projector;
mod report;
mod sizer;

use balance::GenderOverflow;
use pipeline::BalanceOptions;

#[derive(Parser)]
#[command(name = "cohort-teams")]
#[command(about = "Balanced project team formation for Group Scholar cohorts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Create a demo survey form with synthetic responses
    Seed {
        #[arg(long, value_delimiter = ',', default_value = "A,B")]
        sections: Vec<String>,
        #[arg(long, default_value_t = 24)]
        per_section: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Replace a form's teams with a freshly balanced set
    Generate {
        #[arg(long)]
        form_id: Uuid,
        /// Seed for tie-breaking, for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Stop gender balancing for all later sections when one overflows
        #[arg(long)]
        halt_on_female_overflow: bool,
    },
    /// Generate a markdown roster report
    Report {
        #[arg(long)]
        form_id: Uuid,
        #[arg(long, default_value = "teams.md")]
        out: PathBuf,
    },
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "groupscholar_team_formation=info,cohort_teams=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
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
        Commands::Seed {
            sections,
            per_section,
            seed,
        } => {
            let mut rng = rng_from(seed);
            let form_id = db::seed(&pool, &sections, per_section, &mut rng).await?;
            println!(
                "Seeded form {form_id} with {per_section} responses in each of {} sections.",
                sections.len()
            );
        }
        Commands::Generate {
            form_id,
            seed,
            halt_on_female_overflow,
        } => {
            let options = BalanceOptions {
                gender_overflow: if halt_on_female_overflow {
                    GenderOverflow::HaltRemainingSections
                } else {
                    GenderOverflow::SkipSection
                },
            };
            let mut rng = rng_from(seed);
            let teams = db::generate_teams(&pool, form_id, &options, &mut rng).await?;

            if teams.is_empty() {
                println!("No responses found for this form.");
                return Ok(());
            }

            println!("Generated {} teams:", teams.len());
            for team in &teams {
                let names: Vec<&str> = team.members.iter().map(|m| m.name.as_str()).collect();
                println!("- {} (section {}): {}", team.name, team.section, names.join(", "));
            }
        }
        Commands::Report { form_id, out } => {
            let title = db::fetch_form_title(&pool, form_id).await?;
            let teams = db::fetch_teams(&pool, form_id).await?;
            let report = report::build_report(&title, &teams);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
