use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use ayurwell_core::{
    constitution_profile, daily_schedule, diet_plan, AnswerSet, Dosha, PrakritiClassifier,
    TieBreak, QUESTION_COUNT,
};
use ayurwell_observability::{init_tracing, AppMetrics};
use ayurwell_storage::Store;
use ayurwell_wellness::WellnessService;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ayurwell")]
#[command(about = "AyurWell Prakriti tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the questionnaire.
    Questions,
    /// Classify one dosha tag per question, in question order.
    Classify {
        answers: Vec<String>,
        #[arg(long, env = "AYURWELL_TIE_BREAK", default_value = "last")]
        tie_break: String,
    },
    Diet {
        prakriti: String,
    },
    Schedule {
        prakriti: String,
    },
    Profile {
        prakriti: String,
    },
    /// Admin counts from AYURWELL_DATABASE_URL, or an empty in-memory store.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("ayurwell_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Questions => {
            print_json(&ayurwell_core::questionnaire())?;
        }
        Command::Classify { answers, tie_break } => {
            let tie_break = TieBreak::parse(&tie_break).context("invalid --tie-break value")?;
            let classifier = PrakritiClassifier::new(QUESTION_COUNT, tie_break);
            let result = classifier
                .classify_set(&AnswerSet::Ordered(
                    answers.into_iter().map(Some).collect(),
                ))
                .context("answers rejected")?;
            print_json(&serde_json::json!({
                "prakritiType": result.prakriti_type,
                "score": result.score,
                "contenders": result.contenders(),
            }))?;
        }
        Command::Diet { prakriti } => print_json(&diet_plan(parse_dosha(&prakriti)?))?,
        Command::Schedule { prakriti } => print_json(&daily_schedule(parse_dosha(&prakriti)?))?,
        Command::Profile { prakriti } => {
            print_json(&constitution_profile(parse_dosha(&prakriti)?))?
        }
        Command::Stats => {
            let service = build_service().await?;
            let stats = service.admin_stats().await?;
            print_json(&stats)?;
        }
    }

    Ok(())
}

fn parse_dosha(value: &str) -> Result<Dosha> {
    Dosha::from_label(value)
        .or_else(|| Dosha::from_tag(value))
        .with_context(|| format!("unknown prakriti '{value}', expected Vata, Pitta or Kapha"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn build_service() -> Result<WellnessService<Store>> {
    let store = if let Ok(database_url) = env::var("AYURWELL_DATABASE_URL") {
        Store::sqlite(&database_url).await?
    } else {
        Store::memory()
    };

    Ok(WellnessService::new(
        Arc::new(store),
        PrakritiClassifier::default(),
        AppMetrics::shared(),
    ))
}
