//! Command-line front end for insightflow.
//!
//! `insightflow search "<query>"` runs one query end to end and prints the
//! report. `insightflow predict <model-id>` runs a numeric model from a
//! directory of JSON model files.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use insightflow::cancellation::CancellationToken;
use insightflow::config::PipelineConfig;
use insightflow::pipeline::InsightPipeline;
use insightflow::prediction::ModelRegistry;

#[derive(Parser, Debug)]
#[command(name = "insightflow")]
#[command(about = "Search the web and summarize what comes back", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "INSIGHTFLOW_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search, fetch and summarize the top results for a query.
    Search(SearchCmd),
    /// Run a prediction model on a feature vector.
    Predict(PredictCmd),
}

#[derive(Args, Debug)]
struct SearchCmd {
    /// The query text.
    query: String,
    /// Number of results to fetch.
    #[arg(long)]
    num_results: Option<usize>,
    /// Keywords per page.
    #[arg(long)]
    top_k: Option<usize>,
    /// Sentences per summary.
    #[arg(long)]
    max_sentences: Option<usize>,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PredictCmd {
    /// Model identifier.
    model_id: String,
    /// Directory holding `*.json` model files.
    #[arg(long, env = "INSIGHTFLOW_MODELS_DIR", default_value = "models")]
    models_dir: PathBuf,
    /// Comma-separated feature values.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    features: Vec<f64>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,insightflow=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn search(cmd: SearchCmd) -> Result<()> {
    let config = PipelineConfig::from_env().context("invalid configuration")?;
    let pipeline = InsightPipeline::from_config(config).context("failed to build pipeline")?;

    let mut request = pipeline.request(cmd.query);
    if let Some(n) = cmd.num_results {
        request = request.with_num_results(n);
    }
    if let Some(k) = cmd.top_k {
        request = request.with_top_k(k);
    }
    if let Some(n) = cmd.max_sentences {
        request = request.with_max_sentences(n);
    }

    let cancel = CancellationToken::shared();
    let on_signal = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing with partial results");
            on_signal.cancel("interrupted");
        }
    });

    let report = pipeline
        .run_search_with(&request, &cancel, pipeline.config().run_timeout())
        .await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report.to_dict())?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

fn predict(cmd: &PredictCmd) -> Result<()> {
    if cmd.features.is_empty() {
        bail!("--features is required, e.g. --features 0.5,0.8");
    }
    let registry = ModelRegistry::builder()
        .load_dir(&cmd.models_dir)
        .with_context(|| format!("failed to load models from {}", cmd.models_dir.display()))?
        .build();
    let prediction = registry.predict(&cmd.model_id, &cmd.features)?;
    println!("{}", serde_json::json!({ "prediction": [prediction] }));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Search(cmd) => search(cmd).await,
        Commands::Predict(cmd) => predict(&cmd),
    }
}
