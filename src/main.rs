mod api; // HTTP relay routes
mod client;
mod config;
mod error;
mod handlers;
mod models;
mod services;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;

use config::Config;
use handlers::AnalysisHandler;
use models::FoodInput;
use services::{create_provider, PromptTemplate};

/// FitVision relay: food photo or name in, nutrition estimate out.
#[derive(Parser, Debug)]
#[command(name = "fitvision-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP relay (default)
    Serve,

    /// Send one analysis to a running relay and print the report
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Food photo to upload
    #[arg(long, conflicts_with = "food", required_unless_present = "food")]
    image: Option<PathBuf>,

    /// Food name to analyze instead of a photo
    #[arg(long)]
    food: Option<String>,

    /// Height in cm (for BMI)
    #[arg(long)]
    height: Option<f64>,

    /// Weight in kg (for BMI)
    #[arg(long)]
    weight: Option<f64>,

    /// Relay base URL
    #[arg(long, env = "RELAY_URL", default_value = "http://localhost:5000")]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables (RUST_LOG may live in .env)
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Analyze(args) => analyze(args).await,
    }
}

async fn serve() -> Result<()> {
    log::info!("🚀 Starting FitVision relay...");

    let config = Config::from_env()?;
    log::info!("⚙️ AI_PROVIDER={}, RESPONSE_SHAPE={}", config.provider, config.response_shape);

    if config.active_provider().api_key.is_none() {
        log::warn!(
            "⚠️ {} not set, every analysis will fail until it is configured",
            config.api_key_env()
        );
    }

    let provider = create_provider(&config);
    log::info!(
        "✅ {} provider initialized with model: {}",
        provider.name(),
        provider.model()
    );

    let prompts = PromptTemplate::for_shape(config.response_shape)
        .with_overrides(config.image_prompt.clone(), config.text_prompt.clone());
    let handler = Arc::new(AnalysisHandler::new(provider, prompts, config.response_shape));
    log::info!("✅ Analysis handler initialized (shape: {})", handler.shape());

    let app = api::create_router(handler, &config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("🌐 Relay listening on http://{}", addr);
    log::info!("📮 POST http://{}{}", addr, api::ANALYSIS_ROUTE);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("❌ Failed to listen for Ctrl+C: {}", e);
            }
            log::info!("🛑 Shutting down...");
        })
        .await?;

    Ok(())
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let bmi = match (args.height, args.weight) {
        (Some(h), Some(w)) => client::bmi(h, w),
        _ => None,
    };

    let relay = client::RelayClient::new(&args.url);

    let input = match (&args.image, &args.food) {
        (Some(path), _) => client::encode_image_file(path),
        (None, Some(food)) => Ok(FoodInput::Text {
            food_name: food.clone(),
        }),
        (None, None) => Err(client::ClientError::EmptyInput),
    };

    let outcome = match input {
        Ok(input) => relay.analyze(&input).await,
        Err(e) => Err(e),
    };

    if let Err(e) = &outcome {
        log::error!("❌ Analysis failed: {}", e);
    }

    println!("{}", client::render_report(bmi, &outcome));

    exit_result(outcome)
}

/// Failed analyses end with an error so the process exits non-zero.
fn exit_result(outcome: Result<models::AnalysisResult, client::ClientError>) -> Result<()> {
    outcome
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("analysis failed: {}", e))
}
