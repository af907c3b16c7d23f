//! `safeguard` command-line interface.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use safeguard_core::{classify_offline, ClassificationRequest, ClassificationResponse, TierTable};
use safeguard_runtime::{
    ChatResponse, HealthReport, ProviderRegistry, ProviderStatus, RuntimeConfig, SafetyPipeline,
    SafetyPipelineBuilder,
};

#[derive(Parser)]
#[command(name = "safeguard", author, version, about = "Health content safety classification")]
struct Cli {
    /// Log filter used when neither RUST_LOG nor LOG_LEVEL is set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a piece of content
    Evaluate {
        /// Content to classify; use "-" or omit to read stdin
        content: Option<String>,

        /// User context entry, repeatable (e.g. --context age=45)
        #[arg(long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// JSON object file with user context
        #[arg(long, value_name = "FILE")]
        context_file: Option<PathBuf>,

        /// File holding the encoded image payload
        #[arg(long, value_name = "FILE")]
        image: Option<PathBuf>,

        /// Skip search and LLM providers entirely
        #[arg(long)]
        offline: bool,

        /// Runtime config file (YAML)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate an answer to a question and screen it
    Chat {
        message: String,

        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
    /// Show the credibility tier of a source URL
    Tier {
        url: String,

        /// Custom tier table (YAML or JSON)
        #[arg(long, value_name = "FILE")]
        tier_table: Option<PathBuf>,
    },
    /// Validate a tier table file
    ValidateTiers { file: PathBuf },
    /// Show service information and configured providers
    Info {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}

/// Initialize tracing on stderr, so stdout stays clean for `--json`.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Evaluate {
            content,
            context,
            context_file,
            image,
            offline,
            config,
            json,
        } => {
            let request =
                build_request(content, &context, context_file.as_deref(), image.as_deref())?;
            let response = if offline {
                classify_offline(&request)?
            } else {
                load_pipeline(config.as_deref())?.classify(&request).await?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_classification(&response);
            }
        }
        Commands::Chat {
            message,
            config,
            json,
        } => {
            let response = load_pipeline(config.as_deref())?.chat(&message).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_chat(&response);
            }
        }
        Commands::Tier { url, tier_table } => {
            let table = match tier_table {
                Some(path) => TierTable::from_file(&path)
                    .with_context(|| format!("Failed to load tier table: {}", path.display()))?,
                None => TierTable::builtin().clone(),
            };
            let (tier, confidence) = table.classify(&url);
            println!("{url}");
            println!("  {} ({}), confidence {}", tier, table.label(tier), confidence);
        }
        Commands::ValidateTiers { file } => {
            let table = TierTable::from_file(&file)
                .with_context(|| format!("Invalid tier table: {}", file.display()))?;
            let domains: usize = table.tiers.iter().map(|t| t.domains.len()).sum();
            println!(
                "{}: valid (version {}, {} domains)",
                file.display(),
                table.table_version,
                domains
            );
        }
        Commands::Info { config, json } => {
            let health = load_pipeline(config.as_deref())?.health().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                print_health(&health);
            }
        }
    }

    Ok(())
}

fn load_pipeline(config: Option<&Path>) -> Result<SafetyPipeline> {
    match config {
        Some(path) => SafetyPipeline::from_config_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => {
            let config = RuntimeConfig::from_env().context("Invalid SAFEGUARD_* environment")?;
            Ok(SafetyPipelineBuilder::from_config(&config)?.build())
        }
    }
}

fn build_request(
    content: Option<String>,
    context: &[String],
    context_file: Option<&Path>,
    image: Option<&Path>,
) -> Result<ClassificationRequest> {
    let content = match content.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read content from stdin")?;
            buf
        }
        Some(text) => text.to_string(),
    };

    let mut request = ClassificationRequest::text(content);

    if let Some(path) = context_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file: {}", path.display()))?;
        request.user_context = serde_json::from_str(&raw)
            .with_context(|| format!("Context file must be a JSON object: {}", path.display()))?;
    }

    for entry in context {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("Context entries must look like KEY=VALUE, got '{entry}'");
        };
        // Numbers and booleans keep their JSON type, anything else is a string
        let value = serde_json::from_str(value.trim())
            .unwrap_or_else(|_| serde_json::Value::String(value.trim().to_string()));
        request = request.with_context(key.trim(), value);
    }

    if let Some(path) = image {
        let payload = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read image payload: {}", path.display()))?;
        request = request.with_image(payload.trim());
    }

    Ok(request)
}

fn print_classification(response: &ClassificationResponse) {
    println!("Decision:    {} ({})", response.decision, response.severity);
    println!("Reason:      {}", response.details.decision_reason);
    println!("Explanation: {}", response.explanation);
    if response.generated_by != safeguard_core::GENERATED_BY_FALLBACK {
        println!("             (generated by {})", response.generated_by);
    }

    for summary in &response.details.evidence_summary {
        println!();
        println!("Claim: {}", summary.claim);
        println!(
            "  {} / {}, {} trusted source(s){}",
            summary.status,
            summary.confidence_level,
            summary.trusted_count,
            if summary.fallback_applied { " [search unavailable]" } else { "" }
        );
        for source in summary
            .tier1_sources
            .iter()
            .chain(&summary.tier2_sources)
            .chain(&summary.tier3_sources)
        {
            println!(
                "  - [{} {}] {} <{}>",
                source.tier, source.label, source.title, source.url
            );
        }
    }
}

fn print_health(health: &HealthReport) {
    println!("{} {} ({})", health.service, health.version, health.status);

    let search = if health.search_providers.is_empty() {
        "none (fallback assessment)".to_string()
    } else {
        health.search_providers.join(" -> ")
    };
    println!("  search:      {search}");

    let describe = |status: &Option<ProviderStatus>, missing: &str| match status {
        Some(s) if s.ready => s.provider.clone(),
        Some(s) => format!("{} (not ready)", s.provider),
        None => missing.to_string(),
    };
    println!("  explanation: {}", describe(&health.explanation, "none (fallback text)"));
    println!("  chat:        {}", describe(&health.chat, "disabled"));
    println!("  tier table:  version {}", health.tier_table_version);

    println!();
    println!("Available LLM backends:");
    for (name, description) in ProviderRegistry::with_builtin().describe() {
        println!("  {name:<8} {description}");
    }
}

fn print_chat(response: &ChatResponse) {
    match &response.filtered_response {
        Some(answer) => println!("{answer}"),
        None => println!("[answer withheld]"),
    }
    println!();
    println!("Decision:    {} ({})", response.decision, response.severity);
    println!("Explanation: {}", response.explanation);
}
