use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use geofuse_common::{load_config, FusionConfig, FusionContext, LocationCandidate};
use geofuse_engine::{FusionEngine, FusionOutcome, FusionRequest};

#[derive(Parser)]
#[command(name = "geofuse", about = "Fuse detector location candidates into one estimate")]
struct Cli {
    /// JSON input file. Reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Path to config TOML file
    #[arg(long, env = "GEOFUSE_CONFIG")]
    config: Option<PathBuf>,

    /// Region code, overrides `region_code` in the input
    #[arg(long)]
    region: Option<String>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the input and output JSON schemas and exit
    #[arg(long)]
    print_schema: bool,

    /// List known region codes and exit
    #[arg(long)]
    list_regions: bool,
}

/// What a caller hands the CLI: request fields plus the candidate list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
struct FusionInput {
    #[serde(default)]
    region_code: Option<String>,
    #[serde(default)]
    context: FusionContext,
    #[serde(default)]
    candidates: Vec<LocationCandidate>,
}

impl FusionInput {
    fn into_request(self, region_override: Option<String>) -> Result<(FusionRequest, Vec<LocationCandidate>)> {
        let region_code = region_override
            .or(self.region_code)
            .filter(|code| !code.trim().is_empty())
            .context("No region code: set region_code in the input or pass --region")?;
        let request = FusionRequest::new(region_code).with_context(self.context);
        Ok((request, self.candidates))
    }
}

fn parse_input(raw: &str) -> Result<FusionInput> {
    serde_json::from_str(raw).context("Failed to parse fusion input JSON")
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display())),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read input from stdin")?;
            Ok(raw)
        }
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("geofuse=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    if cli.print_schema {
        let schemas = serde_json::json!({
            "input": schemars::schema_for!(FusionInput),
            "output": schemars::schema_for!(FusionOutcome),
        });
        println!("{}", to_json(&schemas, cli.pretty)?);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => {
            info!(config = %path.display(), "Loading config");
            load_config(path)?
        }
        None => FusionConfig::default(),
    };
    config.log_summary();

    let engine = FusionEngine::new(config)?;

    if cli.list_regions {
        for code in engine.geofences().codes() {
            if let Some(fence) = engine.geofences().get(code) {
                println!("{}\t{}", fence.code, fence.name);
            }
        }
        return Ok(());
    }

    let input = parse_input(&read_input(cli.input.as_ref())?)?;
    let (request, candidates) = input.into_request(cli.region)?;
    info!(
        region = request.region_code.as_str(),
        candidates = candidates.len(),
        "Fusing candidates"
    );

    let outcome = engine.fuse(candidates, &request)?;
    match &outcome.result {
        Some(result) => {
            if outcome.display_address().is_none() && result.address.is_some() {
                info!("Address too vague to display, keeping coordinates only");
            }
        }
        None => warn!(
            received = outcome.report.received,
            outside_region = outcome.report.outside_region,
            "Could not localize"
        ),
    }

    println!("{}", to_json(&outcome, cli.pretty)?);
    Ok(())
}
