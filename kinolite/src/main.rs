use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

use kinolite_core::{logging, Config};
use kinolite_providers::{
    AllohaProvider, ClientInfo, ContentIdentifier, NavigationRequest, OnlineProvider, ProviderContext,
    RequestedOutput,
};

#[derive(Parser, Debug)]
#[command(name = "kinolite")]
#[command(about = "Resolve playable streams from online providers", long_about = None)]
struct Args {
    /// Config file (TOML, YAML or JSON)
    #[arg(long, env = "KINOLITE_CONFIG")]
    config: Option<String>,

    /// Provider to query
    #[arg(long, default_value = "alloha")]
    provider: String,

    #[arg(long)]
    imdb_id: Option<String>,

    #[arg(long)]
    kinopoisk_id: Option<u64>,

    #[arg(long, default_value = "")]
    title: String,

    #[arg(long, default_value = "")]
    original_title: String,

    #[arg(long, default_value = "0")]
    year: i32,

    /// The title is a series
    #[arg(long)]
    serial: bool,

    #[arg(long, default_value = "")]
    original_language: String,

    /// Translation id
    #[arg(short = 't', long)]
    translation: Option<String>,

    #[arg(short = 's', long)]
    season: Option<String>,

    #[arg(short = 'e', long)]
    episode: Option<String>,

    /// Resolve the stream instead of listing navigation options
    #[arg(long)]
    stream: bool,

    /// Address of the end client the stream is resolved for
    #[arg(long, default_value = "127.0.0.1")]
    client_ip: IpAddr,

    /// Country of the end client (ISO 3166 alpha-2)
    #[arg(long)]
    country: Option<String>,
}

impl Args {
    fn client(&self) -> ClientInfo {
        ClientInfo {
            ip: self.client_ip,
            country: self.country.clone(),
        }
    }

    fn request(&self) -> NavigationRequest {
        let content = ContentIdentifier {
            imdb_id: self.imdb_id.clone(),
            kinopoisk_id: self.kinopoisk_id,
            title: self.title.clone(),
            original_title: self.original_title.clone(),
            year: self.year,
            is_series: self.serial,
            original_language: self.original_language.clone(),
        };

        NavigationRequest {
            content,
            translation: self.translation.clone(),
            season: self.season.clone(),
            episode: self.episode.clone(),
            output: if self.stream {
                RequestedOutput::Stream
            } else {
                RequestedOutput::Navigation
            },
        }
    }
}

fn build_provider(name: &str, config: &Config, ctx: &ProviderContext) -> Result<Arc<dyn OnlineProvider>> {
    match name {
        kinolite_providers::alloha::NAME => Ok(Arc::new(AllohaProvider::new(
            config.providers.alloha.clone(),
            ctx,
        )?)),
        other => Err(anyhow::anyhow!("Unknown provider: {other}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let config = Config::load(args.config.as_deref())?;

    // 1.5. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 2. Initialize logging
    let _log_guard = logging::init_logging(&config.logging)?;

    // 3. Wire up transport, proxies and the provider
    let ctx = ProviderContext::from_config(&config)?;
    let provider = build_provider(&args.provider, &config, &ctx)?;
    info!(provider = provider.name(), enabled = provider.is_enabled(), "Provider ready");

    // 4. Run one navigation step
    let request = args.request();
    let output = match provider.navigate(&request, &args.client()).await {
        Ok(node) => serde_json::to_value(&node)?,
        Err(e) => {
            warn!(provider = provider.name(), error = %e, "Navigation failed");
            json!({ "unavailable": e.reason() })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
