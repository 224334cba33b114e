use anyhow::Context;
use clap::{Parser, ValueEnum};
use hoverfly::admin_api::AdminApiServer;
use hoverfly::config::Config;
use hoverfly::matching::MatchingStrategy;
use hoverfly::modes::Mode;
use hoverfly::proxy::ProxyServer;
use hoverfly::Hoverfly;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Service virtualization proxy serving simulated HTTP responses
#[derive(Parser, Debug)]
#[command(name = "hoverfly")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file; flags override its values
    #[arg(short, long, env = "HOVERFLY_CONFIG")]
    config: Option<PathBuf>,

    /// Admin API port
    #[arg(long, visible_alias = "ap")]
    admin_port: Option<u16>,

    /// Proxy port
    #[arg(long, visible_alias = "pp")]
    proxy_port: Option<u16>,

    /// Start in the given mode
    #[arg(long)]
    mode: Option<String>,

    /// Matching strategy: strongest or first
    #[arg(long)]
    matching_strategy: Option<String>,

    /// Run as a webserver instead of a proxy
    #[arg(long)]
    webserver: bool,

    /// Disable the result cache
    #[arg(long)]
    disable_cache: bool,

    /// Maximum number of cached matching outcomes
    #[arg(long)]
    cache_size: Option<usize>,

    /// Simulation file to import at start-up (repeatable)
    #[arg(long)]
    import: Vec<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("hoverfly={}", args.log_level)))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match args.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(port) = args.admin_port {
        config.listen.admin_port = port;
    }
    if let Some(port) = args.proxy_port {
        config.listen.proxy_port = port;
    }
    if let Some(name) = &args.mode {
        config.mode = Mode::parse(name).with_context(|| format!("Not a valid mode: {name}"))?;
    }
    if let Some(name) = &args.matching_strategy {
        config.matching_strategy = MatchingStrategy::parse(name)
            .with_context(|| format!("Not a valid matching strategy: {name}"))?;
    }
    if args.webserver {
        config.webserver = true;
    }
    if args.disable_cache {
        config.cache.disabled = true;
    }
    if let Some(size) = args.cache_size {
        config.cache.size = size;
    }
    config.import.extend(args.import.iter().cloned());

    config.validate()?;
    Ok(config)
}

fn import_simulations(hoverfly: &Hoverfly, paths: &[PathBuf]) -> anyhow::Result<()> {
    for path in paths {
        let body = std::fs::read(path)
            .with_context(|| format!("Failed to read simulation {}", path.display()))?;
        let result = hoverfly
            .add_simulation(&body)
            .with_context(|| format!("Failed to import simulation {}", path.display()))?;
        for warning in &result.warnings {
            warn!(file = %path.display(), "{}", warning.message);
        }
        info!(file = %path.display(), "Imported simulation");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let config = load_config(&args)?;
    let hoverfly = Arc::new(Hoverfly::new(&config));
    import_simulations(&hoverfly, &config.import)?;

    info!(
        mode = %config.mode,
        matching_strategy = %config.matching_strategy,
        webserver = config.webserver,
        cache = config.cache.is_enabled(),
        "Starting Hoverfly"
    );

    let admin = AdminApiServer::new(config.listen.admin_addr(), Arc::clone(&hoverfly));
    let proxy = ProxyServer::new(
        config.listen.proxy_addr(),
        Arc::clone(&hoverfly),
        Duration::from_secs(config.upstream_timeout_seconds),
    )?;

    tokio::select! {
        result = admin.run() => {
            error!("Admin API exited: {:?}", result);
            result?;
        }
        result = proxy.run() => {
            error!("Proxy exited: {:?}", result);
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
