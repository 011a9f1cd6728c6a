//! cachewire - command-line client for REST cache servers

use anyhow::{Context, Result, bail};
use cachewire_core::{
    CacheClient, CacheKey, CacheManager, CacheValue, DEFAULT_SECTION, Expiry, InstrumentedCache,
    transport_settings_from,
};
use cachewire_transport::HttpTransport;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{LoggingConfig, Settings};

/// cachewire - read, write and delete entries on REST cache servers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", env = "CACHEWIRE_CONFIG")]
    config: String,

    /// Configuration section holding the cache settings
    #[arg(long, default_value = DEFAULT_SECTION)]
    section: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a cached value (empty on miss)
    Get {
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Store a value
    Put {
        #[command(flatten)]
        key: KeyArgs,

        /// Time to live in seconds
        #[arg(long)]
        ttl: Option<f64>,

        /// Idle timeout in seconds
        #[arg(long)]
        idle: Option<f64>,

        /// Wait for the server and print the response status
        #[arg(long)]
        wait: bool,

        /// Value stored verbatim
        value: String,
    },
    /// Remove a value
    Delete {
        #[command(flatten)]
        key: KeyArgs,

        /// Wait for the server and print the response status
        #[arg(long)]
        wait: bool,
    },
}

#[derive(clap::Args, Debug)]
struct KeyArgs {
    /// Collection id
    #[arg(long)]
    collection: String,

    /// Primary key
    #[arg(long)]
    key: Option<String>,

    /// Composite key fragment, repeatable
    #[arg(long = "composite")]
    composite: Vec<String>,
}

impl KeyArgs {
    fn cache_key(&self) -> CacheKey {
        let key = CacheKey::new(&self.collection).with_composite(self.composite.iter().cloned());
        match &self.key {
            Some(k) => key.with_key(k),
            None => key,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(&args.config)?;
    init_logging(&settings.logging);

    info!("Starting cachewire v{}", env!("CARGO_PKG_VERSION"));
    if settings.file_found {
        info!("Loaded configuration from {}", args.config);
    } else {
        info!("Config file not found at {}, using defaults", args.config);
    }

    let transport_settings =
        transport_settings_from(&settings.source).context("Invalid transport configuration")?;
    let transport = Arc::new(HttpTransport::new(transport_settings)?);

    let manager = CacheManager::from_config(transport, &settings.source, &args.section)
        .with_context(|| format!("Failed to create cache manager for [{}]", args.section))?;
    let cache = InstrumentedCache::new(manager);

    let outcome = run(&cache, args.command).await;

    cache.inner().shutdown().await;
    info!("Stopped");
    outcome
}

async fn run<C: CacheClient>(cache: &C, command: Command) -> Result<()> {
    match command {
        Command::Get { key } => {
            println!("{}", cache.get(&key.cache_key()).await);
        }
        Command::Put {
            key,
            ttl,
            idle,
            wait,
            value,
        } => {
            let key = key.cache_key();
            let expiry = expiry(ttl, idle)?;
            let value = CacheValue::Text(value);

            if wait {
                let response = cache.put_and_wait(&key, value, expiry, false).await?;
                println!("{}", response.status());
            } else if !cache.put(&key, value, expiry) {
                bail!("Write for {} was dropped", key);
            }
        }
        Command::Delete { key, wait } => {
            let key = key.cache_key();

            if wait {
                let response = cache.delete_and_wait(&key, false).await?;
                println!("{}", response.status());
            } else if !cache.delete(&key) {
                bail!("Delete for {} was dropped", key);
            }
        }
    }

    Ok(())
}

fn expiry(ttl: Option<f64>, idle: Option<f64>) -> Result<Expiry> {
    let seconds = |value: f64, flag: &str| {
        Duration::try_from_secs_f64(value).with_context(|| format!("Invalid --{} value {}", flag, value))
    };

    let mut expiry = Expiry::none();
    if let Some(ttl) = ttl {
        expiry = expiry.with_ttl(seconds(ttl, "ttl")?);
    }
    if let Some(idle) = idle {
        expiry = expiry.with_idle(seconds(idle, "idle")?);
    }
    Ok(expiry)
}

/// Initialize logging on stderr; stdout carries command output
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}
