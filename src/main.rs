use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use marquee::config::default_host;
use marquee::source::FILE_POLL_INTERVAL;
use marquee::{
    spawn_pipeline, AllowSet, BroadcastConfig, BroadcastManager, CaseMode, MdnsAdvertiser,
    PipelineConfig, Responder, SelectionPolicy, SourceSpec, DEFAULT_PORT, DEFAULT_SERVICE_TYPE,
};

#[derive(Parser)]
#[clap(name = "marquee")]
#[clap(about = "Advertise a network service named after a changing stream of text")]
#[clap(group(ArgGroup::new("case").multiple(false)))]
struct Args {
    /// Static text to advertise
    text: Vec<String>,

    /// Read messages from this file, re-reading it when it changes
    #[clap(long)]
    file: Option<PathBuf>,

    /// Download messages from a url once at startup
    #[clap(long)]
    url: Option<String>,

    /// Go through whole text word by word, instead of line by line
    #[clap(long)]
    words: bool,

    /// Iterate this (zero-based) field from csv data
    #[clap(long)]
    csv_field: Option<usize>,

    /// Pick messages at random instead of in order
    #[clap(long)]
    random: bool,

    /// Time between message updates, like 1s or 5m
    #[clap(short, long, default_value = "5m", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Prefix every message with this string
    #[clap(long)]
    prefix: Option<String>,

    /// Lowercase messages
    #[clap(long, group = "case")]
    lower_case: bool,

    /// Uppercase messages
    #[clap(long, group = "case")]
    upper_case: bool,

    /// Randomly mix the case of every character
    #[clap(long, group = "case")]
    mixed_case: bool,

    /// Swap letters for look-alike symbols
    #[clap(long = "l33t", group = "case")]
    leet: bool,

    /// Also keep pipes and spaces in messages
    #[clap(long)]
    permissive: bool,

    /// Host to advertise for the service (default: first local address)
    #[clap(long)]
    host: Option<String>,

    /// Port to advertise and answer on
    #[clap(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Service type to register names under
    #[clap(long, default_value = DEFAULT_SERVICE_TYPE)]
    service_type: String,

    /// How long a withdrawn name is left alone before it may be reused
    #[clap(long, default_value = "5s", value_parser = humantime::parse_duration)]
    settle: Duration,

    /// Do not answer TCP connections with the current message
    #[clap(long)]
    no_responder: bool,

    /// Enable verbose logging
    #[clap(short, long)]
    verbose: bool,
}

impl Args {
    fn case(&self) -> Option<CaseMode> {
        if self.leet {
            Some(CaseMode::Leet)
        } else if self.mixed_case {
            Some(CaseMode::Mixed)
        } else if self.lower_case {
            Some(CaseMode::Lower)
        } else if self.upper_case {
            Some(CaseMode::Upper)
        } else {
            None
        }
    }

    fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            builder: PipelineConfig::builder_for(self.words, self.csv_field),
            policy: if self.random {
                SelectionPolicy::Random
            } else {
                SelectionPolicy::Sequential
            },
            allow: if self.permissive {
                AllowSet::Permissive
            } else {
                AllowSet::Strict
            },
            prefix: self.prefix.clone(),
            interval: Some(self.interval).filter(|i| !i.is_zero()),
            case: self.case(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Configuration problems surface before any socket is opened.
    let spec = SourceSpec::resolve(&args.text, args.file.clone(), args.url.clone())?;
    let source = spec.open(FILE_POLL_INTERVAL).await?;
    let messages = spawn_pipeline(source, &args.pipeline());

    let host = args.host.clone().unwrap_or_else(default_host);
    let mut config = BroadcastConfig::new(host.clone(), args.port);
    config.service_type = args.service_type.clone();
    config.settle_delay = args.settle;

    let advertiser = MdnsAdvertiser::new()?;
    let mut manager = BroadcastManager::new(advertiser.clone(), config);
    if !args.no_responder {
        manager = manager.with_responder(Responder::bind((host.as_str(), args.port)).await?);
    }
    let guard = manager.spawn(messages);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    guard.shutdown().await?;
    advertiser.close();
    info!("Stopped service");

    Ok(())
}
