//! Configuration: which source to read and how to shape its messages.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::builder::MessageBuilder;
use crate::chooser::SelectionPolicy;
use crate::error::{Error, Result};
use crate::filter::{AllowSet, CaseMode, FilterChain};
use crate::source::{self, BlobStream};

/// Default pause between messages leaving the pipeline.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Host advertised when no usable local address is found.
pub const FALLBACK_HOST: &str = "127.0.0.1";

/// Where raw text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Literal text.
    Text(String),
    /// A file, polled for changes.
    File(PathBuf),
    /// A URL, downloaded once.
    Url(String),
}

impl SourceSpec {
    /// Resolve the raw source options given on the command line.
    ///
    /// Exactly one of `text`, `file` and `url` must be set; `text` words
    /// are joined with single spaces.
    pub fn resolve(text: &[String], file: Option<PathBuf>, url: Option<String>) -> Result<Self> {
        let mut chosen = Vec::new();
        if !text.is_empty() {
            chosen.push(Self::Text(text.join(" ")));
        }
        if let Some(file) = file {
            chosen.push(Self::File(file));
        }
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            chosen.push(Self::Url(url));
        }

        match chosen.len() {
            0 => Err(Error::config(
                "no source of data specified (give text, --file or --url)",
            )),
            1 => Ok(chosen.remove(0)),
            _ => Err(Error::config(
                "more than one source of data specified (text, --file and --url are exclusive)",
            )),
        }
    }

    /// Open the source.
    pub async fn open(&self, poll_interval: Duration) -> Result<BlobStream> {
        match self {
            Self::Text(text) => {
                info!(message = %text, "Using a static message");
                source::static_text(text.clone())
            }
            Self::File(path) => {
                info!(file = %path.display(), "Reading messages from file");
                source::watch_file(path.clone(), poll_interval).await
            }
            Self::Url(url) => {
                info!(%url, "Reading messages from a url");
                source::download(url).await
            }
        }
    }
}

/// How raw text is turned into the final message stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// How blobs are split into candidates.
    pub builder: MessageBuilder,
    /// How candidates are picked.
    pub policy: SelectionPolicy,
    /// Characters kept by sanitizing.
    pub allow: AllowSet,
    /// Prefix for every non-empty message.
    pub prefix: Option<String>,
    /// Minimum time between messages; `None` disables rate limiting.
    pub interval: Option<Duration>,
    /// Optional case or obfuscation transform.
    pub case: Option<CaseMode>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            builder: MessageBuilder::Lines,
            policy: SelectionPolicy::Sequential,
            allow: AllowSet::Strict,
            prefix: None,
            interval: Some(DEFAULT_INTERVAL),
            case: None,
        }
    }
}

impl PipelineConfig {
    /// Pick the builder from the shaping flags; a CSV column wins over
    /// word mode.
    pub fn builder_for(words: bool, csv_field: Option<usize>) -> MessageBuilder {
        match csv_field {
            Some(column) => MessageBuilder::CsvField { column },
            None if words => MessageBuilder::word_groups(),
            None => MessageBuilder::Lines,
        }
    }

    /// The filter chain these settings describe.
    pub fn filter_chain(&self) -> FilterChain {
        FilterChain::reference(self.allow, self.prefix.clone(), self.interval, self.case)
    }
}

/// First non-loopback local address, or [`FALLBACK_HOST`].
pub fn default_host() -> String {
    match local_ip_address::local_ip() {
        Ok(ip) if !ip.is_loopback() => ip.to_string(),
        Ok(ip) => {
            debug!(%ip, "Only a loopback address is available");
            FALLBACK_HOST.to_owned()
        }
        Err(e) => {
            debug!(error = %e, "Could not determine local address");
            FALLBACK_HOST.to_owned()
        }
    }
}
