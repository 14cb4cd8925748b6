//! Error types for marquee.

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or conflicting configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A text source could not be opened or produced unusable content.
    #[error("Source error: {0}")]
    Source(String),

    /// HTTP error while downloading content.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The responder could not bind its listening socket.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The advertiser refused or failed to register a name.
    #[error("Failed to register '{name}': {reason}")]
    Registration {
        /// Name that was being registered.
        name: String,
        /// Advertiser-provided reason.
        reason: String,
    },

    /// mDNS daemon error.
    #[cfg(feature = "mdns")]
    #[error("mDNS error: {0}")]
    Mdns(#[from] mdns_sd::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a source error.
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Source(msg.into())
    }

    /// Create a registration error.
    pub fn registration(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Registration {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn bind(addr: impl ToString, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.to_string(),
            source,
        }
    }
}
