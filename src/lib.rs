//! Keep a discoverable network advertisement named after a changing stream
//! of text.
//!
//! Raw text flows through a chain of stages (source, builder, chooser,
//! filters) into a [`BroadcastManager`], which registers the resulting
//! message as an advertised service name through an [`Advertiser`] and keeps
//! it in step as the text changes.

#![deny(missing_docs)]

pub mod advertiser;
pub mod broadcast;
pub mod builder;
pub mod chooser;
pub mod config;
pub mod error;
pub mod filter;
#[cfg(feature = "mdns")]
pub mod mdns;
pub mod pipeline;
pub mod responder;
pub mod source;
pub mod stage;

// Re-export key types
pub use advertiser::{Advertiser, DEFAULT_SERVICE_TYPE};
pub use broadcast::{BroadcastConfig, BroadcastGuard, BroadcastManager, DEFAULT_SETTLE_DELAY};
pub use builder::{CandidateList, MessageBuilder};
pub use chooser::{MessageChooser, SelectionPolicy};
pub use config::{PipelineConfig, SourceSpec};
pub use error::{Error, Result};
pub use filter::{AllowSet, CaseMode, Filter, FilterChain};
#[cfg(feature = "mdns")]
pub use mdns::MdnsAdvertiser;
pub use pipeline::spawn_pipeline;
pub use responder::{Responder, DEFAULT_PORT};
pub use source::{BlobStream, RawBlob};
pub use stage::MessageStream;
