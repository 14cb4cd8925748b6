//! Pipeline assembly: source → builder → chooser → filters.

use tracing::info;

use crate::chooser::MessageChooser;
use crate::config::PipelineConfig;
use crate::source::BlobStream;
use crate::stage::{spawn_stage, MessageStream};

/// Start every stage for `source` and return the final message stream.
///
/// Each stage runs on its own task; dropping the returned stream winds the
/// whole chain down.
pub fn spawn_pipeline(source: BlobStream, config: &PipelineConfig) -> MessageStream {
    info!(
        builder = ?config.builder,
        policy = ?config.policy,
        interval = ?config.interval,
        case = ?config.case,
        "Starting message pipeline"
    );

    let source = spawn_stage("source", source);
    let candidates = config.builder.clone().candidates(source);
    let messages = MessageChooser::new(config.policy).spawn(candidates);
    config.filter_chain().apply(messages)
}
