//! Stage plumbing: every pipeline step runs as its own task behind a
//! single-slot handoff.

use std::pin::Pin;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace};

/// Capacity of the handoff between two stages.
///
/// A stage pulls its next item only after the previous one was taken, so
/// every stage holds at most one item and a pull at the end of the chain
/// paces every stage upstream.
pub const HANDOFF_CAPACITY: usize = 1;

/// Boxed stream handed from one stage to the next.
pub type StageStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Stream of messages flowing from the chooser through the filters.
pub type MessageStream = StageStream<String>;

/// Run `input` on its own task and return the receiving end of its handoff.
pub fn spawn_stage<T, S>(name: &'static str, input: S) -> StageStream<T>
where
    T: Send + 'static,
    S: Stream<Item = T> + Send + 'static,
{
    spawn_paced_stage(name, input, None)
}

/// Like [`spawn_stage`], but after every forwarded item the stage sleeps for
/// `pace` before it pulls the next one from upstream.
pub fn spawn_paced_stage<T, S>(
    name: &'static str,
    input: S,
    pace: Option<Duration>,
) -> StageStream<T>
where
    T: Send + 'static,
    S: Stream<Item = T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);

    tokio::spawn(async move {
        let mut input = Box::pin(input);
        loop {
            // Reserve first so a pulled item never waits outside the slot.
            let Ok(permit) = tx.reserve().await else {
                break;
            };
            let item = tokio::select! {
                _ = tx.closed() => break,
                item = input.next() => item,
            };
            let Some(item) = item else {
                debug!(stage = name, "upstream finished");
                break;
            };
            permit.send(item);
            if let Some(pace) = pace {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = tokio::time::sleep(pace) => {}
                }
            }
        }
        trace!(stage = name, "stage stopped");
    });

    Box::pin(ReceiverStream::new(rx))
}
