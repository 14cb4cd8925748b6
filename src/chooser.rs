//! Message choosers: pick the next message from the latest candidate list.

use futures_util::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::builder::{CandidateList, CandidateStream};
use crate::stage::{spawn_stage, MessageStream};

/// Order in which candidates are handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Round robin through the list, wrapping around.
    #[default]
    Sequential,
    /// Uniformly random on every pull.
    Random,
}

/// Holds the latest candidate list and yields one message per pull.
///
/// When a new list replaces the old one the sequential cursor is only
/// re-ranged modulo the new length. There is no attempt to find "the same"
/// message in the new list, so the position after a swap is best effort.
#[derive(Debug)]
pub struct MessageChooser {
    policy: SelectionPolicy,
    list: Option<CandidateList>,
    cursor: Option<usize>,
    rng: StdRng,
}

impl MessageChooser {
    /// Create a chooser with no list yet.
    pub fn new(policy: SelectionPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_entropy())
    }

    /// Create a chooser with an explicit random source.
    pub fn with_rng(policy: SelectionPolicy, rng: StdRng) -> Self {
        Self {
            policy,
            list: None,
            cursor: None,
            rng,
        }
    }

    /// Replace the held list.
    pub fn offer(&mut self, list: CandidateList) {
        self.cursor = self.cursor.map(|cursor| cursor % list.len());
        self.list = Some(list);
    }

    /// The next message, or `None` if no list has arrived yet.
    pub fn pick(&mut self) -> Option<String> {
        let list = self.list.as_ref()?;
        let index = match self.policy {
            SelectionPolicy::Sequential => {
                let next = self.cursor.map_or(0, |cursor| (cursor + 1) % list.len());
                self.cursor = Some(next);
                next
            }
            SelectionPolicy::Random => self.rng.gen_range(0..list.len()),
        };
        list.get(index).map(str::to_owned)
    }

    /// Run the chooser as a stage fed by `candidates`.
    ///
    /// Candidate lists land in a single latest-value slot; before every pull
    /// the chooser swaps in the newest list, then picks from it. Until a
    /// first list arrives the stage stays suspended.
    pub fn spawn(self, mut candidates: CandidateStream) -> MessageStream {
        let (slot_tx, mut slot_rx) = watch::channel::<Option<CandidateList>>(None);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = slot_tx.closed() => return,
                    list = candidates.next() => match list {
                        Some(list) => {
                            debug!(candidates = list.len(), "New candidate list");
                            slot_tx.send_replace(Some(list));
                        }
                        None => break,
                    },
                }
            }
            // Keep the slot open so the chooser never mistakes a finished
            // source for a closed one.
            slot_tx.closed().await;
        });

        let mut chooser = self;
        let messages = async_stream::stream! {
            loop {
                if slot_rx.has_changed().unwrap_or(false) {
                    let latest = slot_rx.borrow_and_update().clone();
                    if let Some(list) = latest {
                        chooser.offer(list);
                    }
                }
                match chooser.pick() {
                    Some(message) => {
                        trace!(%message, "Chose message");
                        yield message;
                    }
                    None => {
                        if slot_rx.changed().await.is_err() {
                            break;
                        }
                    }
                }
            }
        };
        spawn_stage("chooser", messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn list(items: &[&str]) -> CandidateList {
        CandidateList::new(items.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn seeded(policy: SelectionPolicy) -> MessageChooser {
        MessageChooser::with_rng(policy, StdRng::seed_from_u64(7))
    }

    #[test]
    fn nothing_before_first_list() {
        assert_eq!(seeded(SelectionPolicy::Sequential).pick(), None);
        assert_eq!(seeded(SelectionPolicy::Random).pick(), None);
    }

    #[test]
    fn sequential_cycles_in_order() {
        let mut chooser = seeded(SelectionPolicy::Sequential);
        chooser.offer(list(&["a", "b", "c"]));
        let picked: Vec<String> = (0..7).filter_map(|_| chooser.pick()).collect();
        assert_eq!(picked, ["a", "b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn sequential_cursor_is_reranged_on_swap() {
        let mut chooser = seeded(SelectionPolicy::Sequential);
        chooser.offer(list(&["a", "b", "c", "d"]));
        for _ in 0..4 {
            chooser.pick();
        }
        // Cursor sits on index 3; the shorter list re-ranges it to 1.
        chooser.offer(list(&["x", "y"]));
        assert_eq!(chooser.pick().as_deref(), Some("x"));
        assert_eq!(chooser.pick().as_deref(), Some("y"));
    }

    #[test]
    fn random_stays_within_list() {
        let mut chooser = seeded(SelectionPolicy::Random);
        chooser.offer(list(&["a", "b", "c"]));
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let message = chooser.pick().unwrap();
            assert!(["a", "b", "c"].contains(&message.as_str()));
            seen.insert(message);
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn stage_switches_to_newer_list() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let candidates: CandidateStream =
            Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx));
        let mut messages = seeded(SelectionPolicy::Sequential).spawn(candidates);

        tx.send(list(&["old"])).await.unwrap();
        assert_eq!(messages.next().await.as_deref(), Some("old"));

        tx.send(list(&["new"])).await.unwrap();
        let switched = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if messages.next().await.as_deref() == Some("new") {
                    break;
                }
            }
        })
        .await;
        assert!(switched.is_ok(), "chooser should pick up the newer list");
    }

    #[tokio::test]
    async fn stage_waits_for_first_list() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let candidates: CandidateStream =
            Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx));
        let mut messages = seeded(SelectionPolicy::Sequential).spawn(candidates);

        let early = tokio::time::timeout(Duration::from_millis(50), messages.next()).await;
        assert!(early.is_err());

        tx.send(list(&["late"])).await.unwrap();
        assert_eq!(messages.next().await.as_deref(), Some("late"));
    }
}
