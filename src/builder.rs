//! Message builders: turn one raw blob into a list of candidate messages.

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::source::BlobStream;
use crate::stage::StageStream;

/// Default byte cap for [`MessageBuilder::WordGroups`].
pub const DEFAULT_GROUP_CAP: usize = 20;

/// Stream of candidate lists, one per usable blob.
pub type CandidateStream = StageStream<CandidateList>;

/// Ordered, non-empty list of candidate messages derived from one blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList(Vec<String>);

#[allow(clippy::len_without_is_empty)]
impl CandidateList {
    /// Wrap `messages`, or `None` if there are none.
    pub fn new(messages: Vec<String>) -> Option<Self> {
        if messages.is_empty() {
            None
        } else {
            Some(Self(messages))
        }
    }

    /// Number of candidates (always at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Candidate at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// All candidates in order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// How a blob is split into candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBuilder {
    /// One candidate per non-blank line.
    Lines,
    /// Whitespace-separated words packed greedily into groups of at most
    /// `cap` bytes.
    WordGroups {
        /// Maximum group length in bytes.
        cap: usize,
    },
    /// One candidate per record of comma-delimited data, taken from
    /// `column`. The first record is skipped.
    CsvField {
        /// Zero-based column index.
        column: usize,
    },
}

impl MessageBuilder {
    /// Word grouping with the default cap.
    pub fn word_groups() -> Self {
        Self::WordGroups {
            cap: DEFAULT_GROUP_CAP,
        }
    }

    /// Split `blob` into candidates, or `None` if it yields none.
    pub fn build(&self, blob: &str) -> Option<CandidateList> {
        let messages = match self {
            Self::Lines => lines(blob),
            Self::WordGroups { cap } => word_groups(blob, *cap),
            Self::CsvField { column } => csv_field(blob.as_bytes(), *column),
        };
        CandidateList::new(messages)
    }

    /// Run this builder as a stage over `source`.
    pub fn candidates(self, source: BlobStream) -> CandidateStream {
        let lists = source.filter_map(move |blob| {
            let list = self.build(&blob);
            if list.is_none() {
                debug!(builder = ?self, "Blob produced no candidates");
            }
            futures_util::future::ready(list)
        });
        crate::stage::spawn_stage("builder", lists)
    }
}

fn lines(blob: &str) -> Vec<String> {
    blob.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

fn word_groups(blob: &str, cap: usize) -> Vec<String> {
    let mut words = blob.split_whitespace();
    let Some(first) = words.next() else {
        return Vec::new();
    };

    let mut groups = Vec::new();
    let mut group = first.to_owned();
    for word in words {
        if group.len() + 1 + word.len() <= cap {
            group.push(' ');
            group.push_str(word);
        } else {
            groups.push(std::mem::replace(&mut group, word.to_owned()));
        }
    }
    groups.push(group);
    groups
}

fn csv_field(data: &[u8], column: usize) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut values = Vec::new();
    for (index, record) in reader.records().enumerate().skip(1) {
        match record {
            Ok(record) => match record.get(column) {
                Some(value) => values.push(value.to_owned()),
                None => warn!(
                    record = index,
                    fields = record.len(),
                    column,
                    "CSV record has too few fields, skipping"
                ),
            },
            Err(e) => warn!(record = index, error = %e, "Malformed CSV record, skipping"),
        }
    }
    if values.is_empty() {
        warn!(column, "No values read from CSV data");
    } else {
        debug!(count = values.len(), "Read CSV values");
    }
    values
}
