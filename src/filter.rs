//! Message filters: 1:1 transforms applied between the chooser and the
//! broadcast manager.
//!
//! Each transform is a plain function so it can be tested on its own;
//! [`FilterChain`] turns an ordered list of them into pipeline stages.

use std::time::Duration;

use futures_util::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::stage::{spawn_paced_stage, spawn_stage, MessageStream};

/// Longest message the advertisement name can usefully carry, in bytes.
pub const MAX_MESSAGE_LEN: usize = 40;

/// Separator that replaces interior runs of disallowed characters.
const SEPARATOR: char = '-';

/// Characters allowed to survive [`sanitize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllowSet {
    /// ASCII letters, digits, `-` and `_`.
    #[default]
    Strict,
    /// [`AllowSet::Strict`] plus `|` and space.
    Permissive,
}

impl AllowSet {
    /// Whether `c` may appear in a sanitized message.
    pub fn permits(self, c: char) -> bool {
        let strict = c.is_ascii_alphanumeric() || c == '-' || c == '_';
        match self {
            Self::Strict => strict,
            Self::Permissive => strict || c == '|' || c == ' ',
        }
    }
}

/// Strip disallowed characters from both ends of `message` and collapse
/// every interior run of them into a single `-`.
pub fn sanitize(message: &str, allow: AllowSet) -> String {
    let trimmed = message.trim_matches(|c: char| !allow.permits(c));

    let mut out = String::with_capacity(trimmed.len());
    let mut in_run = false;
    for c in trimmed.chars() {
        if allow.permits(c) {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push(SEPARATOR);
            in_run = true;
        }
    }
    out
}

/// Cut `message` down to at most `max` bytes.
///
/// The cut backs off to the previous character boundary rather than split
/// a multi-byte character.
pub fn truncate(message: &str, max: usize) -> String {
    if message.len() <= max {
        return message.to_owned();
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_owned()
}

/// Prepend `prefix`, leaving an empty message empty.
pub fn prefix(prefix: &str, message: String) -> String {
    if message.is_empty() {
        message
    } else {
        format!("{prefix}{message}")
    }
}

/// Look-alike replacement for a lowercase letter.
fn leet(c: char) -> Option<char> {
    let replacement = match c {
        'a' => '^',
        'b' => 'β',
        'c' => '¢',
        'd' => 'Ð',
        'e' => 'ë',
        'f' => 'ƒ',
        'g' => '9',
        'i' => '1',
        'l' => '£',
        'n' => 'η',
        'o' => '¤',
        'r' => '®',
        's' => '§',
        't' => '†',
        'u' => 'µ',
        'v' => '√',
        'w' => 'ω',
        'x' => 'Ж',
        'y' => 'Ψ',
        _ => return None,
    };
    Some(replacement)
}

/// Case or obfuscation transform. At most one is active in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    /// All lowercase.
    Lower,
    /// All uppercase.
    Upper,
    /// Every character independently upper- or lowercased.
    Mixed,
    /// Every mappable letter independently swapped for a look-alike symbol.
    Leet,
}

impl CaseMode {
    /// Apply the transform, drawing coin flips from `rng`.
    pub fn apply<R: Rng + ?Sized>(self, message: &str, rng: &mut R) -> String {
        match self {
            Self::Lower => message.to_lowercase(),
            Self::Upper => message.to_uppercase(),
            Self::Mixed => {
                let mut out = String::with_capacity(message.len());
                for c in message.chars() {
                    if rng.gen_bool(0.5) {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                }
                out
            }
            Self::Leet => message
                .chars()
                .map(|c| match leet(c.to_ascii_lowercase()) {
                    Some(replacement) if rng.gen_bool(0.5) => replacement,
                    _ => c,
                })
                .collect(),
        }
    }
}

/// One step of a [`FilterChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// See [`sanitize`].
    Sanitize(AllowSet),
    /// See [`truncate`].
    Truncate(usize),
    /// See [`prefix`].
    Prefix(String),
    /// Forward each message immediately, then hold the stage for the given
    /// interval before taking the next one.
    RateLimit(Duration),
    /// See [`CaseMode`].
    Case(CaseMode),
}

impl Filter {
    /// Apply this filter to one message. Rate limiting passes messages
    /// through unchanged; its pacing only exists as a stage.
    pub fn transform<R: Rng + ?Sized>(&self, message: String, rng: &mut R) -> String {
        match self {
            Self::Sanitize(allow) => sanitize(&message, *allow),
            Self::Truncate(max) => truncate(&message, *max),
            Self::Prefix(p) => prefix(p, message),
            Self::RateLimit(_) => message,
            Self::Case(mode) => mode.apply(&message, rng),
        }
    }

    fn stage_name(&self) -> &'static str {
        match self {
            Self::Sanitize(_) => "sanitize",
            Self::Truncate(_) => "truncate",
            Self::Prefix(_) => "prefix",
            Self::RateLimit(_) => "rate-limit",
            Self::Case(_) => "case",
        }
    }
}

/// Ordered list of filters, each run as its own stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// The reference chain: sanitize, truncate to [`MAX_MESSAGE_LEN`],
    /// prefix, rate limit, then at most one case transform.
    ///
    /// An empty prefix and a missing interval leave their steps out.
    pub fn reference(
        allow: AllowSet,
        prefix: Option<String>,
        interval: Option<Duration>,
        case: Option<CaseMode>,
    ) -> Self {
        let mut chain = Self::new()
            .push(Filter::Sanitize(allow))
            .push(Filter::Truncate(MAX_MESSAGE_LEN));
        if let Some(p) = prefix.filter(|p| !p.is_empty()) {
            chain = chain.push(Filter::Prefix(p));
        }
        if let Some(interval) = interval {
            chain = chain.push(Filter::RateLimit(interval));
        }
        if let Some(mode) = case {
            chain = chain.push(Filter::Case(mode));
        }
        chain
    }

    /// Append a filter.
    pub fn push(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Filters in application order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Apply every filter to one message, in order, without pacing.
    pub fn run<R: Rng + ?Sized>(&self, message: String, rng: &mut R) -> String {
        self.filters
            .iter()
            .fold(message, |message, filter| filter.transform(message, rng))
    }

    /// Wrap `input` in one stage per filter.
    pub fn apply(self, input: MessageStream) -> MessageStream {
        self.filters
            .into_iter()
            .fold(input, |input, filter| match filter {
                Filter::RateLimit(interval) => {
                    spawn_paced_stage(filter.stage_name(), input, Some(interval))
                }
                filter => {
                    let name = filter.stage_name();
                    let mut rng = StdRng::from_entropy();
                    spawn_stage(
                        name,
                        input.map(move |message| filter.transform(message, &mut rng)),
                    )
                }
            })
    }
}
