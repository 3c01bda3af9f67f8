//! Token estimation for context-window trimming.

use std::fmt::Debug;

use crate::types::Message;

/// Estimates how many tokens a message costs.
///
/// Estimates only need to be monotonic in content size; exact tokenizer
/// parity is not expected.
pub trait TokenEstimator: Debug + Send + Sync {
    fn estimate(&self, message: &Message) -> usize;

    fn estimate_all<'a>(&self, messages: impl IntoIterator<Item = &'a Message>) -> usize
    where
        Self: Sized,
    {
        messages.into_iter().map(|m| self.estimate(m)).sum()
    }
}

/// Characters divided by a fixed ratio, rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

    /// A ratio of zero is treated as one.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    pub fn chars_per_token(&self) -> usize {
        self.chars_per_token
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, message: &Message) -> usize {
        message.metadata.char_count.div_ceil(self.chars_per_token)
    }
}
