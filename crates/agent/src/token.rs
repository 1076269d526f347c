//! Token counting.
//!
//! [`TiktokenCounter`] counts with the `cl100k_base` encoding, the one the
//! engine bills with. [`HeuristicCounter`] uses ~4 characters per token and
//! keeps tests fast and predictable.

use sleuth_core::Error;
use tiktoken_rs::CoreBPE;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// The longest prefix of `text` that fits in `max_tokens`.
    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        truncate_by_search(self, text, max_tokens)
    }
}

/// Binary search over char boundaries for the longest fitting prefix.
fn truncate_by_search<C: TokenCounter + ?Sized>(counter: &C, text: &str, max_tokens: usize) -> String {
    if counter.count(text) <= max_tokens {
        return text.to_string();
    }
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let (mut lo, mut hi) = (0, boundaries.len() - 1);
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if counter.count(&text[..boundaries[mid]]) <= max_tokens {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    text[..boundaries[lo]].to_string()
}

/// Exact counts with the `cl100k_base` BPE.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn new() -> Result<Self, Error> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| Error::Internal(format!("failed to load cl100k_base: {e}")))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// 1 token ≈ 4 characters, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        text.chars().take(max_tokens.saturating_mul(4)).collect()
    }
}
