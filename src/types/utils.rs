//! Shared helpers: token estimation and content hashing.

use sha2::{Digest, Sha256};
use std::time::Instant;

// =============================================================================
// Token Estimation
// =============================================================================

/// Heuristic token estimator.
///
/// Approximates tokenizer output without loading a vocabulary. Good enough
/// for reporting how much guidance was injected into a prompt.
#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    /// Characters per token for ASCII text (default: 4.0)
    pub ascii_chars_per_token: f32,
    /// Characters per token for non-ASCII (CJK, etc.) (default: 1.5)
    pub non_ascii_chars_per_token: f32,
    /// Extra tokens per line for structure (default: 0.5)
    pub overhead_per_line: f32,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self {
            ascii_chars_per_token: 4.0,
            non_ascii_chars_per_token: 1.5,
            overhead_per_line: 0.5,
        }
    }
}

impl TokenEstimator {
    pub fn estimate(&self, content: &str) -> usize {
        if content.is_empty() {
            return 0;
        }

        let (ascii, non_ascii) = content.chars().fold((0usize, 0usize), |(a, n), c| {
            if c.is_ascii() { (a + 1, n) } else { (a, n + 1) }
        });

        let overhead = (content.lines().count() as f32 * self.overhead_per_line) as usize;
        let ascii_tokens = (ascii as f32 / self.ascii_chars_per_token) as usize;
        let non_ascii_tokens = (non_ascii as f32 / self.non_ascii_chars_per_token) as usize;

        ascii_tokens + non_ascii_tokens + overhead
    }
}

/// Estimate token count with default settings
#[inline]
pub fn estimate_tokens(content: &str) -> usize {
    TokenEstimator::default().estimate(content)
}

// =============================================================================
// Hashing / Timing
// =============================================================================

/// First 16 hex chars of the SHA-256 of `content`
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

#[inline]
pub fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_ascii() {
        // 40 ascii chars -> 10 tokens, 1 line -> 0 overhead
        let text = "a".repeat(40);
        assert_eq!(estimate_tokens(&text), 10);
    }

    #[test]
    fn test_estimate_counts_lines() {
        let text = "abcd\nabcd\nabcd\nabcd";
        // 19 chars -> 4 tokens, 4 lines * 0.5 -> 2
        assert_eq!(estimate_tokens(text), 6);
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash("const x = 1;");
        assert_eq!(a.len(), 16);
        assert_eq!(a, content_hash("const x = 1;"));
        assert_ne!(a, content_hash("const x = 2;"));
    }
}
