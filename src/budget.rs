//! Token budgeting for embedding requests.
//!
//! Embedding models reject inputs above a fixed token count. [`TokenBudgeter`]
//! trims a body so the request fits: when a text is `n` tokens over budget,
//! drop its last `n` characters. This assumes roughly one character per token
//! near the end of the text and can leave the result still over budget for
//! token-dense text.
//!
//! Budgeting is best-effort. If the tokenizer fails, the text is returned
//! unchanged and a warning is logged.

use anyhow::Result;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Counts tokens under some model's tokenization.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize>;
}

/// BPE token counter backed by `tiktoken-rs`.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Tokenizer for an OpenAI model name, falling back to `cl100k_base`
    /// for models tiktoken does not know.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => tiktoken_rs::cl100k_base()?,
        };
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}

/// Counter used when no tokenizer could be loaded. Every count fails, so the
/// budgeter passes text through untouched.
pub struct UnavailableCounter {
    reason: String,
}

impl UnavailableCounter {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TokenCounter for UnavailableCounter {
    fn count(&self, _text: &str) -> Result<usize> {
        anyhow::bail!("tokenizer unavailable: {}", self.reason)
    }
}

pub struct TokenBudgeter {
    counter: Box<dyn TokenCounter>,
    max_tokens: usize,
}

impl TokenBudgeter {
    pub fn new(counter: Box<dyn TokenCounter>, max_tokens: usize) -> Self {
        Self {
            counter,
            max_tokens,
        }
    }

    /// Budgeter for `model`, degrading to pass-through if its tokenizer
    /// cannot be loaded.
    pub fn for_model(model: &str, max_tokens: usize) -> Self {
        let counter: Box<dyn TokenCounter> = match TiktokenCounter::for_model(model) {
            Ok(c) => Box::new(c),
            Err(e) => {
                warn!(model, error = %e, "tokenizer unavailable; embedding input will not be truncated");
                Box::new(UnavailableCounter::new(e.to_string()))
            }
        };
        Self::new(counter, max_tokens)
    }

    /// Fit `text` to the budget.
    ///
    /// Returns `text` unchanged when it is within budget or when counting
    /// fails; otherwise returns a prefix that is `tokens - max_tokens`
    /// characters shorter.
    pub fn fit<'a>(&self, text: &'a str) -> &'a str {
        let tokens = match self.counter.count(text) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "token count failed; using untruncated text");
                return text;
            }
        };
        if tokens <= self.max_tokens {
            return text;
        }

        let excess = tokens - self.max_tokens;
        let keep = text.chars().count().saturating_sub(excess);
        debug!(tokens, max = self.max_tokens, excess, keep, "truncating embedding input");
        match text.char_indices().nth(keep) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        }
    }
}
