use serde::{Deserialize, Serialize};

/// Estimate token count for text content.
/// Approximation: chars / 4, rounded up.
pub fn estimate_tokens(text: &str) -> i64 {
    (text.len() as i64 + 3) / 4
}

/// Token usage reported by the model for one generation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    pub fn is_empty(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn text_token_estimation() {
        assert_eq!(estimate_tokens("hello world"), 3); // 11 chars
        assert_eq!(estimate_tokens(&"a".repeat(400)), 100);
        assert_eq!(estimate_tokens("a"), 1); // rounds up
    }

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        assert!(total.is_empty());
        total.add(&TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        });
        total.add(&TokenUsage {
            input_tokens: 20,
            output_tokens: 5,
        });
        assert_eq!(total.input_tokens, 120);
        assert_eq!(total.output_tokens, 55);
        assert!(!total.is_empty());
    }

    #[test]
    fn usage_serde_roundtrip() {
        let usage = TokenUsage {
            input_tokens: 7,
            output_tokens: 3,
        };
        let json = serde_json::to_string(&usage).unwrap();
        let back: TokenUsage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, usage);
    }
}
