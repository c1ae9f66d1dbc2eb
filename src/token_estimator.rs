//! Token estimation utilities

use crate::chat::ChatMessage;

/// Estimation method
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EstimationMethod {
    CharacterBased { chars_per_token: f32 },
    WordBased { words_per_token: f32 },
}

impl Default for EstimationMethod {
    fn default() -> Self {
        EstimationMethod::CharacterBased { chars_per_token: 4.0 }
    }
}

/// Approximate token counts where the provider reports none
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimator {
    method: EstimationMethod,
}

impl TokenEstimator {
    pub fn new(method: EstimationMethod) -> Self {
        Self { method }
    }

    /// Estimate token count for text
    pub fn estimate(&self, text: &str) -> u32 {
        let estimate = match self.method {
            EstimationMethod::CharacterBased { chars_per_token } => {
                let char_count = text.chars().count();
                (char_count as f32 / chars_per_token).ceil()
            }
            EstimationMethod::WordBased { words_per_token } => {
                let word_count = text.split_whitespace().count();
                (word_count as f32 / words_per_token).ceil()
            }
        };
        estimate as u32
    }

    /// Estimate prompt tokens for a message list
    pub fn estimate_messages(&self, messages: &[ChatMessage]) -> u32 {
        messages.iter().map(|m| self.estimate(&m.content)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_based_estimation() {
        let estimator = TokenEstimator::default();

        assert_eq!(estimator.estimate("Hello world"), 3); // 11 chars / 4 = 2.75 -> 3
        assert_eq!(estimator.estimate(""), 0);
    }

    #[test]
    fn test_word_based_estimation() {
        let estimator = TokenEstimator::new(EstimationMethod::WordBased { words_per_token: 1.3 });

        assert_eq!(estimator.estimate("Hello world test"), 3); // 3 words / 1.3 = 2.3 -> 3
    }

    #[test]
    fn test_estimate_messages() {
        let estimator = TokenEstimator::default();
        let messages = vec![ChatMessage::system("abcd"), ChatMessage::user("abcdefgh")];

        assert_eq!(estimator.estimate_messages(&messages), 3);
    }
}
