//! Environment-driven configuration.
//!
//! Built once at startup and passed down explicitly; nothing in the runtime
//! reads the environment after this point, which keeps tests deterministic.

/// Token budgets governing the temporal memory view and compaction.
#[derive(Clone, Debug)]
pub struct TokenBudgets {
    /// Budget for the recent-history view in the system prompt.
    pub temporal: i64,
    /// Compaction runs when uncompacted tokens exceed this.
    pub compaction_threshold: i64,
    /// Compaction aims to bring uncompacted tokens at or below this.
    pub compaction_target: i64,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            temporal: 12_000,
            compaction_threshold: 24_000,
            compaction_target: 8_000,
        }
    }
}

impl TokenBudgets {
    /// Read budgets from `AGENT_TOKEN_BUDGET_*` env overrides.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            temporal: env_i64("AGENT_TOKEN_BUDGET_TEMPORAL", defaults.temporal),
            compaction_threshold: env_i64(
                "AGENT_TOKEN_BUDGET_COMPACTION_THRESHOLD",
                defaults.compaction_threshold,
            ),
            compaction_target: env_i64(
                "AGENT_TOKEN_BUDGET_COMPACTION_TARGET",
                defaults.compaction_target,
            ),
        }
    }
}

/// Provider and model identifiers, one per capability tier.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub provider: String,
    pub reasoning: String,
    pub workhorse: String,
    pub fast: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".into(),
            reasoning: "claude-opus-4-6".into(),
            workhorse: "claude-sonnet-4-5".into(),
            fast: "claude-haiku-4-5".into(),
        }
    }
}

impl ModelConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            provider: env_string("AGENT_PROVIDER", &defaults.provider),
            reasoning: env_string("AGENT_MODEL_REASONING", &defaults.reasoning),
            workhorse: env_string("AGENT_MODEL_WORKHORSE", &defaults.workhorse),
            fast: env_string("AGENT_MODEL_FAST", &defaults.fast),
        }
    }
}

/// The complete runtime configuration, passed down as one context object.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub models: ModelConfig,
    pub budgets: TokenBudgets,
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            models: ModelConfig::default(),
            budgets: TokenBudgets::default(),
            max_tokens: 8192,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self {
            models: ModelConfig::from_env(),
            budgets: TokenBudgets::from_env(),
            max_tokens: env_i64("AGENT_MAX_TOKENS", 8192) as u32,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_defaults_ordered() {
        let budgets = TokenBudgets::default();
        assert!(budgets.compaction_target < budgets.temporal);
        assert!(budgets.temporal < budgets.compaction_threshold);
    }

    #[test]
    fn env_override_parses() {
        // Unique var names to avoid cross-test interference.
        std::env::set_var("AGENT_TOKEN_BUDGET_TEMPORAL", "5000");
        let budgets = TokenBudgets::from_env();
        assert_eq!(budgets.temporal, 5000);
        std::env::remove_var("AGENT_TOKEN_BUDGET_TEMPORAL");
    }

    #[test]
    fn invalid_env_falls_back() {
        std::env::set_var("AGENT_TOKEN_BUDGET_COMPACTION_TARGET", "not-a-number");
        let budgets = TokenBudgets::from_env();
        assert_eq!(
            budgets.compaction_target,
            TokenBudgets::default().compaction_target
        );
        std::env::remove_var("AGENT_TOKEN_BUDGET_COMPACTION_TARGET");
    }

    #[test]
    fn model_config_defaults() {
        let models = ModelConfig::default();
        assert_eq!(models.provider, "anthropic");
        assert!(!models.reasoning.is_empty());
        assert!(!models.workhorse.is_empty());
        assert!(!models.fast.is_empty());
    }
}
