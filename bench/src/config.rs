use crate::adventure::ResponseGrammar;
use crate::harness::HarnessConfig;
use crate::player::GenerationSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Generation and transcript settings for every episode
    pub harness: HarnessConfig,
    /// Command and plan markers player responses must contain
    pub grammar: ResponseGrammar,
    /// Upper bound on episodes played at the same time
    pub max_concurrent_episodes: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            harness: HarnessConfig::default(),
            grammar: ResponseGrammar::default(),
            max_concurrent_episodes: 4,
        }
    }
}

impl BenchConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source; unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let generation = GenerationSettings {
            max_new_tokens: env_parse(
                &lookup,
                "ADVENTURE_MAX_NEW_TOKENS",
                defaults.harness.generation.max_new_tokens,
            )?,
            temperature: env_parse(
                &lookup,
                "ADVENTURE_TEMPERATURE",
                defaults.harness.generation.temperature,
            )?,
        };
        let log_transcript = env_parse(
            &lookup,
            "ADVENTURE_LOG_TRANSCRIPT",
            defaults.harness.log_transcript,
        )?;

        let grammar = ResponseGrammar {
            command_tag: env_str(&lookup, "ADVENTURE_COMMAND_TAG", &defaults.grammar.command_tag),
            plan_tag: unescape_newlines(&env_str(
                &lookup,
                "ADVENTURE_PLAN_TAG",
                &defaults.grammar.plan_tag,
            )),
        };
        if grammar.command_tag.is_empty() {
            anyhow::bail!("ADVENTURE_COMMAND_TAG must not be empty");
        }

        let max_concurrent_episodes = env_parse(
            &lookup,
            "ADVENTURE_MAX_CONCURRENT_EPISODES",
            defaults.max_concurrent_episodes,
        )?;
        if max_concurrent_episodes == 0 {
            anyhow::bail!("ADVENTURE_MAX_CONCURRENT_EPISODES must be at least 1");
        }

        Ok(Self {
            harness: HarnessConfig {
                generation,
                log_transcript,
            },
            grammar,
            max_concurrent_episodes,
        })
    }
}

fn env_str<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        None => Ok(default),
    }
}

/// `.env` values cannot hold raw newlines; accept a literal `\n` instead.
fn unescape_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = BenchConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, BenchConfig::default());
        assert_eq!(config.grammar.plan_tag, "\nNext actions:");
    }

    #[test]
    fn test_overrides() {
        let config = BenchConfig::from_lookup(lookup_from(&[
            ("ADVENTURE_MAX_NEW_TOKENS", "120"),
            ("ADVENTURE_TEMPERATURE", "0.7"),
            ("ADVENTURE_PLAN_TAG", "\\nPlan:"),
            ("ADVENTURE_MAX_CONCURRENT_EPISODES", "8"),
            ("ADVENTURE_LOG_TRANSCRIPT", "false"),
        ]))
        .unwrap();
        assert_eq!(config.harness.generation.max_new_tokens, 120);
        assert!((config.harness.generation.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.grammar.plan_tag, "\nPlan:");
        assert_eq!(config.max_concurrent_episodes, 8);
        assert!(!config.harness.log_transcript);
    }

    #[test]
    fn test_parse_error_names_variable() {
        let err = BenchConfig::from_lookup(lookup_from(&[("ADVENTURE_MAX_NEW_TOKENS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("ADVENTURE_MAX_NEW_TOKENS=many"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(BenchConfig::from_lookup(lookup_from(&[(
            "ADVENTURE_MAX_CONCURRENT_EPISODES",
            "0"
        )]))
        .is_err());
    }
}
