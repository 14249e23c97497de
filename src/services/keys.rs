//! Credential pool with random-start round-robin failover.
//!
//! Raw key text is split on newlines, commas and semicolons; each entry is
//! trimmed and empty entries are dropped. Nothing else is inferred about the
//! key shape. When the text yields no keys, a single environment-provided key
//! is used instead.

use crate::core::error::{GenerationError, GenerationResult};
use crate::services::llm::{ClientFactory, LlmClient, Provider};
use anyhow::anyhow;
use rand::Rng;
use std::future::Future;

pub fn parse_candidates(raw: &str) -> Vec<String> {
    raw.split(['\n', ',', ';'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Last four characters of a key, for log lines.
pub fn redact(key: &str) -> String {
    let count = key.chars().count();
    let tail: String = key.chars().skip(count.saturating_sub(4)).collect();
    format!("...{}", tail)
}

#[derive(Debug, Clone)]
pub struct KeyPool {
    provider: Provider,
    candidates: Vec<String>,
}

impl KeyPool {
    /// Builds the pool from typed/persisted text, falling back to `env_key`.
    pub fn resolve(
        provider: Provider,
        raw: Option<&str>,
        env_key: Option<&str>,
    ) -> GenerationResult<Self> {
        let mut candidates = raw.map(parse_candidates).unwrap_or_default();

        if candidates.is_empty() {
            if let Some(key) = env_key.map(str::trim).filter(|k| !k.is_empty()) {
                log::debug!("No {} keys entered, using environment key", provider);
                candidates.push(key.to_string());
            }
        }

        if candidates.is_empty() {
            return Err(GenerationError::MissingCredential {
                provider: provider.to_string(),
            });
        }

        Ok(Self {
            provider,
            candidates,
        })
    }

    /// Like [`KeyPool::resolve`], reading the fallback from environment variable `env_var`.
    pub fn from_env(provider: Provider, raw: Option<&str>, env_var: &str) -> GenerationResult<Self> {
        let env_key = std::env::var(env_var).ok();
        Self::resolve(provider, raw, env_key.as_deref())
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Runs `operation` with a client per candidate, starting at a random one.
    pub async fn execute<T, F, Fut>(
        &self,
        factory: &dyn ClientFactory,
        operation: F,
    ) -> GenerationResult<T>
    where
        F: FnMut(Box<dyn LlmClient>) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let start = rand::rng().random_range(0..self.candidates.len().max(1));
        self.execute_from(start, factory, operation).await
    }

    /// Tries every candidate at most once, beginning at `start` and wrapping.
    ///
    /// Returns the first success. When every candidate fails, the error of the
    /// last attempt is returned inside `AllCandidatesFailed`.
    pub async fn execute_from<T, F, Fut>(
        &self,
        start: usize,
        factory: &dyn ClientFactory,
        mut operation: F,
    ) -> GenerationResult<T>
    where
        F: FnMut(Box<dyn LlmClient>) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let total = self.candidates.len();
        let mut last_error = None;

        for attempt in 0..total {
            let key = &self.candidates[(start + attempt) % total];
            let client = factory.bind(self.provider, key);

            match operation(client).await {
                Ok(value) => {
                    if attempt > 0 {
                        log::info!(
                            "{} key {} succeeded after {} failed attempt(s)",
                            self.provider,
                            redact(key),
                            attempt
                        );
                    }
                    return Ok(value);
                }
                Err(e) => {
                    log::warn!(
                        "{} key {} failed ({}/{}), switching key: {:#}",
                        self.provider,
                        redact(key),
                        attempt + 1,
                        total,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(GenerationError::AllCandidatesFailed {
            attempts: total,
            last: last_error.unwrap_or_else(|| anyhow!("All provided API keys failed.")),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::services::llm::{ClientFactory, GenerationRequest, LlmClient, Provider};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Factory whose clients answer per key: `Ok(text)` or `Err(message)`.
    #[derive(Clone, Default)]
    pub struct ScriptedFactory {
        pub outcomes: HashMap<String, Result<String, String>>,
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedFactory {
        pub fn with(mut self, key: &str, outcome: Result<&str, &str>) -> Self {
            self.outcomes.insert(
                key.to_string(),
                outcome.map(str::to_string).map_err(str::to_string),
            );
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[derive(Debug)]
    struct ScriptedClient {
        key: String,
        outcome: Result<String, String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            self.calls.lock().unwrap().push(self.key.clone());
            self.outcome.clone().map_err(|e| anyhow!(e))
        }
    }

    impl ClientFactory for ScriptedFactory {
        fn bind(&self, _provider: Provider, api_key: &str) -> Box<dyn LlmClient> {
            Box::new(ScriptedClient {
                key: api_key.to_string(),
                outcome: self
                    .outcomes
                    .get(api_key)
                    .cloned()
                    .unwrap_or_else(|| Err(format!("unknown key {}", api_key))),
                calls: self.calls.clone(),
            })
        }
    }
}
