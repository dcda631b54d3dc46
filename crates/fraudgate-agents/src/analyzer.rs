use std::time::Duration;

use async_trait::async_trait;
use fraudgate_models::{AnalyzerAssessment, AnalyzerName, EnrichedTransaction};
use tracing::warn;

use crate::claude_cli::{invoke_claude, ClaudeCliConfig};
use crate::error::AnalyzerError;
use crate::parser::parse_assessment;
use crate::prompts::system_prompt;

/// One independent risk-scoring unit. Mockable for testing.
///
/// Implementations may be slow or fail; the dispatcher bounds their time and
/// records failures, so `analyze` never needs to handle timeouts itself.
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> AnalyzerName;

    async fn analyze(
        &self,
        transaction: &EnrichedTransaction,
    ) -> Result<AnalyzerAssessment, AnalyzerError>;
}

/// Retry policy applied inside a single analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// An analyzer that asks the Claude CLI for an assessment.
pub struct ClaudeAnalyzer {
    pub name: AnalyzerName,
    pub cli_config: ClaudeCliConfig,
    pub retry: RetryPolicy,
}

impl ClaudeAnalyzer {
    pub fn new(name: AnalyzerName, model: String, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            name,
            cli_config: ClaudeCliConfig { model, timeout },
            retry,
        }
    }

    async fn attempt(&self, user_prompt: &str) -> Result<AnalyzerAssessment, AnalyzerError> {
        let raw_output =
            invoke_claude(&system_prompt(self.name), user_prompt, &self.cli_config).await?;
        parse_assessment(&raw_output)
    }
}

#[async_trait]
impl Analyzer for ClaudeAnalyzer {
    fn name(&self) -> AnalyzerName {
        self.name
    }

    async fn analyze(
        &self,
        transaction: &EnrichedTransaction,
    ) -> Result<AnalyzerAssessment, AnalyzerError> {
        let user_prompt = serde_json::to_string(transaction)?;
        with_retries(self.name, self.retry, || self.attempt(&user_prompt)).await
    }
}

/// Run `op` until it succeeds, fails permanently or runs out of retries.
pub async fn with_retries<T, F, Fut>(
    name: AnalyzerName,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, AnalyzerError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AnalyzerError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    analyzer = %name,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Analyzer attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        };

        let counter = &calls;
        let result = with_retries(AnalyzerName::Pattern, policy, move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(AnalyzerError::Parse("garbled reply".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 1,
            backoff: Duration::from_millis(1),
        };

        let counter = &calls;
        let result: Result<(), _> =
            with_retries(AnalyzerName::Velocity, policy, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AnalyzerError::Cli("exit 1".into()))
            })
            .await;

        assert!(matches!(result, Err(AnalyzerError::Cli(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unavailable_backend_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> =
            with_retries(AnalyzerName::Merchant, RetryPolicy::default(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AnalyzerError::Unavailable("claude not on PATH".into()))
            })
            .await;

        assert!(matches!(result, Err(AnalyzerError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn claude_analyzer_reports_its_name() {
        let analyzer = ClaudeAnalyzer::new(
            AnalyzerName::Geographic,
            "claude-3-5-haiku-latest".to_string(),
            Duration::from_secs(5),
            RetryPolicy {
                max_retries: 0,
                backoff: Duration::ZERO,
            },
        );
        assert_eq!(analyzer.name(), AnalyzerName::Geographic);
        assert_eq!(analyzer.cli_config.timeout, Duration::from_secs(5));
    }
}
