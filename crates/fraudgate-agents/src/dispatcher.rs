use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fraudgate_models::{
    is_valid_score, AnalyzerAssessment, AnalyzerName, AnalyzerOutcome, EngineConfig,
    EnrichedTransaction, FailureReason,
};
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::error::Elapsed;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analyzer::Analyzer;
use crate::error::{AnalyzerError, EvaluationError, StoreError};
use crate::result_store::{ResultSnapshot, ResultStore};

/// Fans a transaction out to the selected analyzers and collects one
/// outcome per analyzer.
///
/// Every selected analyzer ends with exactly one entry in the returned
/// snapshot: its assessment, or a failure explaining why there is none.
pub struct Dispatcher {
    registry: HashMap<AnalyzerName, Arc<dyn Analyzer>>,
    per_task_timeout: Duration,
    global_deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: HashMap<AnalyzerName, Arc<dyn Analyzer>>,
        per_task_timeout: Duration,
        global_deadline: Duration,
    ) -> Self {
        Self {
            registry,
            per_task_timeout,
            global_deadline,
        }
    }

    pub fn from_config(
        registry: HashMap<AnalyzerName, Arc<dyn Analyzer>>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            registry,
            Duration::from_millis(config.analyzer_timeout_ms),
            Duration::from_millis(config.global_deadline_ms),
        )
    }

    pub fn is_registered(&self, name: AnalyzerName) -> bool {
        self.registry.contains_key(&name)
    }

    /// Run every selected analyzer concurrently against `transaction`.
    ///
    /// Returns once all tasks finished or the global deadline passed,
    /// whichever comes first. Tasks still running at the deadline are
    /// cancelled and recorded as timed out; their late results are dropped.
    pub async fn run(
        &self,
        transaction: Arc<EnrichedTransaction>,
        selected: &[AnalyzerName],
    ) -> Result<ResultSnapshot, EvaluationError> {
        let started = Instant::now();
        let deadline = started + self.global_deadline;
        let store = Arc::new(ResultStore::new());
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut task_names: HashMap<Id, AnalyzerName> = HashMap::new();

        for &name in selected {
            let Some(analyzer) = self.registry.get(&name) else {
                warn!(analyzer = %name, "No analyzer registered, skipping");
                store.put(
                    name,
                    AnalyzerOutcome::failed(FailureReason::Skipped, "no analyzer registered"),
                    Duration::ZERO,
                )?;
                continue;
            };

            let analyzer = Arc::clone(analyzer);
            let transaction = Arc::clone(&transaction);
            let store = Arc::clone(&store);
            let cancel = cancel.clone();
            let per_task_timeout = self.per_task_timeout;

            let handle = tasks.spawn(async move {
                let task_start = Instant::now();
                let analysis =
                    tokio::time::timeout(per_task_timeout, analyzer.analyze(&transaction));
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    result = analysis => task_outcome(name, result, task_start.elapsed()),
                };

                match store.put(name, outcome, task_start.elapsed()) {
                    Err(StoreError::Sealed(_)) => {
                        debug!(analyzer = %name, "Result arrived after deadline, dropped");
                        Ok(())
                    }
                    other => other,
                }
            });
            task_names.insert(handle.id(), name);
        }

        let collected = tokio::time::timeout_at(deadline, async {
            while let Some(joined) = tasks.join_next_with_id().await {
                match joined {
                    Ok((_, Ok(()))) => {}
                    Ok((_, Err(e))) => return Err(e),
                    Err(e) => {
                        let Some(&name) = task_names.get(&e.id()) else {
                            error!(error = %e, "Unknown analyzer task failed");
                            continue;
                        };
                        let detail = join_failure_detail(e);
                        error!(analyzer = %name, detail = %detail, "Analyzer task failed");
                        store.put(
                            name,
                            AnalyzerOutcome::failed(FailureReason::ExecutionError, detail),
                            started.elapsed(),
                        )?;
                    }
                }
            }
            Ok(())
        })
        .await;

        match collected {
            Ok(Ok(())) => {
                let filled = store.seal_missing(selected, started.elapsed(), |_| {
                    AnalyzerOutcome::failed(
                        FailureReason::ExecutionError,
                        "analyzer task ended without a result",
                    )
                })?;
                if !filled.is_empty() {
                    warn!(analyzers = ?filled, "Analyzers ended without a result");
                }
            }
            Ok(Err(e)) => {
                cancel.cancel();
                return Err(e.into());
            }
            Err(_) => {
                cancel.cancel();
                let filled = store.seal_missing(selected, self.global_deadline, |_| {
                    AnalyzerOutcome::failed(FailureReason::Timeout, "global deadline exceeded")
                })?;
                warn!(
                    analyzers = ?filled,
                    deadline_ms = self.global_deadline.as_millis() as u64,
                    "Global deadline reached, abandoning outstanding analyzers"
                );
                tasks.abort_all();
            }
        }

        Ok(store.snapshot()?)
    }
}

fn task_outcome(
    name: AnalyzerName,
    result: Result<Result<AnalyzerAssessment, AnalyzerError>, Elapsed>,
    elapsed: Duration,
) -> AnalyzerOutcome {
    let elapsed_ms = elapsed.as_millis() as u64;
    match result {
        Ok(Ok(assessment)) if !is_valid_score(assessment.risk_score) => {
            warn!(
                analyzer = %name,
                risk_score = %assessment.risk_score,
                elapsed_ms,
                "Analyzer returned a score outside 0 to 100"
            );
            AnalyzerOutcome::failed(
                FailureReason::ExecutionError,
                format!("risk score {} outside 0 to 100", assessment.risk_score),
            )
        }
        Ok(Ok(assessment)) => {
            info!(
                analyzer = %name,
                risk_score = %assessment.risk_score,
                recommendation = %assessment.recommendation,
                elapsed_ms,
                "Analyzer succeeded"
            );
            AnalyzerOutcome::Success(assessment)
        }
        Ok(Err(e)) => {
            warn!(analyzer = %name, error = %e, elapsed_ms, "Analyzer failed");
            AnalyzerOutcome::failed(e.failure_reason(), e.to_string())
        }
        Err(_) => {
            warn!(analyzer = %name, elapsed_ms, "Analyzer timed out");
            AnalyzerOutcome::failed(
                FailureReason::Timeout,
                format!("no result within {elapsed_ms} ms"),
            )
        }
    }
}

/// Failure text for a task that ended without returning, naming the panic
/// message when there is one.
fn join_failure_detail(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("analyzer task cancelled: {err}");
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("analyzer panicked: {message}")
}
