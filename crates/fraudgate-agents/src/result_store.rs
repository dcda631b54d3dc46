use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use fraudgate_models::{AnalyzerName, AnalyzerOutcome, AnalyzerRecord};

use crate::error::StoreError;

/// Completed results, keyed by analyzer.
pub type ResultSnapshot = BTreeMap<AnalyzerName, AnalyzerRecord>;

#[derive(Default)]
struct StoreState {
    records: ResultSnapshot,
    sealed: bool,
}

/// Write-once collection point for concurrently running analyzers.
///
/// Each analyzer owns exactly one key and writes it once. Once sealed, further
/// writes are refused so that a deadline can settle the final state while
/// abandoned tasks are still winding down.
///
/// Access is synchronized via `std::sync::Mutex`; no lock is held across an await.
#[derive(Default)]
pub struct ResultStore {
    state: Mutex<StoreState>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("result store mutex poisoned: {e}")))
    }

    /// Record the terminal outcome for `name`.
    pub fn put(
        &self,
        name: AnalyzerName,
        outcome: AnalyzerOutcome,
        elapsed: Duration,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.sealed {
            return Err(StoreError::Sealed(name));
        }
        if state.records.contains_key(&name) {
            return Err(StoreError::Duplicate(name));
        }
        state.records.insert(
            name,
            AnalyzerRecord {
                outcome,
                elapsed_ms: elapsed.as_millis() as u64,
            },
        );
        Ok(())
    }

    /// Seal the store, filling every name in `expected` that has no result yet.
    ///
    /// Returns the names that were filled. Sealing is atomic with respect to
    /// `put`: a result either landed before the seal or is refused after it.
    pub fn seal_missing<F>(
        &self,
        expected: &[AnalyzerName],
        elapsed: Duration,
        mut fill: F,
    ) -> Result<Vec<AnalyzerName>, StoreError>
    where
        F: FnMut(AnalyzerName) -> AnalyzerOutcome,
    {
        let mut state = self.lock()?;
        state.sealed = true;

        let mut filled = Vec::new();
        for name in expected {
            if !state.records.contains_key(name) {
                state.records.insert(
                    *name,
                    AnalyzerRecord {
                        outcome: fill(*name),
                        elapsed_ms: elapsed.as_millis() as u64,
                    },
                );
                filled.push(*name);
            }
        }
        Ok(filled)
    }

    /// A copy of everything recorded so far.
    ///
    /// Only meaningful once the dispatcher has finished collecting.
    pub fn snapshot(&self) -> Result<ResultSnapshot, StoreError> {
        Ok(self.lock()?.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudgate_models::{AnalyzerAssessment, Decision, FailureReason};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn success(score: i64) -> AnalyzerOutcome {
        AnalyzerOutcome::Success(AnalyzerAssessment {
            risk_score: Decimal::from(score),
            findings: vec![],
            recommendation: Decision::Approve,
            raw_detail: serde_json::Value::Null,
        })
    }

    #[test]
    fn put_and_snapshot() {
        let store = ResultStore::new();
        store
            .put(AnalyzerName::Pattern, success(20), Duration::from_millis(15))
            .unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&AnalyzerName::Pattern].elapsed_ms, 15);
        assert!(snapshot[&AnalyzerName::Pattern].outcome.is_success());
    }

    #[test]
    fn second_write_is_rejected() {
        let store = ResultStore::new();
        store
            .put(AnalyzerName::Velocity, success(10), Duration::ZERO)
            .unwrap();

        let err = store
            .put(AnalyzerName::Velocity, success(90), Duration::ZERO)
            .unwrap_err();
        assert_eq!(err, StoreError::Duplicate(AnalyzerName::Velocity));

        // The first write is untouched.
        let snapshot = store.snapshot().unwrap();
        let score = snapshot[&AnalyzerName::Velocity]
            .outcome
            .assessment()
            .unwrap()
            .risk_score;
        assert_eq!(score, Decimal::from(10));
    }

    #[test]
    fn seal_fills_only_missing_names() {
        let store = ResultStore::new();
        store
            .put(AnalyzerName::Pattern, success(30), Duration::from_millis(5))
            .unwrap();

        let filled = store
            .seal_missing(
                &[AnalyzerName::Pattern, AnalyzerName::Behavioral, AnalyzerName::Velocity],
                Duration::from_millis(100),
                |_| AnalyzerOutcome::failed(FailureReason::Timeout, "global deadline"),
            )
            .unwrap();

        assert_eq!(filled, vec![AnalyzerName::Behavioral, AnalyzerName::Velocity]);
        let snapshot = store.snapshot().unwrap();
        assert!(snapshot[&AnalyzerName::Pattern].outcome.is_success());
        assert_eq!(
            snapshot[&AnalyzerName::Behavioral].outcome.failure_reason(),
            Some(FailureReason::Timeout)
        );
        assert_eq!(snapshot[&AnalyzerName::Velocity].elapsed_ms, 100);
    }

    #[test]
    fn writes_after_seal_are_refused() {
        let store = ResultStore::new();
        store
            .seal_missing(&[AnalyzerName::Merchant], Duration::ZERO, |_| {
                AnalyzerOutcome::failed(FailureReason::Timeout, "deadline")
            })
            .unwrap();

        let err = store
            .put(AnalyzerName::Geographic, success(5), Duration::ZERO)
            .unwrap_err();
        assert_eq!(err, StoreError::Sealed(AnalyzerName::Geographic));
        assert_eq!(store.snapshot().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_to_distinct_keys() {
        let store = Arc::new(ResultStore::new());
        let mut handles = Vec::new();

        for (i, name) in AnalyzerName::ALL.into_iter().enumerate() {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                tokio::task::yield_now().await;
                store.put(name, success(i as i64 * 10), Duration::from_millis(i as u64))
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.len(), AnalyzerName::ALL.len());
        for (i, name) in AnalyzerName::ALL.iter().enumerate() {
            let score = snapshot[name].outcome.assessment().unwrap().risk_score;
            assert_eq!(score, Decimal::from(i as i64 * 10));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_writers_to_one_key_yield_exactly_one_winner() {
        let store = Arc::new(ResultStore::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.put(AnalyzerName::Pattern, success(i), Duration::ZERO)
            }));
        }

        let mut ok = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(StoreError::Duplicate(AnalyzerName::Pattern)) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(duplicates, 7);
    }
}
