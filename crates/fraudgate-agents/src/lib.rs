pub mod aggregator;
pub mod analyzer;
pub mod claude_cli;
pub mod dispatcher;
pub mod error;
pub mod heuristic;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod result_store;
pub mod selection;

pub mod test_support;

pub use aggregator::Aggregator;
pub use analyzer::{Analyzer, ClaudeAnalyzer, RetryPolicy};
pub use dispatcher::Dispatcher;
pub use error::{AnalyzerError, EvaluationError, StoreError};
pub use heuristic::HeuristicAnalyzer;
pub use normalize::{StandardNormalizer, TransactionNormalizer};
pub use orchestrator::{build_report, Orchestrator};
pub use result_store::{ResultSnapshot, ResultStore};
pub use selection::select_analyzers;
