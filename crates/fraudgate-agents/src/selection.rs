use fraudgate_models::{AnalyzersConfig, AnalyzerName, EnrichedTransaction};

/// Whether `name` has the data it needs for this transaction.
pub fn is_applicable(name: AnalyzerName, transaction: &EnrichedTransaction) -> bool {
    match name {
        AnalyzerName::Pattern | AnalyzerName::Behavioral | AnalyzerName::Velocity => true,
        AnalyzerName::Merchant => transaction.has_merchant_data(),
        AnalyzerName::Geographic => transaction.has_location_data(),
    }
}

/// Choose which analyzers run for a transaction.
///
/// Core analyzers always apply; merchant and geographic analyzers only when
/// the transaction carries their data. Disabled analyzers never run. The
/// result is in `AnalyzerName::ALL` order and depends only on the inputs.
pub fn select_analyzers(
    transaction: &EnrichedTransaction,
    config: &AnalyzersConfig,
) -> Vec<AnalyzerName> {
    AnalyzerName::ALL
        .into_iter()
        .filter(|name| config.is_enabled(*name))
        .filter(|name| is_applicable(*name, transaction))
        .collect()
}
