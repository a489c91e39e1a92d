// Market data module entrypoint
pub mod adapters;   // venue-specific snapshot fetchers (e.g. OKX)
pub mod extractor;  // raw snapshot -> bounded list of validated levels
pub mod normaliser; // converts strings -> positive decimals
pub mod types;
