use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValuationError {
    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("Insufficient source data: {0}")]
    InsufficientSourceData(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Numeric overflow: {0}")]
    NumericOverflow(String),

    #[error("Invalid inputs: {0}")]
    InvalidInputs(String),

    #[error("Valuation failed: {0}")]
    ValuationFailed(String),

    #[error("Cache error: {0}")]
    CacheError(String),
}
