use std::path::{Path, PathBuf};

use valuation_core::ValuationError;

use crate::document::SourceDocument;

/// Size cap on per-ticker JSON files to prevent memory exhaustion from
/// malformed or runaway collector output.
const MAX_JSON_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Read-only access to the per-ticker JSON documents under DATA_DIR.
#[derive(Debug, Clone)]
pub struct DataStore {
    data_dir: PathBuf,
}

impl DataStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn document_path(&self, ticker: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", ticker))
    }

    /// Load the raw document for a ticker.
    ///
    /// A missing file is `UnknownTicker`; an unreadable or oversized file is
    /// `InsufficientSourceData`.
    pub async fn load(&self, ticker: &str) -> Result<SourceDocument, ValuationError> {
        let path = self.document_path(ticker);

        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => return Err(ValuationError::UnknownTicker(ticker.to_string())),
        };
        if meta.len() > MAX_JSON_FILE_SIZE {
            tracing::warn!(
                "source document for {} exceeds size limit: {} bytes",
                ticker,
                meta.len()
            );
            return Err(ValuationError::InsufficientSourceData(format!(
                "source document for {} exceeds {} byte limit",
                ticker, MAX_JSON_FILE_SIZE
            )));
        }

        let raw = tokio::fs::read(&path).await.map_err(|e| {
            ValuationError::InsufficientSourceData(format!(
                "failed to read source document for {}: {}",
                ticker, e
            ))
        })?;

        let mut doc: SourceDocument = serde_json::from_slice(&raw).map_err(|e| {
            ValuationError::InsufficientSourceData(format!("invalid JSON for {}: {}", ticker, e))
        })?;

        normalize_debt_to_equity(&mut doc);

        tracing::debug!("loaded source document for {} ({} bytes)", ticker, raw.len());
        Ok(doc)
    }

    /// Tickers with a document on disk, sorted.
    pub async fn available_tickers(&self) -> Result<Vec<String>, ValuationError> {
        let mut entries = tokio::fs::read_dir(&self.data_dir).await.map_err(|e| {
            ValuationError::InsufficientSourceData(format!(
                "data directory unreadable: {}",
                e
            ))
        })?;

        let mut tickers = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    tickers.push(stem.to_string());
                }
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

/// Upstream collectors report debt/equity in percent (75.73 == 75.73%);
/// the valuation section stores it as a ratio.
fn normalize_debt_to_equity(doc: &mut SourceDocument) {
    if let Some(valuation) = doc.valuation.as_mut() {
        if let Some(de) = valuation.get("debt_to_equity").and_then(|v| v.as_f64()) {
            if let Some(n) = serde_json::Number::from_f64(de / 100.0) {
                valuation.insert("debt_to_equity".to_string(), serde_json::Value::Number(n));
            }
        }
    }
}
