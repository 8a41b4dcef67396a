use serde::Serialize;
use sha2::{Digest, Sha256};
use valuation_core::ValuationError;

/// Fingerprints are hex SHA-256 truncated to 32 chars: collision-safe for
/// a local cache and short enough for file names.
const FINGERPRINT_LEN: usize = 32;

/// Serialize a value to canonical JSON: object keys sorted
/// lexicographically (serde_json's BTreeMap representation), no
/// insignificant whitespace, shortest float form.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ValuationError> {
    let value = serde_json::to_value(value)
        .map_err(|e| ValuationError::CacheError(format!("canonicalize failed: {}", e)))?;
    serde_json::to_string(&value)
        .map_err(|e| ValuationError::CacheError(format!("canonicalize failed: {}", e)))
}

pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn fingerprint(key: &str) -> String {
    let mut hex = sha256_hex(key);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Extraction key: ticker + content hash of the truncated source + schema
/// version. Editing the source file changes the key only when the truncated
/// whitelist content actually changes.
pub fn extraction_fingerprint(ticker: &str, truncated_canonical: &str, schema_version: &str) -> String {
    fingerprint(&format!(
        "extract:{}:{}:{}",
        ticker,
        sha256_hex(truncated_canonical),
        schema_version
    ))
}

/// Valuation key: derived purely from the SVI content and engine version.
pub fn valuation_fingerprint(svi_canonical: &str, engine_version: &str) -> String {
    fingerprint(&format!(
        "valuation:{}:{}",
        sha256_hex(svi_canonical),
        engine_version
    ))
}

/// Analysis key: chained off both the SVI content and the valuation key, so
/// invalidating the valuation invalidates the memo.
pub fn analysis_fingerprint(
    svi_canonical: &str,
    valuation_fingerprint: &str,
    memo_version: &str,
) -> String {
    fingerprint(&format!(
        "analysis:{}:{}:{}",
        sha256_hex(svi_canonical),
        valuation_fingerprint,
        memo_version
    ))
}

/// Price key (quote poller; the core never writes this stage).
pub fn price_fingerprint(ticker: &str) -> String {
    fingerprint(&format!("price:{}", ticker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_keys() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a": 2, "b": 1}"#).unwrap();
        let ca = canonical_json(&a).unwrap();
        let cb = canonical_json(&b).unwrap();
        assert_eq!(ca, cb);
        assert_eq!(ca, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn canonical_json_round_trip_is_identity() {
        let value: serde_json::Value = serde_json::from_str(
            r#"{"z": [1, 2.5, 3], "a": {"nested": true, "x": 0.15}, "m": null}"#,
        )
        .unwrap();
        let once = canonical_json(&value).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&once).unwrap();
        let twice = canonical_json(&reparsed).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn fingerprints_are_stable_and_distinct() {
        let fp1 = extraction_fingerprint("AAPL", "{\"a\":1}", "2");
        let fp2 = extraction_fingerprint("AAPL", "{\"a\":1}", "2");
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 32);

        // Any component change moves the key.
        assert_ne!(fp1, extraction_fingerprint("MSFT", "{\"a\":1}", "2"));
        assert_ne!(fp1, extraction_fingerprint("AAPL", "{\"a\":2}", "2"));
        assert_ne!(fp1, extraction_fingerprint("AAPL", "{\"a\":1}", "3"));
    }

    #[test]
    fn stage_prefixes_do_not_collide() {
        let content = "{\"a\":1}";
        let v = valuation_fingerprint(content, "1");
        let a = analysis_fingerprint(content, &v, "1");
        assert_ne!(v, a);
        assert_ne!(v, price_fingerprint("AAPL"));
    }
}
