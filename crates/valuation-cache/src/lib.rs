pub mod fingerprint;
pub mod store;

pub use fingerprint::{
    analysis_fingerprint, canonical_json, extraction_fingerprint, price_fingerprint, sha256_hex,
    valuation_fingerprint,
};
pub use store::{CacheEntry, CacheStage, CacheStore};
