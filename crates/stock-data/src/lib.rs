pub mod document;
pub mod store;
pub mod truncate;

pub use document::{SourceDocument, Statements};
pub use store::DataStore;
pub use truncate::{truncate, TruncatedSource};
