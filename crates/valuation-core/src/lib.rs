pub mod error;
pub mod memo;
pub mod result;
pub mod svi;

pub use error::*;
pub use memo::*;
pub use result::*;
pub use svi::*;
