pub mod errors;
pub mod http;

pub use errors::{ExtractError, RelayError};
