pub mod client;
pub mod dispatch;
pub mod download;
pub mod error;
pub mod lua;
pub mod oauth;
pub mod query;

pub use crate::client::FreesoundClient;
pub use crate::error::{GatewayError, GatewayResult};
pub use crate::query::SearchQuery;
