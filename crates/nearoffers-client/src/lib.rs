pub mod client;
pub mod error;
pub mod normalize;
pub(crate) mod retry;
pub mod types;

pub use client::OffersClient;
pub use error::ClientError;
