//! HTTP collaborators used by the client-side core.

pub mod api;
pub mod app;
pub mod auth;
mod error;

pub use api::{ApiClient, ProfileBackend};
pub use app::ClientApp;
pub use auth::AuthClient;
pub use error::ClientError;
