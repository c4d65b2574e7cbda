pub mod auth;

pub use auth::ApiClient;
