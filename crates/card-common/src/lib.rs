pub mod api;
pub mod error;
pub mod http;
pub mod mock;
pub mod model;

pub use reqwest::StatusCode;
