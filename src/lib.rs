pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod services;
pub mod tasks;

pub use api::create_api_router;
