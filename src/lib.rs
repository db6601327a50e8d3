pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod server;
pub mod store;
