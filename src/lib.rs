// src/lib.rs

pub mod config;
pub mod db;
pub mod error;
pub mod forum;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;

// Re-export specific items for convenience if needed
pub use forum::{Forum, ThreadSettings};
pub use routes::create_router;
