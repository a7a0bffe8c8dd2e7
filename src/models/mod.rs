// src/models/mod.rs

pub mod comment;
pub mod proposal;
pub mod stage;
pub mod user;
