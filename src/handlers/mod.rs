// src/handlers/mod.rs
pub mod analysis;
pub mod cache_admin;
pub mod error;
pub mod tiers;
