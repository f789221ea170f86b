// src/services/mod.rs
pub mod cache;
pub mod revenue;
pub mod rpm;
pub mod store;
pub mod youtube;
