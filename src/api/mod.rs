//! HTTP API handlers

pub mod auth_info;
pub mod conversation;
pub mod health;
pub mod usage;
