//! Real-time agent status channel server.

pub mod api;
pub mod auth;
pub mod config;
pub mod ws;
