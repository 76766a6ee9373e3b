//! `Hive` HTTP server.
//!
//! Wires the core library and PostgreSQL persistence into a running Axum
//! server. Every handler obtains an authorization decision from the core
//! resolver before touching a stored credential; decryption only ever
//! happens after a positive decision.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod state;
