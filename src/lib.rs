//! Bude Finder - a map of venues ("Buden") with votes and moderation
//!
//! This library provides the HTTP API, the services behind it and the
//! database layer shared by the server and the `migrate` tool.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
