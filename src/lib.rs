//! Feedpress - A blog backend that mirrors an RSS feed
//!
//! This crate serves a small JSON API for blog posts. When the post store is
//! empty, it is refilled from a configured feed; posts can then be created,
//! edited and deleted by anyone holding a session from the shared login.

pub mod auth;
pub mod config;
pub mod db;
pub mod fetcher;
pub mod memory;
pub mod refresh;
pub mod routes;
pub mod store;
