//! # Vuedoo API Server Library
//!
//! HTTP surface of the Vuedoo content service.
//!
//! ## Modules
//!
//! - `app`: Application state, router and access context resolution
//! - `config`: Configuration from environment variables
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
