//! # Vuedoo Shared Library
//!
//! Storage, access control and the login flow of the Vuedoo content
//! service, used by the API server.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and embedded migrations
//! - `models`: tenants, users, blocks, metas and the block query builder
//! - `auth`: access context resolution, block privileges, password hashing
//! - `ids`: slugs, verification codes and access keys
//! - `mail`: outbound email collaborator
//! - `login`: passwordless login and code verification

pub mod auth;
pub mod db;
pub mod ids;
pub mod login;
pub mod mail;
pub mod models;

/// Current version of the Vuedoo shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
