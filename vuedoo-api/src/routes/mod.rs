/// API route handlers
///
/// - `health`: Health check and welcome endpoints
/// - `auth`: Passwordless login and code verification
/// - `workspaces`: Workspace and thread endpoints

pub mod auth;
pub mod health;
pub mod workspaces;
