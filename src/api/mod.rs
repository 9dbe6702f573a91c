//! Web API for claim status and admin actions

pub mod routes;
pub mod server;

pub use server::{create_app, AppState};
