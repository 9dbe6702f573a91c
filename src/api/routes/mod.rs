//! API route handlers

pub mod claims;
