//! Library exports for connectotron, shared between the binary and tests.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod reconciler;
pub mod routes;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
pub mod wizard;
