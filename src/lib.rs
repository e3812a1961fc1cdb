//! Subject registry: subject records with a unique contact address, billing
//! account provisioning on registration, and a protobuf change-event stream.

pub mod auth;
pub mod billing;
pub mod config;
pub mod domain;
pub mod events;
pub mod messaging;
pub mod metrics;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
