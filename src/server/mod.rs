//! Authoritative side of the push/pull protocol: the resource registry,
//! the sync service and its HTTP surface.

pub mod registry;
pub mod routes;
pub mod service;
