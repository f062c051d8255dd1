/// Backend access traits and shared error type.
pub mod backend;
/// Websocket change-feed client.
pub mod feed;
/// In-memory backend double for tests.
#[cfg(test)]
pub mod memory;
/// Domain row definitions and wire normalizations.
pub mod models;
/// REST client for the arena data service.
pub mod rest;
