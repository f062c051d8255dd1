/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Change-feed listeners driving invalidation, notices and nudges.
pub mod listener;
/// Write coordination with targeted cache invalidation.
pub mod mutations;
/// Cached reads shaped for the view layer.
pub mod queries;
/// Periodic tournament lifecycle sweep.
pub mod reconciler;
/// Server-Sent Events view sessions.
pub mod sse_service;
/// Pure tournament status derivation.
pub mod status;
