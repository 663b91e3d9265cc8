// Application layer - Use cases and the ports they depend on
pub mod aggregation;
pub mod metrics_repository;
pub mod period_cache;
pub mod series_service;
pub mod validation;
