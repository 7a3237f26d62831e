// Application layer - Use cases and series aggregation
pub mod aggregation;
pub mod clock;
pub mod error;
#[cfg(test)]
pub mod memory_source;
pub mod panel_service;
pub mod reading_source;
pub mod series_service;
