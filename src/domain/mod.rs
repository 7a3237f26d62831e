// Domain layer - Readings, buckets and chart series
pub mod bucket;
pub mod panel;
pub mod reading;
pub mod series;
