// Domain layer - Pure types with no I/O
pub mod error;
pub mod metric;
pub mod palette;
pub mod period;
pub mod series;
