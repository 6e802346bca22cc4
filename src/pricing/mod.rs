//! Grower price tables: structure, validation and receipt pricing

pub mod schedule;
pub mod table;

pub use schedule::*;
pub use table::*;
