//! Helper functions that don't fit into any specific category.

/// Some basic math functions used elsewhere in the project
pub mod math;
