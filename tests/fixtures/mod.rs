//! Test fixtures for city-dispatch.
//!
//! Provides a small Las Vegas delivery network (locations, roads, fleet,
//! orders and traffic overrides) and writes it out as the CSV tables the
//! loader reads.

pub mod las_vegas_city;

pub use las_vegas_city::*;
