//! Data types for the aggregation server
//!
//! This module contains the record type and the shared error taxonomy.

mod error;
mod record;

pub use error::{AggregationError, AggregationResult};
pub use record::{Record, ID_FIELD, LAMPORT_CLOCK_FIELD};
