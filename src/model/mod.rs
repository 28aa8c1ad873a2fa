//! Value model for FHIRPath evaluation
//!
//! Collections, typed items, partial-precision temporals, quantities,
//! dynamic resources and the optional model tables.

pub mod provider;
pub mod quantity;
pub mod resource;
pub mod temporal;
pub mod value;

pub use provider::ModelTables;
pub use quantity::Quantity;
pub use resource::FhirResource;
pub use temporal::{Date, DatePrecision, DateTime, DateTimePrecision, Time, TimePrecision};
pub use value::{Collection, FhirPathValue};
