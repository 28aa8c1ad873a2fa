//! Clock functions: `now()`, `today()`, `timeOfDay()`
//!
//! All read the options bundle's clock, which tests replace with a fixed
//! instant.

use crate::evaluator::engine::Evaluator;
use crate::model::temporal::{Date, DatePrecision, DateTime, Time, TimePrecision};
use crate::model::{Collection, FhirPathValue};

/// `now()`: the current instant as a millisecond-precision DateTime
pub fn now(ev: &Evaluator) -> Collection {
    Collection::singleton_of(FhirPathValue::DateTime(DateTime::from_chrono(
        ev.options().now(),
    )))
}

/// `today()`: the current date
pub fn today(ev: &Evaluator) -> Collection {
    let date = ev.options().now().date_naive();
    Collection::singleton_of(FhirPathValue::Date(Date {
        date,
        precision: DatePrecision::Day,
    }))
}

/// `timeOfDay()`: the current time of day
pub fn time_of_day(ev: &Evaluator) -> Collection {
    let time = ev.options().now().time();
    Collection::singleton_of(FhirPathValue::Time(Time {
        time,
        precision: TimePrecision::Millisecond,
    }))
}
