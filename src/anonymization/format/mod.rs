//! Value format parsing
//!
//! Phone numbers are the reference instantiation; every technique consumes
//! the [`PhoneNumberFormat`] produced once per input value.

pub mod phone;

pub use phone::{PhoneKind, PhoneNumberFormat, PhoneParser};
