//! Domain models for the AMQP CDR backend

pub mod cdr;

pub use cdr::{AmaFlags, CdrRecord, Disposition};
