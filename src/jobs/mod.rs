//! Background jobs started by the server binary.

pub mod invoice_expiry;
