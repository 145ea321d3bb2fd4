//! Read-model projections over the event stream.

pub mod service_accounts;
