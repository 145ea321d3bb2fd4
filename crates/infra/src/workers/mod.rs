//! Background consumers of the event bus.

pub mod projection_worker;
