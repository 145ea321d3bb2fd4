//! HTTP edge: the tenant gate, bearer authentication, and error mapping.
//!
//! The gate is the only place a request's tenant is established. Everything
//! behind it reads the bound context from request extensions.

pub mod app;
pub mod context;
pub mod middleware;
