//! HTTP middleware.

pub mod authorize;
