//! Bookstore service read by the source adapter tests.

pub mod api;
pub mod model;
