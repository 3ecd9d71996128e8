//! Route modules for the EPUB chapters server

pub mod convert;
pub mod health;
