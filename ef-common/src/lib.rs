//! Common utilities for the ef traffic assignment toolkit

pub mod error;

pub use error::{Error, Result};
