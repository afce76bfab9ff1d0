//! Error handling for DAT decoding operations
//!
//! This module defines the error types used throughout the decoders.
//! It uses thiserror for ergonomic error handling; out-of-bounds access of any
//! kind surfaces as [`DatError::BufferUnderrun`].

pub use crate::common::DatError;
pub use crate::common::Result;
