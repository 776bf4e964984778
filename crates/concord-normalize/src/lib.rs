//! Turns platform report documents into canonical result records.

pub mod digest;
pub mod error;
pub mod normalize;
pub mod shape;

pub use digest::*;
pub use error::*;
pub use normalize::*;
pub use shape::*;
