pub mod store;
pub mod witness;

pub use store::*;
pub use witness::*;
