pub mod config;
pub mod runner;
pub mod scenario;
pub mod source;
pub mod summary;
pub mod util;

pub use config::*;
pub use runner::*;
pub use source::*;
pub use summary::*;
pub use util::*;
