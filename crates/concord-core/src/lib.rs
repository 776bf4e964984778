pub mod engine;
pub mod error;
pub mod group;
pub mod ids;
pub mod model;
pub mod policy;
pub mod report;

pub use engine::*;
pub use error::*;
pub use group::*;
pub use ids::*;
pub use model::*;
pub use policy::*;
pub use report::*;
