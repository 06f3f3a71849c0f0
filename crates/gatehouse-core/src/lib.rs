pub mod env;
pub mod error;
pub mod fact;
pub mod ids;
pub mod model;
pub mod report;
pub mod snapshot;

pub use env::*;
pub use error::*;
pub use fact::*;
pub use ids::*;
pub use model::*;
pub use report::*;
pub use snapshot::*;
