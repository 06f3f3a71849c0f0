pub mod docs;
pub mod error;
pub mod evaluator;
pub mod kind;
pub mod layout;
pub mod presence;
pub mod snapshot;
pub mod source;
pub mod walk;

pub use docs::*;
pub use error::*;
pub use evaluator::*;
pub use kind::*;
pub use layout::*;
pub use snapshot::*;
pub use walk::*;
