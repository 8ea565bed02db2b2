pub mod error;
pub mod object;
pub mod result;

pub use error::*;
pub use object::*;
pub use result::*;
