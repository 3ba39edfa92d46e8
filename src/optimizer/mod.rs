pub mod constraints;
pub mod driver;
pub mod strategies;
pub mod types;

pub use constraints::*;
pub use driver::*;
pub use strategies::*;
pub use types::*;
