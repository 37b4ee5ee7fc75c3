pub mod controller;
pub mod error;
pub mod report;
pub mod table;

pub use controller::*;
pub use error::*;
pub use report::*;
pub use table::*;
