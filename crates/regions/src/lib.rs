pub mod cache;
pub mod catalog;
pub mod matcher;
pub mod normalize;

pub use cache::*;
pub use catalog::*;
pub use matcher::*;
pub use normalize::*;
