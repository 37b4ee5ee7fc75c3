pub mod clock;
pub mod intervals;
pub mod time;

// Foundation crate: small, well-tested primitives only.
pub use clock::*;
pub use intervals::*;
pub use time::*;
