pub mod backend;
pub mod retry;
pub mod scheduler;
pub mod slot;
pub mod symbology;

pub use backend::*;
pub use retry::*;
pub use scheduler::*;
pub use slot::*;
pub use symbology::*;
