pub mod event_bus;
pub mod frame;
pub mod supersede;

pub use event_bus::*;
pub use frame::*;
pub use supersede::*;
