mod event;
mod period;
mod store;

pub use event::*;
pub use period::*;
pub use store::*;
