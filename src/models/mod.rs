pub mod error;
pub mod health;
pub mod diagnostics;
pub mod room;
pub mod room_api;
pub mod messages;

pub use error::*;
pub use health::*;
pub use diagnostics::*;
pub use room::*;
pub use room_api::*;
pub use messages::*;
