//! View controllers. Each holds the state of one view and exposes async
//! operations generic over the data backend; the GUI only renders them.

pub mod board;
pub mod gate;
mod notice;
pub mod pipeline;
pub mod records;
pub mod settings;
pub mod shell;

pub use notice::{Level, Notification, Notifications};
