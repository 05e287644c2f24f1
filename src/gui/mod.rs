mod app;
mod message;
mod screens;
mod state;
mod widgets;

pub use app::{CrmApp, run, run_fatal};
pub use message::Message;
pub use state::AppState;
