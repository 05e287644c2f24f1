pub mod config;
pub mod core;
pub mod crm;
pub mod error;
pub mod logging;

pub use error::{CrmError, CrmResult};

#[cfg(feature = "gui")]
pub mod gui;
