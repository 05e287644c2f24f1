//! Data model and repository traits.
//!
//! Each entity module defines the row type, its insert/update payloads and a
//! repository trait. A [`Workspace`] implements all of them for a single
//! owning user; a [`DataSource`] hands out workspaces for signed-in sessions.

mod company;
mod contact;
mod deal;
pub mod local;
pub mod model;
mod process;
pub mod remote;
mod task;

use uuid::Uuid;

use crate::core::auth::{AuthProvider, Session};

pub use company::{Company, CompanyRepository, CompanyUpdate, NewCompany};
pub use contact::{Contact, ContactRepository, ContactUpdate, NewContact};
pub use deal::{Deal, DealCard, DealFilter, DealRepository, DealUpdate, NewDeal};
pub use model::{CompanyRef, ContactRef, StageType, TaskStatus};
pub use process::{
    NewSalesProcess, NewStage, ProcessOrder, SalesProcess, SalesProcessRepository, SalesProcessUpdate, Stage,
    StageRepository, StageUpdate,
};
pub use task::{NewTask, Task, TaskItem, TaskRepository, TaskUpdate};

/// Every repository, bound to one owning user.
pub trait Workspace:
    ContactRepository
    + CompanyRepository
    + SalesProcessRepository
    + StageRepository
    + DealRepository
    + TaskRepository
    + Clone
    + Send
    + Sync
    + 'static
{
    fn user_id(&self) -> Uuid;
}

/// A backend: authentication plus per-user data access.
pub trait DataSource: AuthProvider + Clone + Send + Sync + 'static {
    type Workspace: Workspace;

    fn workspace(&self, session: &Session) -> Self::Workspace;
}
