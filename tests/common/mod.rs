mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from crmdesk for tests
pub use crmdesk::core::auth::{AuthProvider, Session, SignUpOutcome};
pub use crmdesk::core::db::{
    CompanyRepository, CompanyUpdate, ContactRepository, ContactUpdate, DataSource, DealFilter, DealRepository,
    DealUpdate, NewCompany, NewContact, NewDeal, NewSalesProcess, NewStage, NewTask, ProcessOrder,
    SalesProcess, SalesProcessRepository, SalesProcessUpdate, Stage, StageRepository, StageType, StageUpdate,
    TaskRepository, TaskStatus, TaskUpdate, Workspace,
    local::{LocalStore, LocalWorkspace},
};
pub use crmdesk::{CrmError, CrmResult};
