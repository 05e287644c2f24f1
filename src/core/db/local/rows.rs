//! Raw SQLite rows and their conversion into domain types.
//!
//! Ids are stored as hyphenated text, timestamps as unix nanoseconds.

use uuid::Uuid;

use crate::{
    core::db::{
        Company, CompanyRef, Contact, ContactRef, Deal, DealCard, SalesProcess, Stage, StageType, Task,
        TaskItem, TaskStatus,
        model::{parse_date, timestamp_from_nanos},
    },
    error::{CrmError, CrmResult},
};

pub(super) fn parse_id(value: &str) -> CrmResult<Uuid> {
    Ok(Uuid::parse_str(value)?)
}

pub(super) fn parse_opt_id(value: Option<&str>) -> CrmResult<Option<Uuid>> {
    value.map(parse_id).transpose()
}

pub(super) fn opt_id_text(value: Option<Uuid>) -> Option<String> {
    value.map(|id| id.to_string())
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub confirmed: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ContactRow {
    id: String,
    user_id: String,
    first_name: String,
    last_name: String,
    email: String,
    company_id: Option<String>,
    created_at: i64,
}

impl TryFrom<ContactRow> for Contact {
    type Error = CrmError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        Ok(Contact {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            company_id: parse_opt_id(row.company_id.as_deref())?,
            created_at: timestamp_from_nanos(row.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct CompanyRow {
    id: String,
    user_id: String,
    name: String,
    industry: Option<String>,
    created_at: i64,
}

impl TryFrom<CompanyRow> for Company {
    type Error = CrmError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        Ok(Company {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            name: row.name,
            industry: row.industry,
            created_at: timestamp_from_nanos(row.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct SalesProcessRow {
    id: String,
    user_id: String,
    name: String,
    is_default: i64,
    created_at: i64,
}

impl TryFrom<SalesProcessRow> for SalesProcess {
    type Error = CrmError;

    fn try_from(row: SalesProcessRow) -> Result<Self, Self::Error> {
        Ok(SalesProcess {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            name: row.name,
            is_default: row.is_default != 0,
            created_at: timestamp_from_nanos(row.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct StageRow {
    id: String,
    user_id: String,
    process_id: String,
    name: String,
    stage_order: i64,
    stage_type: String,
    created_at: i64,
}

impl TryFrom<StageRow> for Stage {
    type Error = CrmError;

    fn try_from(row: StageRow) -> Result<Self, Self::Error> {
        Ok(Stage {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            process_id: parse_id(&row.process_id)?,
            name: row.name,
            stage_order: i32::try_from(row.stage_order)
                .map_err(|_| CrmError::Malformed(format!("stage order out of range: {}", row.stage_order)))?,
            stage_type: StageType::try_from(row.stage_type.as_str())?,
            created_at: timestamp_from_nanos(row.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct DealRow {
    id: String,
    user_id: String,
    title: String,
    value: Option<f64>,
    contact_id: Option<String>,
    company_id: Option<String>,
    sales_process_id: Option<String>,
    current_stage_id: Option<String>,
    created_at: i64,
}

impl TryFrom<DealRow> for Deal {
    type Error = CrmError;

    fn try_from(row: DealRow) -> Result<Self, Self::Error> {
        Ok(Deal {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            title: row.title,
            value: row.value,
            contact_id: parse_opt_id(row.contact_id.as_deref())?,
            company_id: parse_opt_id(row.company_id.as_deref())?,
            sales_process_id: parse_opt_id(row.sales_process_id.as_deref())?,
            current_stage_id: parse_opt_id(row.current_stage_id.as_deref())?,
            created_at: timestamp_from_nanos(row.created_at)?,
        })
    }
}

/// Left-joined contact and company columns shared by deal and task listings.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct JoinedRefs {
    contact_first_name: Option<String>,
    contact_last_name: Option<String>,
    company_name: Option<String>,
}

impl JoinedRefs {
    fn contact(&self, id: Option<Uuid>) -> Option<ContactRef> {
        match (id, &self.contact_first_name, &self.contact_last_name) {
            (Some(id), Some(first_name), Some(last_name)) => Some(ContactRef {
                id,
                first_name: first_name.clone(),
                last_name: last_name.clone(),
            }),
            _ => None,
        }
    }

    fn company(&self, id: Option<Uuid>) -> Option<CompanyRef> {
        match (id, &self.company_name) {
            (Some(id), Some(name)) => Some(CompanyRef { id, name: name.clone() }),
            _ => None,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct DealCardRow {
    #[sqlx(flatten)]
    deal: DealRow,
    #[sqlx(flatten)]
    refs: JoinedRefs,
}

impl TryFrom<DealCardRow> for DealCard {
    type Error = CrmError;

    fn try_from(row: DealCardRow) -> Result<Self, Self::Error> {
        let deal = Deal::try_from(row.deal)?;
        Ok(DealCard {
            contact: row.refs.contact(deal.contact_id),
            company: row.refs.company(deal.company_id),
            deal,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct TaskRow {
    id: String,
    user_id: String,
    title: String,
    due_date: Option<String>,
    status: String,
    contact_id: Option<String>,
    company_id: Option<String>,
    created_at: i64,
}

impl TryFrom<TaskRow> for Task {
    type Error = CrmError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            title: row.title,
            due_date: row
                .due_date
                .as_deref()
                .map(parse_date)
                .transpose()
                .map_err(|e| CrmError::Malformed(e.to_string()))?,
            status: TaskStatus::try_from(row.status.as_str())?,
            contact_id: parse_opt_id(row.contact_id.as_deref())?,
            company_id: parse_opt_id(row.company_id.as_deref())?,
            created_at: timestamp_from_nanos(row.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct TaskItemRow {
    #[sqlx(flatten)]
    task: TaskRow,
    #[sqlx(flatten)]
    refs: JoinedRefs,
}

impl TryFrom<TaskItemRow> for TaskItem {
    type Error = CrmError;

    fn try_from(row: TaskItemRow) -> Result<Self, Self::Error> {
        let task = Task::try_from(row.task)?;
        Ok(TaskItem {
            contact: row.refs.contact(task.contact_id),
            company: row.refs.company(task.company_id),
            task,
        })
    }
}
