use std::future::Future;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    core::db::model::{CompanyRef, ContactRef, TaskStatus},
    error::CrmResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default, with = "crate::core::db::model::iso_date_option")]
    pub due_date: Option<Date>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub contact_id: Option<Uuid>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    #[serde(flatten)]
    pub task: Task,
    #[serde(default, rename = "contacts")]
    pub contact: Option<ContactRef>,
    #[serde(default, rename = "companies")]
    pub company: Option<CompanyRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub title: String,
    #[serde(with = "crate::core::db::model::iso_date_option")]
    pub due_date: Option<Date>,
    pub status: TaskStatus,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_due_date")]
    pub due_date: Option<Option<Date>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Option<Uuid>>,
}

fn serialize_due_date<S: serde::Serializer>(value: &Option<Option<Date>>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(date) => crate::core::db::model::iso_date_option::serialize(date, serializer),
        None => serializer.serialize_none(),
    }
}

pub trait TaskRepository {
    /// Tasks joined with contact/company names, newest first.
    fn get_tasks(&self) -> impl Future<Output = CrmResult<Vec<TaskItem>>> + Send;
    fn get_task_by_id(&self, id: Uuid) -> impl Future<Output = CrmResult<Option<Task>>> + Send;
    fn add_task(&self, task: &NewTask) -> impl Future<Output = CrmResult<Task>> + Send;
    fn update_task(&self, id: Uuid, update: &TaskUpdate) -> impl Future<Output = CrmResult<Task>> + Send;
    fn delete_task(&self, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
}
