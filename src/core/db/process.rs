use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{core::db::model::StageType, error::CrmResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesProcess {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSalesProcess {
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SalesProcessUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

/// Listing order for sales processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOrder {
    /// Alphabetical, as offered by the board's process selector.
    Name,
    /// Oldest first, as listed in the settings view.
    Created,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub process_id: Uuid,
    pub name: String,
    pub stage_order: i32,
    pub stage_type: StageType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewStage {
    pub process_id: Uuid,
    pub name: String,
    pub stage_order: i32,
    pub stage_type: StageType,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_type: Option<StageType>,
}

/// Sales processes of the bound user.
///
/// Marking a process as default clears the flag on every other process of the
/// same user, so at most one default exists at a time.
pub trait SalesProcessRepository {
    fn get_sales_processes(&self, order: ProcessOrder) -> impl Future<Output = CrmResult<Vec<SalesProcess>>> + Send;
    fn get_sales_process_by_id(&self, id: Uuid) -> impl Future<Output = CrmResult<Option<SalesProcess>>> + Send;
    fn add_sales_process(&self, process: &NewSalesProcess) -> impl Future<Output = CrmResult<SalesProcess>> + Send;
    fn update_sales_process(
        &self,
        id: Uuid,
        update: &SalesProcessUpdate,
    ) -> impl Future<Output = CrmResult<SalesProcess>> + Send;
    /// Deletes the process and its stages. Deals pointing at it are detached.
    fn delete_sales_process(&self, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
}

/// Stages of the bound user's processes, always ordered by `stage_order`.
pub trait StageRepository {
    fn get_stages(
        &self,
        process_id: Uuid,
        stage_type: Option<StageType>,
    ) -> impl Future<Output = CrmResult<Vec<Stage>>> + Send;
    fn get_stage_by_id(&self, id: Uuid) -> impl Future<Output = CrmResult<Option<Stage>>> + Send;
    fn add_stage(&self, stage: &NewStage) -> impl Future<Output = CrmResult<Stage>> + Send;
    fn update_stage(&self, id: Uuid, update: &StageUpdate) -> impl Future<Output = CrmResult<Stage>> + Send;
    /// Deletes the stage. Deals sitting in it lose their stage reference.
    fn delete_stage(&self, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
}
