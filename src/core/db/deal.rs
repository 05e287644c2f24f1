use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    core::db::model::{CompanyRef, ContactRef},
    error::CrmResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub contact_id: Option<Uuid>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    /// Null once the process was deleted.
    #[serde(default)]
    pub sales_process_id: Option<Uuid>,
    /// Null once the stage (or its process) was deleted.
    #[serde(default)]
    pub current_stage_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A deal joined with the names of its contact and company, as shown on a
/// board card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealCard {
    #[serde(flatten)]
    pub deal: Deal,
    #[serde(default, rename = "contacts")]
    pub contact: Option<ContactRef>,
    #[serde(default, rename = "companies")]
    pub company: Option<CompanyRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDeal {
    pub title: String,
    pub value: Option<f64>,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub sales_process_id: Uuid,
    pub current_stage_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DealUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealFilter {
    Process(Uuid),
    Stage(Uuid),
}

pub trait DealRepository {
    /// Deals joined with contact/company names, newest first. `None` lists
    /// every deal of the user, detached ones included.
    fn get_deals(&self, process_id: Option<Uuid>) -> impl Future<Output = CrmResult<Vec<DealCard>>> + Send;
    fn get_deal_by_id(&self, id: Uuid) -> impl Future<Output = CrmResult<Option<Deal>>> + Send;
    /// Fails with a validation error unless the stage belongs to the process.
    fn add_deal(&self, deal: &NewDeal) -> impl Future<Output = CrmResult<Deal>> + Send;
    fn update_deal(&self, id: Uuid, update: &DealUpdate) -> impl Future<Output = CrmResult<Deal>> + Send;
    /// Writes `current_stage_id` and nothing else.
    fn move_deal(&self, id: Uuid, stage_id: Uuid) -> impl Future<Output = CrmResult<Deal>> + Send;
    fn delete_deal(&self, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
    fn count_deals(&self, filter: DealFilter) -> impl Future<Output = CrmResult<u64>> + Send;
}
