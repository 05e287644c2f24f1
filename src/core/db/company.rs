use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CrmResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCompany {
    pub name: String,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompanyUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<Option<String>>,
}

pub trait CompanyRepository {
    fn get_companies(&self) -> impl Future<Output = CrmResult<Vec<Company>>> + Send;
    fn get_company_by_id(&self, id: Uuid) -> impl Future<Output = CrmResult<Option<Company>>> + Send;
    fn add_company(&self, company: &NewCompany) -> impl Future<Output = CrmResult<Company>> + Send;
    fn update_company(&self, id: Uuid, update: &CompanyUpdate) -> impl Future<Output = CrmResult<Company>> + Send;
    fn delete_company(&self, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
}
