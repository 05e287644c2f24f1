use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CrmResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Contact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Option<Uuid>>,
}

pub trait ContactRepository {
    fn get_contacts(&self) -> impl Future<Output = CrmResult<Vec<Contact>>> + Send;
    fn get_contact_by_id(&self, id: Uuid) -> impl Future<Output = CrmResult<Option<Contact>>> + Send;
    fn add_contact(&self, contact: &NewContact) -> impl Future<Output = CrmResult<Contact>> + Send;
    fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> impl Future<Output = CrmResult<Contact>> + Send;
    fn delete_contact(&self, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
}
