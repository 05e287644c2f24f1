use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    core::{
        auth::Session,
        db::{
            Company, CompanyRepository, CompanyUpdate, Contact, ContactRepository, ContactUpdate, Deal, DealCard,
            DealFilter, DealRepository, DealUpdate, NewCompany, NewContact, NewDeal, NewSalesProcess, NewStage,
            NewTask, ProcessOrder, SalesProcess, SalesProcessRepository, SalesProcessUpdate, Stage,
            StageRepository, StageType, StageUpdate, Task, TaskItem, TaskRepository, TaskUpdate, Workspace,
        },
    },
    error::{CrmError, CrmResult},
};

use super::{Direction, Gateway, TableQuery, parse_content_range};

const EMBED_REFS: &str = "*,contacts(id,first_name,last_name),companies(id,name)";

/// Table API handle bound to a signed-in user. Filters always include
/// `user_id=eq.<owner>` alongside whatever row-level policies the backend has.
/// Requests use the owner's current access token, so a workspace outlives
/// token refreshes; once the owner signs out every call is
/// [`CrmError::NotSignedIn`].
#[derive(Debug, Clone)]
pub struct RemoteWorkspace {
    gateway: Arc<Gateway>,
    user_id: Uuid,
}

impl RemoteWorkspace {
    pub(crate) fn new(gateway: Arc<Gateway>, session: &Session) -> Self {
        Self {
            gateway,
            user_id: session.user_id(),
        }
    }

    async fn send<F>(&self, build: F) -> CrmResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        self.gateway.send_as(self.user_id, build).await
    }

    fn owned(&self, table: &'static str) -> TableQuery {
        TableQuery::new(table).eq("user_id", self.user_id)
    }

    fn by_id(&self, table: &'static str, id: Uuid) -> TableQuery {
        self.owned(table).eq("id", id)
    }

    async fn select<T: DeserializeOwned>(&self, query: TableQuery) -> CrmResult<Vec<T>> {
        tracing::debug!(table = query.table(), "select");
        let path = query.path();
        let params = query.params();
        let resp = self
            .send(|token| self.gateway.request(Method::GET, &path, Some(token)).query(&params))
            .await?;
        Ok(resp.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(&self, query: TableQuery) -> CrmResult<Option<T>> {
        Ok(self.select(query.select("*")).await?.into_iter().next())
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(&self, table: &'static str, body: &B) -> CrmResult<T> {
        let mut row = serde_json::to_value(body)?;
        if let serde_json::Value::Object(map) = &mut row {
            map.insert("user_id".into(), serde_json::Value::String(self.user_id.to_string()));
        }
        let path = TableQuery::new(table).path();
        let resp = self
            .send(|token| {
                self.gateway
                    .request(Method::POST, &path, Some(token))
                    .header("Prefer", "return=representation")
                    .json(&row)
            })
            .await?;
        let rows: Vec<T> = resp.json().await?;
        tracing::info!(table, "row inserted");
        rows.into_iter()
            .next()
            .ok_or_else(|| CrmError::Malformed(format!("insert into {table} returned no row")))
    }

    /// PATCH filtered by id and owner. No matching row is [`CrmError::NotFound`].
    async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &'static str,
        entity: &'static str,
        id: Uuid,
        body: &B,
    ) -> CrmResult<T> {
        let body = serde_json::to_value(body)?;
        if body.as_object().is_some_and(|m| m.is_empty()) {
            return self
                .select_one(self.by_id(table, id))
                .await?
                .ok_or(CrmError::not_found(entity));
        }
        let query = self.by_id(table, id);
        let (path, params) = (query.path(), query.params());
        let resp = self
            .send(|token| {
                self.gateway
                    .request(Method::PATCH, &path, Some(token))
                    .query(&params)
                    .header("Prefer", "return=representation")
                    .json(&body)
            })
            .await?;
        let rows: Vec<T> = resp.json().await?;
        tracing::info!(table, %id, "row updated");
        rows.into_iter().next().ok_or(CrmError::not_found(entity))
    }

    async fn delete(&self, table: &'static str, id: Uuid) -> CrmResult<()> {
        let query = self.by_id(table, id);
        let (path, params) = (query.path(), query.params());
        self.send(|token| self.gateway.request(Method::DELETE, &path, Some(token)).query(&params))
            .await?;
        tracing::info!(table, %id, "row deleted");
        Ok(())
    }

    async fn count(&self, query: TableQuery) -> CrmResult<u64> {
        let query = query.select("id");
        let (path, params) = (query.path(), query.params());
        let resp = self
            .send(|token| {
                self.gateway
                    .request(Method::HEAD, &path, Some(token))
                    .query(&params)
                    .header("Prefer", "count=exact")
            })
            .await?;
        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| CrmError::Malformed("count response carried no Content-Range total".into()))
    }

    async fn ensure_stage_in_process(&self, stage_id: Uuid, process_id: Option<Uuid>) -> CrmResult<()> {
        let Some(process_id) = process_id else {
            return Err(CrmError::validation(
                "The deal has no sales process; choose a process before assigning a stage",
            ));
        };
        let stage: Option<Stage> = self
            .select_one(self.by_id("sales_stages", stage_id).eq("process_id", process_id))
            .await?;
        if stage.is_none() {
            return Err(CrmError::validation("The stage does not belong to the deal's sales process"));
        }
        Ok(())
    }

    /// Clears `is_default` on every other process of the owner.
    async fn clear_default(&self, except: Option<Uuid>) -> CrmResult<()> {
        let mut query = self.owned("sales_processes").eq("is_default", true);
        if let Some(id) = except {
            query = query.neq("id", id);
        }
        let (path, params) = (query.path(), query.params());
        let body = serde_json::json!({ "is_default": false });
        self.send(|token| self.gateway.request(Method::PATCH, &path, Some(token)).query(&params).json(&body))
            .await?;
        Ok(())
    }
}

impl Workspace for RemoteWorkspace {
    fn user_id(&self) -> Uuid {
        self.user_id
    }
}

impl ContactRepository for RemoteWorkspace {
    async fn get_contacts(&self) -> CrmResult<Vec<Contact>> {
        self.select(self.owned("contacts").select("*").order("created_at", Direction::Desc))
            .await
    }

    async fn get_contact_by_id(&self, id: Uuid) -> CrmResult<Option<Contact>> {
        self.select_one(self.by_id("contacts", id)).await
    }

    async fn add_contact(&self, contact: &NewContact) -> CrmResult<Contact> {
        self.insert("contacts", contact).await
    }

    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> CrmResult<Contact> {
        self.update("contacts", "contact", id, update).await
    }

    async fn delete_contact(&self, id: Uuid) -> CrmResult<()> {
        self.delete("contacts", id).await
    }
}

impl CompanyRepository for RemoteWorkspace {
    async fn get_companies(&self) -> CrmResult<Vec<Company>> {
        self.select(self.owned("companies").select("*").order("created_at", Direction::Desc))
            .await
    }

    async fn get_company_by_id(&self, id: Uuid) -> CrmResult<Option<Company>> {
        self.select_one(self.by_id("companies", id)).await
    }

    async fn add_company(&self, company: &NewCompany) -> CrmResult<Company> {
        self.insert("companies", company).await
    }

    async fn update_company(&self, id: Uuid, update: &CompanyUpdate) -> CrmResult<Company> {
        self.update("companies", "company", id, update).await
    }

    async fn delete_company(&self, id: Uuid) -> CrmResult<()> {
        self.delete("companies", id).await
    }
}

impl SalesProcessRepository for RemoteWorkspace {
    async fn get_sales_processes(&self, order: ProcessOrder) -> CrmResult<Vec<SalesProcess>> {
        let query = self.owned("sales_processes").select("*");
        let query = match order {
            ProcessOrder::Name => query.order("name", Direction::Asc),
            ProcessOrder::Created => query.order("created_at", Direction::Asc),
        };
        self.select(query).await
    }

    async fn get_sales_process_by_id(&self, id: Uuid) -> CrmResult<Option<SalesProcess>> {
        self.select_one(self.by_id("sales_processes", id)).await
    }

    async fn add_sales_process(&self, process: &NewSalesProcess) -> CrmResult<SalesProcess> {
        if process.is_default {
            self.clear_default(None).await?;
        }
        self.insert("sales_processes", process).await
    }

    async fn update_sales_process(&self, id: Uuid, update: &SalesProcessUpdate) -> CrmResult<SalesProcess> {
        if update.is_default == Some(true) {
            // Not atomic over HTTP; a failure here leaves no default at all.
            self.clear_default(Some(id)).await?;
        }
        self.update("sales_processes", "sales process", id, update)
            .await
    }

    async fn delete_sales_process(&self, id: Uuid) -> CrmResult<()> {
        self.delete("sales_processes", id).await
    }
}

impl StageRepository for RemoteWorkspace {
    async fn get_stages(&self, process_id: Uuid, stage_type: Option<StageType>) -> CrmResult<Vec<Stage>> {
        let mut query = self
            .owned("sales_stages")
            .select("*")
            .eq("process_id", process_id);
        if let Some(stage_type) = stage_type {
            query = query.eq("stage_type", stage_type);
        }
        self.select(query.order("stage_order", Direction::Asc)).await
    }

    async fn get_stage_by_id(&self, id: Uuid) -> CrmResult<Option<Stage>> {
        self.select_one(self.by_id("sales_stages", id)).await
    }

    async fn add_stage(&self, stage: &NewStage) -> CrmResult<Stage> {
        if self.get_sales_process_by_id(stage.process_id).await?.is_none() {
            return Err(CrmError::not_found("sales process"));
        }
        self.insert("sales_stages", stage).await
    }

    async fn update_stage(&self, id: Uuid, update: &StageUpdate) -> CrmResult<Stage> {
        self.update("sales_stages", "stage", id, update).await
    }

    async fn delete_stage(&self, id: Uuid) -> CrmResult<()> {
        self.delete("sales_stages", id).await
    }
}

impl DealRepository for RemoteWorkspace {
    async fn get_deals(&self, process_id: Option<Uuid>) -> CrmResult<Vec<DealCard>> {
        let mut query = self.owned("deals").select(EMBED_REFS);
        if let Some(process_id) = process_id {
            query = query.eq("sales_process_id", process_id);
        }
        self.select(query.order("created_at", Direction::Desc)).await
    }

    async fn get_deal_by_id(&self, id: Uuid) -> CrmResult<Option<Deal>> {
        self.select_one(self.by_id("deals", id)).await
    }

    async fn add_deal(&self, deal: &NewDeal) -> CrmResult<Deal> {
        self.ensure_stage_in_process(deal.current_stage_id, Some(deal.sales_process_id))
            .await?;
        self.insert("deals", deal).await
    }

    async fn update_deal(&self, id: Uuid, update: &DealUpdate) -> CrmResult<Deal> {
        if let Some(stage_id) = update.current_stage_id {
            let existing = self
                .get_deal_by_id(id)
                .await?
                .ok_or(CrmError::not_found("deal"))?;
            self.ensure_stage_in_process(stage_id, existing.sales_process_id)
                .await?;
        }
        self.update("deals", "deal", id, update).await
    }

    async fn move_deal(&self, id: Uuid, stage_id: Uuid) -> CrmResult<Deal> {
        let update = DealUpdate {
            current_stage_id: Some(stage_id),
            ..Default::default()
        };
        self.update_deal(id, &update).await
    }

    async fn delete_deal(&self, id: Uuid) -> CrmResult<()> {
        self.delete("deals", id).await
    }

    async fn count_deals(&self, filter: DealFilter) -> CrmResult<u64> {
        let query = match filter {
            DealFilter::Process(id) => self.owned("deals").eq("sales_process_id", id),
            DealFilter::Stage(id) => self.owned("deals").eq("current_stage_id", id),
        };
        self.count(query).await
    }
}

impl TaskRepository for RemoteWorkspace {
    async fn get_tasks(&self) -> CrmResult<Vec<TaskItem>> {
        self.select(
            self.owned("tasks")
                .select(EMBED_REFS)
                .order("created_at", Direction::Desc),
        )
        .await
    }

    async fn get_task_by_id(&self, id: Uuid) -> CrmResult<Option<Task>> {
        self.select_one(self.by_id("tasks", id)).await
    }

    async fn add_task(&self, task: &NewTask) -> CrmResult<Task> {
        self.insert("tasks", task).await
    }

    async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> CrmResult<Task> {
        self.update("tasks", "task", id, update).await
    }

    async fn delete_task(&self, id: Uuid) -> CrmResult<()> {
        self.delete("tasks", id).await
    }
}
