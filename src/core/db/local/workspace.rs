use std::sync::Arc;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    core::db::{
        Company, CompanyRepository, CompanyUpdate, Contact, ContactRepository, ContactUpdate, Deal, DealCard,
        DealFilter, DealRepository, DealUpdate, NewCompany, NewContact, NewDeal, NewSalesProcess, NewStage, NewTask,
        ProcessOrder, SalesProcess, SalesProcessRepository, SalesProcessUpdate, Stage, StageRepository, StageType,
        StageUpdate, Task, TaskItem, TaskRepository, TaskUpdate, Workspace,
        model::{format_date, timestamp_to_nanos},
    },
    error::{CrmError, CrmResult},
};

use super::{
    rows::{CompanyRow, ContactRow, DealCardRow, DealRow, SalesProcessRow, StageRow, TaskItemRow, TaskRow, opt_id_text},
    state::StoreState,
};

const CONTACT_COLUMNS: &str = "id, user_id, first_name, last_name, email, company_id, created_at";
const COMPANY_COLUMNS: &str = "id, user_id, name, industry, created_at";
const PROCESS_COLUMNS: &str = "id, user_id, name, is_default, created_at";
const STAGE_COLUMNS: &str = "id, user_id, process_id, name, stage_order, stage_type, created_at";
const DEAL_COLUMNS: &str =
    "id, user_id, title, value, contact_id, company_id, sales_process_id, current_stage_id, created_at";
const TASK_COLUMNS: &str = "id, user_id, title, due_date, status, contact_id, company_id, created_at";

/// Data handle bound to one user. Every statement carries `user_id = ?`.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    state: Arc<StoreState>,
    user_id: Uuid,
    owner: String,
}

/// One column assignment of a partial update.
enum SetValue {
    Text(Option<String>),
    Integer(i64),
    Real(Option<f64>),
}

impl LocalWorkspace {
    pub(super) fn new(state: Arc<StoreState>, user_id: Uuid) -> Self {
        Self {
            state,
            user_id,
            owner: user_id.to_string(),
        }
    }

    /// Rejects references to rows the user does not own.
    async fn ensure_owned(
        &self,
        conn: &mut SqliteConnection,
        table: &'static str,
        entity: &'static str,
        id: Option<Uuid>,
    ) -> CrmResult<()> {
        let Some(id) = id else {
            return Ok(());
        };
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE id = ? AND user_id = ?"))
            .bind(id.to_string())
            .bind(&self.owner)
            .fetch_one(conn)
            .await?;
        if count == 0 {
            return Err(CrmError::not_found(entity));
        }
        Ok(())
    }

    /// `UPDATE {table} SET ... WHERE id = ? AND user_id = ?`; an empty set is a
    /// no-op. Returns false when no owned row matched.
    async fn apply_update(
        &self,
        conn: &mut SqliteConnection,
        table: &'static str,
        id: Uuid,
        sets: Vec<(&'static str, SetValue)>,
    ) -> CrmResult<bool> {
        if sets.is_empty() {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE id = ? AND user_id = ?"))
                .bind(id.to_string())
                .bind(&self.owner)
                .fetch_one(conn)
                .await?;
            return Ok(count > 0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(format!("UPDATE {table} SET "));
        {
            let mut columns = qb.separated(", ");
            for (column, value) in sets {
                columns.push(format!("{column} = "));
                match value {
                    SetValue::Text(v) => columns.push_bind_unseparated(v),
                    SetValue::Integer(v) => columns.push_bind_unseparated(v),
                    SetValue::Real(v) => columns.push_bind_unseparated(v),
                };
            }
        }
        qb.push(" WHERE id = ")
            .push_bind(id.to_string())
            .push(" AND user_id = ")
            .push_bind(self.owner.clone());
        let result = qb.build().execute(conn).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_row(&self, table: &'static str, id: Uuid) -> CrmResult<()> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ? AND user_id = ?"))
            .bind(id.to_string())
            .bind(&self.owner)
            .execute(&mut **conn)
            .await?;
        if result.rows_affected() == 0 {
            tracing::debug!(table, %id, "delete matched no row");
        } else {
            tracing::info!(table, %id, "row deleted");
        }
        Ok(())
    }

    /// The stage must exist, be owned, and belong to `process_id`.
    async fn ensure_stage_in_process(
        &self,
        conn: &mut SqliteConnection,
        stage_id: Uuid,
        process_id: Option<Uuid>,
    ) -> CrmResult<()> {
        let Some(process_id) = process_id else {
            return Err(CrmError::validation(
                "The deal has no sales process; choose a process before assigning a stage",
            ));
        };
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sales_stages WHERE id = ? AND process_id = ? AND user_id = ?",
        )
        .bind(stage_id.to_string())
        .bind(process_id.to_string())
        .bind(&self.owner)
        .fetch_one(conn)
        .await?;
        if count == 0 {
            return Err(CrmError::validation("The stage does not belong to the deal's sales process"));
        }
        Ok(())
    }

    async fn fetch_deal(&self, conn: &mut SqliteConnection, id: Uuid) -> CrmResult<Option<Deal>> {
        sqlx::query_as::<_, DealRow>(&format!(
            "SELECT {DEAL_COLUMNS} FROM deals WHERE id = ? AND user_id = ?"
        ))
        .bind(id.to_string())
        .bind(&self.owner)
        .fetch_optional(conn)
        .await?
        .map(Deal::try_from)
        .transpose()
    }
}

impl Workspace for LocalWorkspace {
    fn user_id(&self) -> Uuid {
        self.user_id
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

impl ContactRepository for LocalWorkspace {
    async fn get_contacts(&self) -> CrmResult<Vec<Contact>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = ? ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(&self.owner)
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(Contact::try_from)
        .collect()
    }

    async fn get_contact_by_id(&self, id: Uuid) -> CrmResult<Option<Contact>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ? AND user_id = ?"
        ))
        .bind(id.to_string())
        .bind(&self.owner)
        .fetch_optional(&mut **conn)
        .await?
        .map(Contact::try_from)
        .transpose()
    }

    async fn add_contact(&self, contact: &NewContact) -> CrmResult<Contact> {
        let mut conn = self.state.conn().await?;
        self.ensure_owned(&mut conn, "companies", "company", contact.company_id)
            .await?;
        let created = Contact {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            email: contact.email.clone(),
            company_id: contact.company_id,
            created_at: now(),
        };
        sqlx::query(&format!("INSERT INTO contacts ({CONTACT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"))
            .bind(created.id.to_string())
            .bind(&self.owner)
            .bind(&created.first_name)
            .bind(&created.last_name)
            .bind(&created.email)
            .bind(opt_id_text(created.company_id))
            .bind(timestamp_to_nanos(created.created_at))
            .execute(&mut **conn)
            .await?;
        tracing::info!(id = %created.id, "contact created");
        Ok(created)
    }

    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> CrmResult<Contact> {
        {
            let mut conn = self.state.conn().await?;
            if let Some(company_id) = update.company_id {
                self.ensure_owned(&mut conn, "companies", "company", company_id)
                    .await?;
            }
            let mut sets = Vec::new();
            if let Some(v) = &update.first_name {
                sets.push(("first_name", SetValue::Text(Some(v.clone()))));
            }
            if let Some(v) = &update.last_name {
                sets.push(("last_name", SetValue::Text(Some(v.clone()))));
            }
            if let Some(v) = &update.email {
                sets.push(("email", SetValue::Text(Some(v.clone()))));
            }
            if let Some(v) = update.company_id {
                sets.push(("company_id", SetValue::Text(opt_id_text(v))));
            }
            if !self.apply_update(&mut conn, "contacts", id, sets).await? {
                return Err(CrmError::not_found("contact"));
            }
        }
        tracing::info!(%id, "contact updated");
        self.get_contact_by_id(id)
            .await?
            .ok_or(CrmError::not_found("contact"))
    }

    async fn delete_contact(&self, id: Uuid) -> CrmResult<()> {
        self.delete_row("contacts", id).await
    }
}

impl CompanyRepository for LocalWorkspace {
    async fn get_companies(&self) -> CrmResult<Vec<Company>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE user_id = ? ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(&self.owner)
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(Company::try_from)
        .collect()
    }

    async fn get_company_by_id(&self, id: Uuid) -> CrmResult<Option<Company>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ? AND user_id = ?"
        ))
        .bind(id.to_string())
        .bind(&self.owner)
        .fetch_optional(&mut **conn)
        .await?
        .map(Company::try_from)
        .transpose()
    }

    async fn add_company(&self, company: &NewCompany) -> CrmResult<Company> {
        let mut conn = self.state.conn().await?;
        let created = Company {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            name: company.name.clone(),
            industry: company.industry.clone(),
            created_at: now(),
        };
        sqlx::query(&format!("INSERT INTO companies ({COMPANY_COLUMNS}) VALUES (?, ?, ?, ?, ?)"))
            .bind(created.id.to_string())
            .bind(&self.owner)
            .bind(&created.name)
            .bind(&created.industry)
            .bind(timestamp_to_nanos(created.created_at))
            .execute(&mut **conn)
            .await?;
        tracing::info!(id = %created.id, "company created");
        Ok(created)
    }

    async fn update_company(&self, id: Uuid, update: &CompanyUpdate) -> CrmResult<Company> {
        {
            let mut conn = self.state.conn().await?;
            let mut sets = Vec::new();
            if let Some(v) = &update.name {
                sets.push(("name", SetValue::Text(Some(v.clone()))));
            }
            if let Some(v) = &update.industry {
                sets.push(("industry", SetValue::Text(v.clone())));
            }
            if !self.apply_update(&mut conn, "companies", id, sets).await? {
                return Err(CrmError::not_found("company"));
            }
        }
        tracing::info!(%id, "company updated");
        self.get_company_by_id(id)
            .await?
            .ok_or(CrmError::not_found("company"))
    }

    async fn delete_company(&self, id: Uuid) -> CrmResult<()> {
        self.delete_row("companies", id).await
    }
}

impl SalesProcessRepository for LocalWorkspace {
    async fn get_sales_processes(&self, order: ProcessOrder) -> CrmResult<Vec<SalesProcess>> {
        let order_by = match order {
            ProcessOrder::Name => "name COLLATE NOCASE ASC, rowid ASC",
            ProcessOrder::Created => "created_at ASC, rowid ASC",
        };
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, SalesProcessRow>(&format!(
            "SELECT {PROCESS_COLUMNS} FROM sales_processes WHERE user_id = ? ORDER BY {order_by}"
        ))
        .bind(&self.owner)
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(SalesProcess::try_from)
        .collect()
    }

    async fn get_sales_process_by_id(&self, id: Uuid) -> CrmResult<Option<SalesProcess>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, SalesProcessRow>(&format!(
            "SELECT {PROCESS_COLUMNS} FROM sales_processes WHERE id = ? AND user_id = ?"
        ))
        .bind(id.to_string())
        .bind(&self.owner)
        .fetch_optional(&mut **conn)
        .await?
        .map(SalesProcess::try_from)
        .transpose()
    }

    async fn add_sales_process(&self, process: &NewSalesProcess) -> CrmResult<SalesProcess> {
        let created = SalesProcess {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            name: process.name.clone(),
            is_default: process.is_default,
            created_at: now(),
        };
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin_transaction().await?;
        if created.is_default {
            sqlx::query("UPDATE sales_processes SET is_default = 0 WHERE user_id = ?")
                .bind(&self.owner)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(&format!("INSERT INTO sales_processes ({PROCESS_COLUMNS}) VALUES (?, ?, ?, ?, ?)"))
            .bind(created.id.to_string())
            .bind(&self.owner)
            .bind(&created.name)
            .bind(i64::from(created.is_default))
            .bind(timestamp_to_nanos(created.created_at))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(id = %created.id, name = %created.name, "sales process created");
        Ok(created)
    }

    async fn update_sales_process(&self, id: Uuid, update: &SalesProcessUpdate) -> CrmResult<SalesProcess> {
        {
            let mut conn = self.state.conn().await?;
            let mut tx = conn.begin_transaction().await?;
            if update.is_default == Some(true) {
                sqlx::query("UPDATE sales_processes SET is_default = 0 WHERE user_id = ? AND id <> ?")
                    .bind(&self.owner)
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
            let mut sets = Vec::new();
            if let Some(v) = &update.name {
                sets.push(("name", SetValue::Text(Some(v.clone()))));
            }
            if let Some(v) = update.is_default {
                sets.push(("is_default", SetValue::Integer(i64::from(v))));
            }
            if !self.apply_update(&mut tx, "sales_processes", id, sets).await? {
                // Dropping the transaction rolls back the cleared defaults.
                return Err(CrmError::not_found("sales process"));
            }
            tx.commit().await?;
        }
        tracing::info!(%id, "sales process updated");
        self.get_sales_process_by_id(id)
            .await?
            .ok_or(CrmError::not_found("sales process"))
    }

    async fn delete_sales_process(&self, id: Uuid) -> CrmResult<()> {
        self.delete_row("sales_processes", id).await
    }
}

impl StageRepository for LocalWorkspace {
    async fn get_stages(&self, process_id: Uuid, stage_type: Option<StageType>) -> CrmResult<Vec<Stage>> {
        let mut conn = self.state.conn().await?;
        let stage_type = stage_type.map(StageType::as_str);
        sqlx::query_as::<_, StageRow>(&format!(
            "SELECT {STAGE_COLUMNS} FROM sales_stages
            WHERE process_id = ? AND user_id = ? AND (? IS NULL OR stage_type = ?)
            ORDER BY stage_order ASC, created_at ASC, rowid ASC"
        ))
        .bind(process_id.to_string())
        .bind(&self.owner)
        .bind(stage_type)
        .bind(stage_type)
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(Stage::try_from)
        .collect()
    }

    async fn get_stage_by_id(&self, id: Uuid) -> CrmResult<Option<Stage>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, StageRow>(&format!(
            "SELECT {STAGE_COLUMNS} FROM sales_stages WHERE id = ? AND user_id = ?"
        ))
        .bind(id.to_string())
        .bind(&self.owner)
        .fetch_optional(&mut **conn)
        .await?
        .map(Stage::try_from)
        .transpose()
    }

    async fn add_stage(&self, stage: &NewStage) -> CrmResult<Stage> {
        let mut conn = self.state.conn().await?;
        self.ensure_owned(&mut conn, "sales_processes", "sales process", Some(stage.process_id))
            .await?;
        let created = Stage {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            process_id: stage.process_id,
            name: stage.name.clone(),
            stage_order: stage.stage_order,
            stage_type: stage.stage_type,
            created_at: now(),
        };
        sqlx::query(&format!("INSERT INTO sales_stages ({STAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"))
            .bind(created.id.to_string())
            .bind(&self.owner)
            .bind(created.process_id.to_string())
            .bind(&created.name)
            .bind(i64::from(created.stage_order))
            .bind(created.stage_type.as_str())
            .bind(timestamp_to_nanos(created.created_at))
            .execute(&mut **conn)
            .await?;
        tracing::info!(id = %created.id, process = %created.process_id, "stage created");
        Ok(created)
    }

    async fn update_stage(&self, id: Uuid, update: &StageUpdate) -> CrmResult<Stage> {
        {
            let mut conn = self.state.conn().await?;
            let mut sets = Vec::new();
            if let Some(v) = &update.name {
                sets.push(("name", SetValue::Text(Some(v.clone()))));
            }
            if let Some(v) = update.stage_order {
                sets.push(("stage_order", SetValue::Integer(i64::from(v))));
            }
            if let Some(v) = update.stage_type {
                sets.push(("stage_type", SetValue::Text(Some(v.as_str().to_string()))));
            }
            if !self.apply_update(&mut conn, "sales_stages", id, sets).await? {
                return Err(CrmError::not_found("stage"));
            }
        }
        tracing::info!(%id, "stage updated");
        self.get_stage_by_id(id)
            .await?
            .ok_or(CrmError::not_found("stage"))
    }

    async fn delete_stage(&self, id: Uuid) -> CrmResult<()> {
        self.delete_row("sales_stages", id).await
    }
}

impl DealRepository for LocalWorkspace {
    async fn get_deals(&self, process_id: Option<Uuid>) -> CrmResult<Vec<DealCard>> {
        let mut conn = self.state.conn().await?;
        let process_id = opt_id_text(process_id);
        sqlx::query_as::<_, DealCardRow>(
            "SELECT d.id, d.user_id, d.title, d.value, d.contact_id, d.company_id,
                d.sales_process_id, d.current_stage_id, d.created_at,
                c.first_name AS contact_first_name,
                c.last_name AS contact_last_name,
                co.name AS company_name
            FROM deals d
            LEFT JOIN contacts c ON c.id = d.contact_id AND c.user_id = d.user_id
            LEFT JOIN companies co ON co.id = d.company_id AND co.user_id = d.user_id
            WHERE d.user_id = ? AND (? IS NULL OR d.sales_process_id = ?)
            ORDER BY d.created_at DESC, d.rowid DESC",
        )
        .bind(&self.owner)
        .bind(&process_id)
        .bind(&process_id)
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(DealCard::try_from)
        .collect()
    }

    async fn get_deal_by_id(&self, id: Uuid) -> CrmResult<Option<Deal>> {
        let mut conn = self.state.conn().await?;
        self.fetch_deal(&mut conn, id).await
    }

    async fn add_deal(&self, deal: &NewDeal) -> CrmResult<Deal> {
        let mut conn = self.state.conn().await?;
        self.ensure_owned(&mut conn, "sales_processes", "sales process", Some(deal.sales_process_id))
            .await?;
        self.ensure_stage_in_process(&mut conn, deal.current_stage_id, Some(deal.sales_process_id))
            .await?;
        self.ensure_owned(&mut conn, "contacts", "contact", deal.contact_id)
            .await?;
        self.ensure_owned(&mut conn, "companies", "company", deal.company_id)
            .await?;
        let created = Deal {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            title: deal.title.clone(),
            value: deal.value,
            contact_id: deal.contact_id,
            company_id: deal.company_id,
            sales_process_id: Some(deal.sales_process_id),
            current_stage_id: Some(deal.current_stage_id),
            created_at: now(),
        };
        sqlx::query(&format!("INSERT INTO deals ({DEAL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"))
            .bind(created.id.to_string())
            .bind(&self.owner)
            .bind(&created.title)
            .bind(created.value)
            .bind(opt_id_text(created.contact_id))
            .bind(opt_id_text(created.company_id))
            .bind(opt_id_text(created.sales_process_id))
            .bind(opt_id_text(created.current_stage_id))
            .bind(timestamp_to_nanos(created.created_at))
            .execute(&mut **conn)
            .await?;
        tracing::info!(id = %created.id, title = %created.title, "deal created");
        Ok(created)
    }

    async fn update_deal(&self, id: Uuid, update: &DealUpdate) -> CrmResult<Deal> {
        let mut conn = self.state.conn().await?;
        let existing = self
            .fetch_deal(&mut conn, id)
            .await?
            .ok_or(CrmError::not_found("deal"))?;
        if let Some(stage_id) = update.current_stage_id {
            self.ensure_stage_in_process(&mut conn, stage_id, existing.sales_process_id)
                .await?;
        }
        if let Some(contact_id) = update.contact_id {
            self.ensure_owned(&mut conn, "contacts", "contact", contact_id)
                .await?;
        }
        if let Some(company_id) = update.company_id {
            self.ensure_owned(&mut conn, "companies", "company", company_id)
                .await?;
        }

        let mut sets = Vec::new();
        if let Some(v) = &update.title {
            sets.push(("title", SetValue::Text(Some(v.clone()))));
        }
        if let Some(v) = update.value {
            sets.push(("value", SetValue::Real(v)));
        }
        if let Some(v) = update.contact_id {
            sets.push(("contact_id", SetValue::Text(opt_id_text(v))));
        }
        if let Some(v) = update.company_id {
            sets.push(("company_id", SetValue::Text(opt_id_text(v))));
        }
        if let Some(v) = update.current_stage_id {
            sets.push(("current_stage_id", SetValue::Text(Some(v.to_string()))));
        }
        if !self.apply_update(&mut conn, "deals", id, sets).await? {
            return Err(CrmError::not_found("deal"));
        }
        tracing::info!(%id, "deal updated");
        self.fetch_deal(&mut conn, id)
            .await?
            .ok_or(CrmError::not_found("deal"))
    }

    async fn move_deal(&self, id: Uuid, stage_id: Uuid) -> CrmResult<Deal> {
        let mut conn = self.state.conn().await?;
        let existing = self
            .fetch_deal(&mut conn, id)
            .await?
            .ok_or(CrmError::not_found("deal"))?;
        self.ensure_stage_in_process(&mut conn, stage_id, existing.sales_process_id)
            .await?;
        let sets = vec![("current_stage_id", SetValue::Text(Some(stage_id.to_string())))];
        if !self.apply_update(&mut conn, "deals", id, sets).await? {
            return Err(CrmError::not_found("deal"));
        }
        tracing::info!(%id, stage = %stage_id, "deal moved");
        self.fetch_deal(&mut conn, id)
            .await?
            .ok_or(CrmError::not_found("deal"))
    }

    async fn delete_deal(&self, id: Uuid) -> CrmResult<()> {
        self.delete_row("deals", id).await
    }

    async fn count_deals(&self, filter: DealFilter) -> CrmResult<u64> {
        let (column, id) = match filter {
            DealFilter::Process(id) => ("sales_process_id", id),
            DealFilter::Stage(id) => ("current_stage_id", id),
        };
        let mut conn = self.state.conn().await?;
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM deals WHERE user_id = ? AND {column} = ?"
        ))
        .bind(&self.owner)
        .bind(id.to_string())
        .fetch_one(&mut **conn)
        .await?;
        Ok(count.max(0) as u64)
    }
}

impl TaskRepository for LocalWorkspace {
    async fn get_tasks(&self) -> CrmResult<Vec<TaskItem>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, TaskItemRow>(
            "SELECT t.id, t.user_id, t.title, t.due_date, t.status, t.contact_id, t.company_id, t.created_at,
                c.first_name AS contact_first_name,
                c.last_name AS contact_last_name,
                co.name AS company_name
            FROM tasks t
            LEFT JOIN contacts c ON c.id = t.contact_id AND c.user_id = t.user_id
            LEFT JOIN companies co ON co.id = t.company_id AND co.user_id = t.user_id
            WHERE t.user_id = ?
            ORDER BY t.created_at DESC, t.rowid DESC",
        )
        .bind(&self.owner)
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(TaskItem::try_from)
        .collect()
    }

    async fn get_task_by_id(&self, id: Uuid) -> CrmResult<Option<Task>> {
        let mut conn = self.state.conn().await?;
        sqlx::query_as::<_, TaskRow>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND user_id = ?"))
            .bind(id.to_string())
            .bind(&self.owner)
            .fetch_optional(&mut **conn)
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn add_task(&self, task: &NewTask) -> CrmResult<Task> {
        let mut conn = self.state.conn().await?;
        self.ensure_owned(&mut conn, "contacts", "contact", task.contact_id)
            .await?;
        self.ensure_owned(&mut conn, "companies", "company", task.company_id)
            .await?;
        let created = Task {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            title: task.title.clone(),
            due_date: task.due_date,
            status: task.status,
            contact_id: task.contact_id,
            company_id: task.company_id,
            created_at: now(),
        };
        sqlx::query(&format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"))
            .bind(created.id.to_string())
            .bind(&self.owner)
            .bind(&created.title)
            .bind(created.due_date.map(format_date))
            .bind(created.status.as_str())
            .bind(opt_id_text(created.contact_id))
            .bind(opt_id_text(created.company_id))
            .bind(timestamp_to_nanos(created.created_at))
            .execute(&mut **conn)
            .await?;
        tracing::info!(id = %created.id, "task created");
        Ok(created)
    }

    async fn update_task(&self, id: Uuid, update: &TaskUpdate) -> CrmResult<Task> {
        {
            let mut conn = self.state.conn().await?;
            if let Some(contact_id) = update.contact_id {
                self.ensure_owned(&mut conn, "contacts", "contact", contact_id)
                    .await?;
            }
            if let Some(company_id) = update.company_id {
                self.ensure_owned(&mut conn, "companies", "company", company_id)
                    .await?;
            }
            let mut sets = Vec::new();
            if let Some(v) = &update.title {
                sets.push(("title", SetValue::Text(Some(v.clone()))));
            }
            if let Some(v) = update.due_date {
                sets.push(("due_date", SetValue::Text(v.map(format_date))));
            }
            if let Some(v) = update.status {
                sets.push(("status", SetValue::Text(Some(v.as_str().to_string()))));
            }
            if let Some(v) = update.contact_id {
                sets.push(("contact_id", SetValue::Text(opt_id_text(v))));
            }
            if let Some(v) = update.company_id {
                sets.push(("company_id", SetValue::Text(opt_id_text(v))));
            }
            if !self.apply_update(&mut conn, "tasks", id, sets).await? {
                return Err(CrmError::not_found("task"));
            }
        }
        tracing::info!(%id, "task updated");
        self.get_task_by_id(id)
            .await?
            .ok_or(CrmError::not_found("task"))
    }

    async fn delete_task(&self, id: Uuid) -> CrmResult<()> {
        self.delete_row("tasks", id).await
    }
}
