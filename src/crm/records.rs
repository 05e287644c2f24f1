//! List + form controller shared by the contacts, companies and tasks views.
//!
//! A [`Record`] describes one kind of row: how to fetch it, how its form is
//! validated into insert/update payloads, and which lookups (contacts,
//! companies) the form selectors need. [`RecordsView`] holds the state of one
//! view instance; the async functions run the reads and writes against a
//! [`Workspace`].

use std::{fmt, future::Future};

use uuid::Uuid;

use crate::{
    core::db::{
        Company, CompanyRef, CompanyRepository, CompanyUpdate, Contact, ContactRef, ContactRepository,
        ContactUpdate, NewCompany, NewContact, NewTask, TaskItem, TaskRepository, TaskStatus, TaskUpdate, Workspace,
        model::{format_date, parse_date},
    },
    crm::Notification,
    error::{CrmError, CrmResult},
};

pub trait Record: Send + Sync + 'static {
    type Row: Clone + fmt::Debug + Send + Sync + 'static;
    type Form: Clone + Default + fmt::Debug + Send + Sync + 'static;
    type New: Send + Sync + 'static;
    type Update: Send + Sync + 'static;

    const SINGULAR: &'static str;
    const PLURAL: &'static str;
    const NEEDS_CONTACTS: bool;
    const NEEDS_COMPANIES: bool;

    fn id(row: &Self::Row) -> Uuid;
    fn validate_new(form: &Self::Form) -> CrmResult<Self::New>;
    fn validate_update(form: &Self::Form) -> CrmResult<Self::Update>;

    fn fetch<W: Workspace>(ws: &W) -> impl Future<Output = CrmResult<Vec<Self::Row>>> + Send;
    fn fetch_form<W: Workspace>(ws: &W, id: Uuid) -> impl Future<Output = CrmResult<Option<Self::Form>>> + Send;
    fn insert<W: Workspace>(ws: &W, new: &Self::New) -> impl Future<Output = CrmResult<()>> + Send;
    fn update<W: Workspace>(ws: &W, id: Uuid, update: &Self::Update) -> impl Future<Output = CrmResult<()>> + Send;
    fn delete<W: Workspace>(ws: &W, id: Uuid) -> impl Future<Output = CrmResult<()>> + Send;
}

fn required(value: &str, label: &str) -> CrmResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CrmError::validation(format!("{label} is required")));
    }
    Ok(value.to_string())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company_id: Option<Uuid>,
}

impl From<&Contact> for ContactForm {
    fn from(c: &Contact) -> Self {
        Self {
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            email: c.email.clone(),
            company_id: c.company_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyForm {
    pub name: String,
    pub industry: String,
}

impl From<&Company> for CompanyForm {
    fn from(c: &Company) -> Self {
        Self {
            name: c.name.clone(),
            industry: c.industry.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    /// `YYYY-MM-DD` or empty.
    pub due_date: String,
    pub status: TaskStatus,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
}

impl TaskForm {
    fn due_date(&self) -> CrmResult<Option<time::Date>> {
        optional(&self.due_date).map(|d| parse_date(&d)).transpose()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Contacts;

#[derive(Debug, Clone, Copy)]
pub struct Companies;

#[derive(Debug, Clone, Copy)]
pub struct Tasks;

impl Record for Contacts {
    type Row = Contact;
    type Form = ContactForm;
    type New = NewContact;
    type Update = ContactUpdate;

    const SINGULAR: &'static str = "Contact";
    const PLURAL: &'static str = "Contacts";
    const NEEDS_CONTACTS: bool = false;
    const NEEDS_COMPANIES: bool = true;

    fn id(row: &Contact) -> Uuid {
        row.id
    }

    fn validate_new(form: &ContactForm) -> CrmResult<NewContact> {
        Ok(NewContact {
            first_name: required(&form.first_name, "First name")?,
            last_name: required(&form.last_name, "Last name")?,
            email: required(&form.email, "Email")?,
            company_id: form.company_id,
        })
    }

    fn validate_update(form: &ContactForm) -> CrmResult<ContactUpdate> {
        let new = Self::validate_new(form)?;
        Ok(ContactUpdate {
            first_name: Some(new.first_name),
            last_name: Some(new.last_name),
            email: Some(new.email),
            company_id: Some(new.company_id),
        })
    }

    async fn fetch<W: Workspace>(ws: &W) -> CrmResult<Vec<Contact>> {
        ws.get_contacts().await
    }

    async fn fetch_form<W: Workspace>(ws: &W, id: Uuid) -> CrmResult<Option<ContactForm>> {
        Ok(ws.get_contact_by_id(id).await?.as_ref().map(ContactForm::from))
    }

    async fn insert<W: Workspace>(ws: &W, new: &NewContact) -> CrmResult<()> {
        ws.add_contact(new).await.map(drop)
    }

    async fn update<W: Workspace>(ws: &W, id: Uuid, update: &ContactUpdate) -> CrmResult<()> {
        ws.update_contact(id, update).await.map(drop)
    }

    async fn delete<W: Workspace>(ws: &W, id: Uuid) -> CrmResult<()> {
        ws.delete_contact(id).await
    }
}

impl Record for Companies {
    type Row = Company;
    type Form = CompanyForm;
    type New = NewCompany;
    type Update = CompanyUpdate;

    const SINGULAR: &'static str = "Company";
    const PLURAL: &'static str = "Companies";
    const NEEDS_CONTACTS: bool = false;
    const NEEDS_COMPANIES: bool = false;

    fn id(row: &Company) -> Uuid {
        row.id
    }

    fn validate_new(form: &CompanyForm) -> CrmResult<NewCompany> {
        Ok(NewCompany {
            name: required(&form.name, "Company name")?,
            industry: optional(&form.industry),
        })
    }

    fn validate_update(form: &CompanyForm) -> CrmResult<CompanyUpdate> {
        let new = Self::validate_new(form)?;
        Ok(CompanyUpdate {
            name: Some(new.name),
            industry: Some(new.industry),
        })
    }

    async fn fetch<W: Workspace>(ws: &W) -> CrmResult<Vec<Company>> {
        ws.get_companies().await
    }

    async fn fetch_form<W: Workspace>(ws: &W, id: Uuid) -> CrmResult<Option<CompanyForm>> {
        Ok(ws.get_company_by_id(id).await?.as_ref().map(CompanyForm::from))
    }

    async fn insert<W: Workspace>(ws: &W, new: &NewCompany) -> CrmResult<()> {
        ws.add_company(new).await.map(drop)
    }

    async fn update<W: Workspace>(ws: &W, id: Uuid, update: &CompanyUpdate) -> CrmResult<()> {
        ws.update_company(id, update).await.map(drop)
    }

    async fn delete<W: Workspace>(ws: &W, id: Uuid) -> CrmResult<()> {
        ws.delete_company(id).await
    }
}

impl Record for Tasks {
    type Row = TaskItem;
    type Form = TaskForm;
    type New = NewTask;
    type Update = TaskUpdate;

    const SINGULAR: &'static str = "Task";
    const PLURAL: &'static str = "Tasks";
    const NEEDS_CONTACTS: bool = true;
    const NEEDS_COMPANIES: bool = true;

    fn id(row: &TaskItem) -> Uuid {
        row.task.id
    }

    fn validate_new(form: &TaskForm) -> CrmResult<NewTask> {
        Ok(NewTask {
            title: required(&form.title, "Title")?,
            due_date: form.due_date()?,
            status: form.status,
            contact_id: form.contact_id,
            company_id: form.company_id,
        })
    }

    fn validate_update(form: &TaskForm) -> CrmResult<TaskUpdate> {
        let new = Self::validate_new(form)?;
        Ok(TaskUpdate {
            title: Some(new.title),
            due_date: Some(new.due_date),
            status: Some(new.status),
            contact_id: Some(new.contact_id),
            company_id: Some(new.company_id),
        })
    }

    async fn fetch<W: Workspace>(ws: &W) -> CrmResult<Vec<TaskItem>> {
        ws.get_tasks().await
    }

    async fn fetch_form<W: Workspace>(ws: &W, id: Uuid) -> CrmResult<Option<TaskForm>> {
        Ok(ws.get_task_by_id(id).await?.map(|t| TaskForm {
            title: t.title,
            due_date: t.due_date.map(format_date).unwrap_or_default(),
            status: t.status,
            contact_id: t.contact_id,
            company_id: t.company_id,
        }))
    }

    async fn insert<W: Workspace>(ws: &W, new: &NewTask) -> CrmResult<()> {
        ws.add_task(new).await.map(drop)
    }

    async fn update<W: Workspace>(ws: &W, id: Uuid, update: &TaskUpdate) -> CrmResult<()> {
        ws.update_task(id, update).await.map(drop)
    }

    async fn delete<W: Workspace>(ws: &W, id: Uuid) -> CrmResult<()> {
        ws.delete_task(id).await
    }
}

/// Rows of a view plus the selector lookups its form needs.
#[derive(Debug, Clone)]
pub struct Listing<R: Record> {
    pub rows: Vec<R::Row>,
    pub contacts: Vec<ContactRef>,
    pub companies: Vec<CompanyRef>,
}

impl<R: Record> Listing<R> {
    pub fn company_name(&self, id: Option<Uuid>) -> Option<&str> {
        let id = id?;
        self.companies.iter().find(|c| c.id == id).map(|c| c.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum ListState<R: Record> {
    Loading,
    Loaded(Listing<R>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum Editor<R: Record> {
    Closed,
    Creating(R::Form),
    /// Fetching the row to edit.
    Opening(Uuid),
    Editing { id: Uuid, form: R::Form },
    /// The row is gone or belongs to someone else.
    Missing(String),
}

/// A validated write, ready to run.
pub enum Write<R: Record> {
    Create(R::New),
    Update(Uuid, R::Update),
    Delete(Uuid),
}

#[derive(Debug, Clone)]
pub struct RecordsView<R: Record> {
    pub list: ListState<R>,
    pub editor: Editor<R>,
}

impl<R: Record> Default for RecordsView<R> {
    fn default() -> Self {
        Self {
            list: ListState::Loading,
            editor: Editor::Closed,
        }
    }
}

impl<R: Record> RecordsView<R> {
    pub fn begin_load(&mut self) {
        self.list = ListState::Loading;
    }

    pub fn finish_load(&mut self, result: Result<Listing<R>, String>) {
        self.list = match result {
            Ok(listing) => ListState::Loaded(listing),
            Err(message) => ListState::Failed(message),
        };
    }

    pub fn listing(&self) -> Option<&Listing<R>> {
        match &self.list {
            ListState::Loaded(listing) => Some(listing),
            _ => None,
        }
    }

    pub fn start_create(&mut self) {
        self.editor = Editor::Creating(R::Form::default());
    }

    pub fn start_edit(&mut self, id: Uuid) {
        self.editor = Editor::Opening(id);
    }

    pub fn finish_open(&mut self, id: Uuid, result: Result<Option<R::Form>, String>) -> Option<Notification> {
        if !matches!(self.editor, Editor::Opening(opening) if opening == id) {
            return None;
        }
        match result {
            Ok(Some(form)) => {
                self.editor = Editor::Editing { id, form };
                None
            }
            Ok(None) => {
                self.editor = Editor::Missing(format!("{} not found", R::SINGULAR));
                None
            }
            Err(message) => {
                self.editor = Editor::Closed;
                Some(Notification::failed(&format!("Loading {}", R::SINGULAR.to_lowercase()), message))
            }
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut R::Form> {
        match &mut self.editor {
            Editor::Creating(form) | Editor::Editing { form, .. } => Some(form),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.editor = Editor::Closed;
    }

    /// Validates the open form. On rejection the form stays open.
    pub fn submit(&self) -> Result<Write<R>, Notification> {
        let result = match &self.editor {
            Editor::Creating(form) => R::validate_new(form).map(Write::Create),
            Editor::Editing { id, form } => R::validate_update(form).map(|u| Write::Update(*id, u)),
            _ => return Err(Notification::error("Nothing to save")),
        };
        result.map_err(|e| Notification::error(e.to_string()))
    }

    /// Outcome of a write. Returns the notification to show and whether the
    /// list must be reloaded.
    pub fn finish_write(&mut self, action: WriteKind, result: Result<(), String>) -> (Notification, bool) {
        match result {
            Ok(()) => {
                if action != WriteKind::Delete {
                    self.editor = Editor::Closed;
                }
                (Notification::success(format!("{} {}", R::SINGULAR, action.past_tense())), true)
            }
            Err(message) => (
                Notification::failed(&format!("{} {}", action.verb(), R::SINGULAR.to_lowercase()), message),
                false,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
    Delete,
}

impl WriteKind {
    fn verb(self) -> &'static str {
        match self {
            WriteKind::Create => "Adding",
            WriteKind::Update => "Updating",
            WriteKind::Delete => "Deleting",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            WriteKind::Create => "added",
            WriteKind::Update => "updated",
            WriteKind::Delete => "deleted",
        }
    }
}

impl<R: Record> Write<R> {
    pub fn kind(&self) -> WriteKind {
        match self {
            Write::Create(_) => WriteKind::Create,
            Write::Update(..) => WriteKind::Update,
            Write::Delete(_) => WriteKind::Delete,
        }
    }
}

pub async fn load<R: Record, W: Workspace>(ws: &W) -> CrmResult<Listing<R>> {
    let rows = R::fetch(ws).await?;
    let contacts = if R::NEEDS_CONTACTS {
        ws.get_contacts()
            .await?
            .into_iter()
            .map(|c| ContactRef {
                id: c.id,
                first_name: c.first_name,
                last_name: c.last_name,
            })
            .collect()
    } else {
        Vec::new()
    };
    let companies = if R::NEEDS_COMPANIES {
        ws.get_companies()
            .await?
            .into_iter()
            .map(|c| CompanyRef { id: c.id, name: c.name })
            .collect()
    } else {
        Vec::new()
    };
    tracing::debug!(view = R::PLURAL, rows = rows.len(), "listing loaded");
    Ok(Listing { rows, contacts, companies })
}

pub async fn open<R: Record, W: Workspace>(ws: &W, id: Uuid) -> CrmResult<Option<R::Form>> {
    R::fetch_form(ws, id).await
}

pub async fn apply<R: Record, W: Workspace>(ws: &W, write: &Write<R>) -> CrmResult<()> {
    match write {
        Write::Create(new) => R::insert(ws, new).await,
        Write::Update(id, update) => R::update(ws, *id, update).await,
        Write::Delete(id) => R::delete(ws, *id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_due_date_must_be_iso() {
        let mut form = TaskForm {
            title: "Call back".into(),
            due_date: "31/12/2025".into(),
            ..Default::default()
        };
        assert!(matches!(Tasks::validate_new(&form), Err(CrmError::Validation(_))));

        form.due_date = "2025-12-31".into();
        let new = Tasks::validate_new(&form).unwrap();
        assert_eq!(new.due_date.map(format_date).as_deref(), Some("2025-12-31"));
        assert_eq!(new.status, TaskStatus::Todo);

        form.due_date = "  ".into();
        assert_eq!(Tasks::validate_new(&form).unwrap().due_date, None);
    }

    #[test]
    fn blank_required_fields_are_rejected() {
        let form = ContactForm {
            first_name: "Ann".into(),
            last_name: " ".into(),
            email: "ann@example.com".into(),
            company_id: None,
        };
        assert!(Contacts::validate_new(&form).is_err());
        assert!(Companies::validate_new(&CompanyForm::default()).is_err());
    }

    #[test]
    fn company_update_clears_blank_industry() {
        let form = CompanyForm {
            name: " Acme ".into(),
            industry: "".into(),
        };
        let update = Companies::validate_update(&form).unwrap();
        assert_eq!(update.name.as_deref(), Some("Acme"));
        assert_eq!(update.industry, Some(None));
    }

    #[test]
    fn submit_without_open_form_is_rejected() {
        let view = RecordsView::<Companies>::default();
        assert!(view.submit().is_err());
    }

    #[test]
    fn failed_write_keeps_form_open() {
        let mut view = RecordsView::<Companies>::default();
        view.start_create();
        let (notice, reload) = view.finish_write(WriteKind::Create, Err("offline".into()));
        assert!(notice.is_error());
        assert!(!reload);
        assert!(matches!(view.editor, Editor::Creating(_)));

        let (notice, reload) = view.finish_write(WriteKind::Create, Ok(()));
        assert_eq!(notice.message, "Company added");
        assert!(reload);
        assert!(matches!(view.editor, Editor::Closed));
    }
}
