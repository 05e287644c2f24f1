use std::{convert::Infallible, fmt};

use iced::{
    Element, Length, Task,
    widget::{button, column, pick_list, row, scrollable, text, text_input},
};
use uuid::Uuid;

use crate::{
    core::db::{DataSource, TaskStatus, model::format_date},
    crm::records::{
        self, Companies, CompanyForm, ContactForm, Contacts, Editor, ListState, Listing, Record, RecordsView, TaskForm,
        Tasks, Write, WriteKind,
    },
    gui::{
        AppState,
        screens::{Screen, ScreenMessage, local},
        widgets::{Choice, failure, loading},
    },
};

/// How a record kind is rendered and how its form is edited.
pub trait RecordUi: Record + fmt::Debug + Clone {
    type Field: fmt::Debug + Clone + Send + 'static;

    fn headers() -> &'static [&'static str];
    fn cells(row: &Self::Row, listing: &Listing<Self>) -> Vec<String>;
    fn form<'a>(form: &'a Self::Form, listing: &'a Listing<Self>) -> Element<'a, Self::Field>;
    fn edit(form: &mut Self::Form, field: Self::Field);
}

fn contact_choices(listing: &Listing<impl Record>, selected: Option<Uuid>) -> (Vec<Choice>, Option<Choice>) {
    Choice::list(
        "No contact",
        listing.contacts.iter().map(|c| Choice::of(c.id, c)),
        selected,
    )
}

fn company_choices(listing: &Listing<impl Record>, selected: Option<Uuid>) -> (Vec<Choice>, Option<Choice>) {
    Choice::list(
        "No company",
        listing.companies.iter().map(|c| Choice::of(c.id, c)),
        selected,
    )
}

#[derive(Debug, Clone)]
pub enum ContactField {
    FirstName(String),
    LastName(String),
    Email(String),
    Company(Option<Uuid>),
}

impl RecordUi for Contacts {
    type Field = ContactField;

    fn headers() -> &'static [&'static str] {
        &["Name", "Email", "Company"]
    }

    fn cells(row: &Self::Row, listing: &Listing<Self>) -> Vec<String> {
        vec![
            row.full_name(),
            row.email.clone(),
            listing.company_name(row.company_id).unwrap_or("-").to_string(),
        ]
    }

    fn form<'a>(form: &'a ContactForm, listing: &'a Listing<Self>) -> Element<'a, ContactField> {
        let (companies, company) = company_choices(listing, form.company_id);
        column![
            text_input("First name", &form.first_name).on_input(ContactField::FirstName),
            text_input("Last name", &form.last_name).on_input(ContactField::LastName),
            text_input("Email", &form.email).on_input(ContactField::Email),
            pick_list(companies, company, |c: Choice| ContactField::Company(c.id)),
        ]
        .spacing(8)
        .into()
    }

    fn edit(form: &mut ContactForm, field: ContactField) {
        match field {
            ContactField::FirstName(v) => form.first_name = v,
            ContactField::LastName(v) => form.last_name = v,
            ContactField::Email(v) => form.email = v,
            ContactField::Company(id) => form.company_id = id,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompanyField {
    Name(String),
    Industry(String),
}

impl RecordUi for Companies {
    type Field = CompanyField;

    fn headers() -> &'static [&'static str] {
        &["Name", "Industry"]
    }

    fn cells(row: &Self::Row, _listing: &Listing<Self>) -> Vec<String> {
        vec![row.name.clone(), row.industry.clone().unwrap_or_else(|| "-".into())]
    }

    fn form<'a>(form: &'a CompanyForm, _listing: &'a Listing<Self>) -> Element<'a, CompanyField> {
        column![
            text_input("Name", &form.name).on_input(CompanyField::Name),
            text_input("Industry", &form.industry).on_input(CompanyField::Industry),
        ]
        .spacing(8)
        .into()
    }

    fn edit(form: &mut CompanyForm, field: CompanyField) {
        match field {
            CompanyField::Name(v) => form.name = v,
            CompanyField::Industry(v) => form.industry = v,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TaskField {
    Title(String),
    DueDate(String),
    Status(TaskStatus),
    Contact(Option<Uuid>),
    Company(Option<Uuid>),
}

impl RecordUi for Tasks {
    type Field = TaskField;

    fn headers() -> &'static [&'static str] {
        &["Title", "Due", "Status", "Contact", "Company"]
    }

    fn cells(row: &Self::Row, _listing: &Listing<Self>) -> Vec<String> {
        let task = &row.task;
        vec![
            task.title.clone(),
            task.due_date.map(format_date).unwrap_or_else(|| "-".into()),
            task.status.to_string(),
            row.contact.as_ref().map(|c| c.full_name()).unwrap_or_else(|| "-".into()),
            row.company.as_ref().map(|c| c.name.clone()).unwrap_or_else(|| "-".into()),
        ]
    }

    fn form<'a>(form: &'a TaskForm, listing: &'a Listing<Self>) -> Element<'a, TaskField> {
        let (contacts, contact) = contact_choices(listing, form.contact_id);
        let (companies, company) = company_choices(listing, form.company_id);
        column![
            text_input("Title", &form.title).on_input(TaskField::Title),
            text_input("Due date (YYYY-MM-DD)", &form.due_date).on_input(TaskField::DueDate),
            pick_list(TaskStatus::ALL, Some(form.status), TaskField::Status),
            pick_list(contacts, contact, |c: Choice| TaskField::Contact(c.id)),
            pick_list(companies, company, |c: Choice| TaskField::Company(c.id)),
        ]
        .spacing(8)
        .into()
    }

    fn edit(form: &mut TaskForm, field: TaskField) {
        match field {
            TaskField::Title(v) => form.title = v,
            TaskField::DueDate(v) => form.due_date = v,
            TaskField::Status(s) => form.status = s,
            TaskField::Contact(id) => form.contact_id = id,
            TaskField::Company(id) => form.company_id = id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordsScreen<R: RecordUi> {
    view: RecordsView<R>,
}

impl<R: RecordUi> Default for RecordsScreen<R> {
    fn default() -> Self {
        Self {
            view: RecordsView::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RecordsMessage<R: RecordUi> {
    Loaded(Result<Listing<R>, String>),
    New,
    Edit(Uuid),
    Opened(Uuid, Result<Option<R::Form>, String>),
    Field(R::Field),
    Save,
    Cancel,
    Delete(Uuid),
    Written(WriteKind, Result<(), String>),
}

impl<R: RecordUi> RecordsScreen<R> {
    /// Every entry into the view re-fetches its rows.
    pub fn enter<D: DataSource>(&mut self, state: &AppState<D>) -> Task<ScreenMessage<Self>> {
        self.view.begin_load();
        local(state.perform(
            |ws| async move { records::load::<R, _>(&ws).await },
            RecordsMessage::Loaded,
        ))
    }

    fn write<D: DataSource>(&self, state: &AppState<D>, write: Write<R>) -> Task<ScreenMessage<Self>> {
        let kind = write.kind();
        local(state.perform(
            move |ws| async move { records::apply(&ws, &write).await },
            move |result| RecordsMessage::Written(kind, result),
        ))
    }

    fn editor_view(&self) -> Option<Element<'_, RecordsMessage<R>>> {
        let form = match &self.view.editor {
            Editor::Closed => return None,
            Editor::Opening(_) => return Some(loading()),
            Editor::Missing(message) => {
                return Some(
                    column![failure(message), button("Back").on_press(RecordsMessage::Cancel)]
                        .spacing(8)
                        .into(),
                );
            }
            Editor::Creating(form) | Editor::Editing { form, .. } => form,
        };
        let title = match &self.view.editor {
            Editor::Editing { .. } => format!("Edit {}", R::SINGULAR.to_lowercase()),
            _ => format!("New {}", R::SINGULAR.to_lowercase()),
        };
        let fields = match self.view.listing() {
            Some(listing) => R::form(form, listing).map(RecordsMessage::Field),
            None => loading(),
        };
        Some(
            column![
                text(title).size(20),
                fields,
                row![
                    button("Save").on_press(RecordsMessage::Save),
                    button("Cancel").style(button::secondary).on_press(RecordsMessage::Cancel),
                ]
                .spacing(8),
            ]
            .spacing(10)
            .into(),
        )
    }

    fn list_view(&self) -> Element<'_, RecordsMessage<R>> {
        let listing = match &self.view.list {
            ListState::Loading => return loading(),
            ListState::Failed(message) => return failure(message),
            ListState::Loaded(listing) => listing,
        };
        if listing.rows.is_empty() {
            return text(format!("No {} yet.", R::PLURAL.to_lowercase())).into();
        }
        let mut header = row![].spacing(10);
        for title in R::headers() {
            header = header.push(text(*title).width(Length::FillPortion(2)));
        }
        let mut rows = column![header].spacing(6);
        for item in &listing.rows {
            let id = R::id(item);
            let mut line = row![].spacing(10);
            for cell in R::cells(item, listing) {
                line = line.push(text(cell).width(Length::FillPortion(2)));
            }
            line = line
                .push(button("Edit").on_press(RecordsMessage::Edit(id)))
                .push(button("Delete").style(button::danger).on_press(RecordsMessage::Delete(id)));
            rows = rows.push(line);
        }
        scrollable(rows).into()
    }
}

impl<R: RecordUi> Screen for RecordsScreen<R> {
    type Message = RecordsMessage<R>;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let mut content = column![
            row![
                text(R::PLURAL).size(28).width(Length::Fill),
                button(text(format!("Add {}", R::SINGULAR.to_lowercase()))).on_press(RecordsMessage::New),
            ]
            .spacing(10),
        ]
        .spacing(16);
        if let Some(editor) = self.editor_view() {
            content = content.push(editor);
        }
        let content: Element<'_, RecordsMessage<R>> = content.push(self.list_view()).into();
        content.map(ScreenMessage::ScreenMessage)
    }

    fn update<D: DataSource>(&mut self, message: Self::Message, state: &mut AppState<D>) -> Task<ScreenMessage<Self>> {
        match message {
            RecordsMessage::Loaded(result) => {
                self.view.finish_load(result);
                Task::none()
            }
            RecordsMessage::New => {
                self.view.start_create();
                Task::none()
            }
            RecordsMessage::Edit(id) => {
                self.view.start_edit(id);
                local(state.perform(
                    move |ws| async move { records::open::<R, _>(&ws, id).await },
                    move |result| RecordsMessage::Opened(id, result),
                ))
            }
            RecordsMessage::Opened(id, result) => {
                if let Some(notice) = self.view.finish_open(id, result) {
                    state.notify(notice);
                }
                Task::none()
            }
            RecordsMessage::Field(field) => {
                if let Some(form) = self.view.form_mut() {
                    R::edit(form, field);
                }
                Task::none()
            }
            RecordsMessage::Save => match self.view.submit() {
                Ok(write) => self.write(state, write),
                Err(notice) => {
                    state.notify(notice);
                    Task::none()
                }
            },
            RecordsMessage::Cancel => {
                self.view.cancel();
                Task::none()
            }
            RecordsMessage::Delete(id) => self.write(state, Write::Delete(id)),
            RecordsMessage::Written(kind, result) => {
                let (notice, reload) = self.view.finish_write(kind, result);
                state.notify(notice);
                if reload { self.enter(state) } else { Task::none() }
            }
        }
    }
}
