//! Integration tests for contacts, companies and tasks.
//!
//! Tests cover:
//! - Repository CRUD for each record kind
//! - Deleting a referenced company or contact clears the reference
//! - The list/form controller driving a full create-edit-delete cycle

mod common;

use common::*;
use crmdesk::crm::{
    Level,
    records::{self, Companies, ContactForm, Contacts, Editor, RecordsView, TaskForm, Tasks, Write},
};
use time::macros::date;

#[tokio::test]
async fn test_contact_crud() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;

    // 1. Create
    let acme = ws.add_company(&make_company("Acme")).await?;
    let contact = ws.add_contact(&make_contact("Ada", "Lovelace", Some(acme.id))).await?;
    assert_eq!(contact.full_name(), "Ada Lovelace");
    assert_eq!(contact.email, "ada@example.com");
    assert_eq!(contact.company_id, Some(acme.id));

    // 2. Update only the email, then unlink the company
    let updated = ws
        .update_contact(
            contact.id,
            &ContactUpdate {
                email: Some("ada@acme.test".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.email, "ada@acme.test");
    assert_eq!(updated.first_name, "Ada");
    assert_eq!(updated.company_id, Some(acme.id));

    let unlinked = ws
        .update_contact(
            contact.id,
            &ContactUpdate {
                company_id: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(unlinked.company_id, None);

    // 3. Delete twice
    ws.delete_contact(contact.id).await?;
    ws.delete_contact(contact.id).await?;
    assert!(ws.get_contact_by_id(contact.id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_update_missing_contact_is_not_found() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;

    let err = ws
        .update_contact(uuid::Uuid::new_v4(), &ContactUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CrmError::NotFound { entity: "contact" }), "unexpected error: {err}");

    Ok(())
}

#[tokio::test]
async fn test_listings_are_newest_first() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;

    for name in ["First", "Second", "Third"] {
        ws.add_company(&make_company(name)).await?;
    }

    let names: Vec<String> = ws.get_companies().await?.into_iter().map(|c| c.name).collect();
    assert_eq!(names, ["Third", "Second", "First"]);

    Ok(())
}

#[tokio::test]
async fn test_deleting_company_detaches_contacts_and_tasks() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;

    let acme = ws.add_company(&make_company("Acme")).await?;
    let contact = ws.add_contact(&make_contact("Ada", "Lovelace", Some(acme.id))).await?;
    let task = ws
        .add_task(&NewTask {
            title: "Send quote".into(),
            due_date: None,
            status: TaskStatus::Todo,
            contact_id: Some(contact.id),
            company_id: Some(acme.id),
        })
        .await?;

    ws.delete_company(acme.id).await?;

    let contact = ws.get_contact_by_id(contact.id).await?.unwrap();
    assert_eq!(contact.company_id, None);
    let task = ws.get_task_by_id(task.id).await?.unwrap();
    assert_eq!(task.company_id, None);
    assert_eq!(task.contact_id, Some(contact.id));

    Ok(())
}

#[tokio::test]
async fn test_task_crud_with_embedded_refs() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;

    let acme = ws.add_company(&make_company("Acme")).await?;
    let contact = ws.add_contact(&make_contact("Ada", "Lovelace", None)).await?;

    // 1. Create with a due date and both references
    let task = ws
        .add_task(&NewTask {
            title: "Follow up".into(),
            due_date: Some(date!(2025 - 03 - 14)),
            status: TaskStatus::Todo,
            contact_id: Some(contact.id),
            company_id: Some(acme.id),
        })
        .await?;
    assert_eq!(task.due_date, Some(date!(2025 - 03 - 14)));

    // 2. Listing carries the referenced names
    let items = ws.get_tasks().await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].contact.as_ref().map(|c| c.full_name()).as_deref(), Some("Ada Lovelace"));
    assert_eq!(items[0].company.as_ref().map(|c| c.name.as_str()), Some("Acme"));

    // 3. Complete it and clear the due date
    let done = ws
        .update_task(
            task.id,
            &TaskUpdate {
                status: Some(TaskStatus::Done),
                due_date: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(done.status, TaskStatus::Done);
    assert_eq!(done.due_date, None);

    // 4. Delete
    ws.delete_task(task.id).await?;
    assert!(ws.get_tasks().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_records_controller_full_cycle() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;
    let acme = ws.add_company(&make_company("Acme")).await?;

    let mut view = RecordsView::<Contacts>::default();

    // 1. Load: the contacts view also needs the company selector
    let listing = records::load::<Contacts, _>(&ws).await?;
    assert!(listing.rows.is_empty());
    assert_eq!(listing.companies.len(), 1);
    view.finish_load(Ok(listing));

    // 2. A blank form is rejected before any write
    view.start_create();
    let notice = view.submit().err().unwrap();
    assert_eq!(notice.level, Level::Error);
    assert!(matches!(view.editor, Editor::Creating(_)));

    // 3. Fill in and save
    *view.form_mut().unwrap() = ContactForm {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
        company_id: Some(acme.id),
    };
    let write = view.submit().map_err(|n| anyhow::anyhow!(n.message))?;
    let result = records::apply(&ws, &write).await.map_err(|e| e.to_string());
    let (notice, reload) = view.finish_write(write.kind(), result);
    assert_eq!(notice.message, "Contact added");
    assert!(reload);
    assert!(matches!(view.editor, Editor::Closed));

    let listing = records::load::<Contacts, _>(&ws).await?;
    assert_eq!(listing.rows.len(), 1);
    assert_eq!(listing.company_name(listing.rows[0].company_id), Some("Acme"));
    let id = listing.rows[0].id;
    view.finish_load(Ok(listing));

    // 4. Edit: the form is filled from the stored row
    view.start_edit(id);
    let form = records::open::<Contacts, _>(&ws, id).await.map_err(|e| e.to_string());
    assert!(view.finish_open(id, form).is_none());
    view.form_mut().unwrap().last_name = "King".into();
    let write = view.submit().map_err(|n| anyhow::anyhow!(n.message))?;
    assert!(matches!(write, Write::Update(updated, _) if updated == id));
    records::apply(&ws, &write).await?;
    assert_eq!(ws.get_contact_by_id(id).await?.unwrap().last_name, "King");

    // 5. Delete
    let write = Write::<Contacts>::Delete(id);
    let result = records::apply(&ws, &write).await.map_err(|e| e.to_string());
    let (notice, reload) = view.finish_write(write.kind(), result);
    assert_eq!(notice.message, "Contact deleted");
    assert!(reload);
    assert!(records::load::<Contacts, _>(&ws).await?.rows.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_opening_deleted_record_shows_not_found() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;
    let acme = ws.add_company(&make_company("Acme")).await?;
    ws.delete_company(acme.id).await?;

    let mut view = RecordsView::<Companies>::default();
    view.start_edit(acme.id);
    let form = records::open::<Companies, _>(&ws, acme.id).await.map_err(|e| e.to_string());
    assert!(view.finish_open(acme.id, form).is_none());
    assert!(matches!(&view.editor, Editor::Missing(message) if message == "Company not found"));

    Ok(())
}

#[tokio::test]
async fn test_failed_write_keeps_form_open() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;
    let acme = ws.add_company(&make_company("Acme")).await?;

    let mut view = RecordsView::<Tasks>::default();
    view.start_create();
    *view.form_mut().unwrap() = TaskForm {
        title: "Call".into(),
        company_id: Some(acme.id),
        ..Default::default()
    };
    let write = view.submit().map_err(|n| anyhow::anyhow!(n.message))?;

    // The company vanishes before the save lands
    ws.delete_company(acme.id).await?;
    let result = records::apply(&ws, &write).await.map_err(|e| e.to_string());
    let (notice, reload) = view.finish_write(write.kind(), result);

    assert_eq!(notice.level, Level::Error);
    assert!(notice.message.starts_with("Adding task failed"), "{}", notice.message);
    assert!(!reload);
    assert!(matches!(view.editor, Editor::Creating(_)));

    Ok(())
}
