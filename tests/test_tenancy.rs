//! Integration tests for per-user data isolation.
//!
//! Tests cover:
//! - Listings only return the signed-in user's rows
//! - Reads, updates and deletes of another user's rows
//! - References to another user's rows are rejected

mod common;

use common::*;

#[tokio::test]
async fn test_listings_are_scoped_to_owner() -> anyhow::Result<()> {
    let (_store, _temp_dir, alice, bob) = two_users().await;

    // 1. Alice fills her workspace
    let acme = alice.add_company(&make_company("Acme")).await?;
    alice.add_contact(&make_contact("Ada", "Lovelace", Some(acme.id))).await?;
    let pipeline = seed_default_pipeline(&alice).await;
    alice
        .add_deal(&make_deal("Big order", pipeline.process.id, pipeline.lead.id))
        .await?;

    // 2. Bob sees nothing of it
    assert!(bob.get_companies().await?.is_empty());
    assert!(bob.get_contacts().await?.is_empty());
    assert!(bob.get_sales_processes(ProcessOrder::Name).await?.is_empty());
    assert!(bob.get_deals(None).await?.is_empty());
    assert!(bob.get_stages(pipeline.process.id, None).await?.is_empty());

    // 3. Alice still sees her rows
    assert_eq!(alice.get_companies().await?.len(), 1);
    assert_eq!(alice.get_contacts().await?.len(), 1);
    assert_eq!(alice.get_deals(Some(pipeline.process.id)).await?.len(), 1);
    assert_eq!(alice.user_id(), acme.user_id);

    Ok(())
}

#[tokio::test]
async fn test_foreign_rows_are_invisible_by_id() -> anyhow::Result<()> {
    let (_store, _temp_dir, alice, bob) = two_users().await;
    let contact = alice.add_contact(&make_contact("Ada", "Lovelace", None)).await?;

    assert!(bob.get_contact_by_id(contact.id).await?.is_none());
    assert!(alice.get_contact_by_id(contact.id).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_foreign_update_is_not_found() -> anyhow::Result<()> {
    let (_store, _temp_dir, alice, bob) = two_users().await;
    let company = alice.add_company(&make_company("Acme")).await?;

    let update = CompanyUpdate {
        name: Some("Hijacked".into()),
        ..Default::default()
    };
    let err = bob.update_company(company.id, &update).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    // Row untouched
    let stored = alice.get_company_by_id(company.id).await?.unwrap();
    assert_eq!(stored.name, "Acme");

    Ok(())
}

#[tokio::test]
async fn test_foreign_delete_is_a_no_op() -> anyhow::Result<()> {
    let (_store, _temp_dir, alice, bob) = two_users().await;
    let company = alice.add_company(&make_company("Acme")).await?;

    bob.delete_company(company.id).await?;

    assert!(alice.get_company_by_id(company.id).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_foreign_references_are_rejected() -> anyhow::Result<()> {
    let (_store, _temp_dir, alice, bob) = two_users().await;
    let company = alice.add_company(&make_company("Acme")).await?;
    let pipeline = seed_default_pipeline(&alice).await;

    // Contact pointing at Alice's company
    let err = bob
        .add_contact(&make_contact("Bob", "Builder", Some(company.id)))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    // Stage under Alice's process
    let err = bob
        .add_stage(&NewStage {
            process_id: pipeline.process.id,
            name: "Sneaky".into(),
            stage_order: 9,
            stage_type: StageType::Open,
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    // Deal on Alice's pipeline
    assert!(
        bob.add_deal(&make_deal("Stolen", pipeline.process.id, pipeline.lead.id))
            .await
            .is_err()
    );
    assert!(alice.get_deals(None).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_default_flag_is_per_user() -> anyhow::Result<()> {
    let (_store, _temp_dir, alice, bob) = two_users().await;
    let alice_pipeline = seed_default_pipeline(&alice).await;
    seed_default_pipeline(&bob).await;

    // Bob's default does not clear Alice's
    let stored = alice
        .get_sales_process_by_id(alice_pipeline.process.id)
        .await?
        .unwrap();
    assert!(stored.is_default);

    Ok(())
}
