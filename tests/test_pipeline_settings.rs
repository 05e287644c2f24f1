//! Integration tests for sales processes and their stages.
//!
//! Tests cover:
//! - At most one default process per user
//! - Stage listing order and type filter
//! - Deleting stages and processes detaches deals instead of deleting them
//! - The settings controller from process creation to delete confirmation

mod common;

use common::*;
use crmdesk::crm::settings::{self, DeleteTarget, Loadable, Selection, Settings, StageEditor, StageForm};

#[tokio::test]
async fn test_only_one_default_process() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;

    // 1. The second default takes over
    let first = seed_pipeline(&ws, "Inbound", true).await.process;
    let second = seed_pipeline(&ws, "Outbound", true).await.process;
    let defaults: Vec<_> = ws
        .get_sales_processes(ProcessOrder::Created)
        .await?
        .into_iter()
        .filter(|p| p.is_default)
        .map(|p| p.id)
        .collect();
    assert_eq!(defaults, [second.id]);

    // 2. Marking the first as default again clears the second
    let first = ws
        .update_sales_process(
            first.id,
            &SalesProcessUpdate {
                is_default: Some(true),
                ..Default::default()
            },
        )
        .await?;
    assert!(first.is_default);
    assert!(!ws.get_sales_process_by_id(second.id).await?.unwrap().is_default);

    Ok(())
}

#[tokio::test]
async fn test_processes_by_name_and_by_creation() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;

    for name in ["Renewals", "agency", "Direct"] {
        seed_pipeline(&ws, name, false).await;
    }

    let by_name: Vec<_> = ws
        .get_sales_processes(ProcessOrder::Name)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(by_name, ["agency", "Direct", "Renewals"]);

    let by_creation: Vec<_> = ws
        .get_sales_processes(ProcessOrder::Created)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(by_creation, ["Renewals", "agency", "Direct"]);

    Ok(())
}

#[tokio::test]
async fn test_stages_ordered_and_filtered_by_type() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;
    let pipeline = seed_default_pipeline(&ws).await;
    // Inserted after Won/Lost but ordered before them
    let qualified = add_stage(&ws, pipeline.process.id, "Qualified", 0, StageType::Open).await;

    let names: Vec<_> = ws
        .get_stages(pipeline.process.id, None)
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["Qualified", "Lead", "Won", "Lost"]);

    let open: Vec<_> = ws
        .get_stages(pipeline.process.id, Some(StageType::Open))
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(open, [qualified.id, pipeline.lead.id]);

    Ok(())
}

#[tokio::test]
async fn test_update_stage() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;
    let pipeline = seed_default_pipeline(&ws).await;

    let stage = ws
        .update_stage(
            pipeline.lead.id,
            &StageUpdate {
                name: Some("Prospect".into()),
                stage_order: Some(5),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(stage.name, "Prospect");
    assert_eq!(stage.stage_order, 5);
    assert_eq!(stage.stage_type, StageType::Open);
    assert_eq!(stage.process_id, pipeline.process.id);

    Ok(())
}

#[tokio::test]
async fn test_delete_stage_detaches_deals() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;
    let pipeline = seed_default_pipeline(&ws).await;
    let p = pipeline.process.id;

    let first = ws.add_deal(&make_deal("First", p, pipeline.lead.id)).await?;
    let second = ws.add_deal(&make_deal("Second", p, pipeline.lead.id)).await?;
    ws.add_deal(&make_deal("Closed", p, pipeline.won.id)).await?;

    // 1. Count before deleting
    assert_eq!(ws.count_deals(DealFilter::Stage(pipeline.lead.id)).await?, 2);

    // 2. Delete: deals stay, with no stage but the same process
    ws.delete_stage(pipeline.lead.id).await?;
    for id in [first.id, second.id] {
        let deal = ws.get_deal_by_id(id).await?.unwrap();
        assert_eq!(deal.current_stage_id, None);
        assert_eq!(deal.sales_process_id, Some(p));
    }
    assert_eq!(ws.count_deals(DealFilter::Stage(pipeline.lead.id)).await?, 0);
    assert_eq!(ws.count_deals(DealFilter::Process(p)).await?, 3);

    // 3. Deleting again is fine
    ws.delete_stage(pipeline.lead.id).await?;

    Ok(())
}

#[tokio::test]
async fn test_delete_process_removes_stages_and_detaches_deals() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;
    let pipeline = seed_default_pipeline(&ws).await;
    let p = pipeline.process.id;
    let deal = ws.add_deal(&make_deal("Orphan", p, pipeline.lead.id)).await?;

    ws.delete_sales_process(p).await?;

    assert!(ws.get_sales_process_by_id(p).await?.is_none());
    assert!(ws.get_stage_by_id(pipeline.won.id).await?.is_none());
    assert!(ws.get_stages(p, None).await?.is_empty());
    let deal = ws.get_deal_by_id(deal.id).await?.unwrap();
    assert_eq!(deal.sales_process_id, None);
    assert_eq!(deal.current_stage_id, None);
    assert_eq!(deal.title, "Orphan");

    ws.delete_sales_process(p).await?;

    Ok(())
}

#[tokio::test]
async fn test_add_stage_to_missing_process() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;

    let err = ws
        .add_stage(&NewStage {
            process_id: uuid::Uuid::new_v4(),
            name: "Lead".into(),
            stage_order: 1,
            stage_type: StageType::Open,
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    Ok(())
}

#[tokio::test]
async fn test_settings_controller_builds_a_pipeline() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;
    let mut view = Settings::default();

    // 1. Empty list
    view.begin_load();
    assert_eq!(view.finish_load(Ok(settings::fetch_processes(&ws).await?)), None);
    assert!(matches!(view.processes(), Loadable::Loaded(p) if p.is_empty()));

    // 2. Create a process; it becomes the managed one
    assert!(view.submit_process().is_err());
    view.process_form.name = "Enterprise".into();
    view.process_form.is_default = true;
    let write = view.submit_process().map_err(|n| anyhow::anyhow!(n.message))?;
    let saved = settings::save_process(&ws, &write).await.map_err(|e| e.to_string());
    let (notice, reload) = view.finish_save_process(saved);
    assert_eq!(notice.message, "Sales process created");
    assert!(reload);
    let Selection::Managing(process_id) = view.selection() else {
        panic!("expected the new process to be managed, got {:?}", view.selection());
    };

    // 3. Reload refetches the managed process' stages
    let refetch = view.finish_load(Ok(settings::fetch_processes(&ws).await?));
    assert_eq!(refetch, Some(process_id));
    assert_eq!(view.selected_process().map(|p| p.name.as_str()), Some("Enterprise"));
    view.finish_stages(process_id, Ok(settings::fetch_stages(&ws, process_id).await?));
    assert!(matches!(view.stages(), Loadable::Loaded(s) if s.is_empty()));

    // 4. A stage with a non-numeric order is rejected
    view.start_new_stage();
    *view.stage_form_mut().unwrap() = StageForm {
        name: "Discovery".into(),
        order: "first".into(),
        stage_type: StageType::Open,
    };
    let notice = view.submit_stage().err().unwrap();
    assert_eq!(notice.message, "Stage order must be a whole number");

    // 5. Fix the order and save
    view.stage_form_mut().unwrap().order = "1".into();
    let write = view.submit_stage().map_err(|n| anyhow::anyhow!(n.message))?;
    let saved = settings::save_stage(&ws, &write).await.map(drop).map_err(|e| e.to_string());
    let (notice, refetch) = view.finish_save_stage(saved);
    assert_eq!(notice.message, "Stage added");
    assert_eq!(refetch, Some(process_id));
    assert_eq!(view.stage_editor, StageEditor::Closed);

    let stages = settings::fetch_stages(&ws, process_id).await?;
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].name, "Discovery");
    assert_eq!(stages[0].stage_order, 1);

    Ok(())
}

#[tokio::test]
async fn test_settings_delete_reports_impact() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let ws = sign_up(&store, "owner@example.com").await;
    let pipeline = seed_default_pipeline(&ws).await;
    let p = pipeline.process.id;
    ws.add_deal(&make_deal("One", p, pipeline.lead.id)).await?;
    ws.add_deal(&make_deal("Two", p, pipeline.won.id)).await?;

    let mut view = Settings::default();
    view.finish_load(Ok(settings::fetch_processes(&ws).await?));
    view.manage(p);

    // 1. Stage with one deal
    let impact = settings::assess_delete(&ws, DeleteTarget::Stage(pipeline.lead.id)).await?;
    assert_eq!(impact.message(), "Delete this stage? 1 deal will lose their stage.");

    // 2. Stage with none
    let impact = settings::assess_delete(&ws, DeleteTarget::Stage(pipeline.lost.id)).await?;
    assert_eq!(impact.message(), "Delete this stage? This cannot be undone.");

    // 3. The process: confirm, delete, selection cleared
    let impact = settings::assess_delete(&ws, DeleteTarget::Process(p)).await;
    assert!(view.finish_assess(impact.map_err(|e| e.to_string())).is_none());
    assert_eq!(
        view.pending_delete().map(|i| i.message()).as_deref(),
        Some("Delete this sales process and all of its stages? 2 deals will lose their process and stage.")
    );
    let target = view.confirm_delete().unwrap();
    assert!(view.pending_delete().is_none());
    let result = settings::apply_delete(&ws, target).await.map_err(|e| e.to_string());
    let (notice, reload) = view.finish_delete(target, result);
    assert_eq!(notice.message, "Sales process deleted");
    assert!(reload);
    assert_eq!(view.selection(), Selection::NoneSelected);

    // 4. Reload shows nothing left
    assert_eq!(view.finish_load(Ok(settings::fetch_processes(&ws).await?)), None);
    assert!(matches!(view.processes(), Loadable::Loaded(p) if p.is_empty()));
    assert_eq!(ws.get_deals(None).await?.len(), 2);

    Ok(())
}
