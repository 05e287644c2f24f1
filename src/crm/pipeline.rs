//! Pure rules of the deals pipeline: which process is active, what goes in
//! each Kanban column, where a dropped card goes, and what a new deal needs.

use uuid::Uuid;

use crate::{
    core::db::{DealCard, NewDeal, SalesProcess, Stage, StageType},
    error::{CrmError, CrmResult},
};

/// Picks the active process: the last selected one if it still exists, else
/// the flagged default, else the first of `processes` (which are listed by
/// name).
pub fn resolve_active_process(processes: &[SalesProcess], last_selected: Option<Uuid>) -> Option<&SalesProcess> {
    last_selected
        .and_then(|id| processes.iter().find(|p| p.id == id))
        .or_else(|| processes.iter().find(|p| p.is_default))
        .or_else(|| processes.first())
}

/// Stages a new deal may start in: the open stages of its process, by order.
pub fn initial_stage_options(stages: &[Stage], process_id: Option<Uuid>) -> Vec<&Stage> {
    let Some(process_id) = process_id else {
        return Vec::new();
    };
    let mut options: Vec<&Stage> = stages
        .iter()
        .filter(|s| s.process_id == process_id && s.stage_type == StageType::Open)
        .collect();
    options.sort_by_key(|s| s.stage_order);
    options
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column<'a> {
    pub stage: &'a Stage,
    pub cards: Vec<&'a DealCard>,
}

/// One column per stage in `stage_order`; cards keep their listing order.
/// Cards without a matching stage (detached deals) are left out.
pub fn columns<'a>(stages: &'a [Stage], deals: &'a [DealCard]) -> Vec<Column<'a>> {
    let mut ordered: Vec<&Stage> = stages.iter().collect();
    ordered.sort_by_key(|s| s.stage_order);
    ordered
        .into_iter()
        .map(|stage| Column {
            stage,
            cards: deals
                .iter()
                .filter(|d| d.deal.current_stage_id == Some(stage.id))
                .collect(),
        })
        .collect()
}

/// A stage change caused by dropping a card on a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub deal_id: Uuid,
    pub from: Option<Uuid>,
    pub to: Uuid,
}

/// `None` when the card is dropped on its own column: nothing to write.
pub fn plan_drop(deal: &DealCard, target_stage: Uuid) -> Option<Move> {
    if deal.deal.current_stage_id == Some(target_stage) {
        return None;
    }
    Some(Move {
        deal_id: deal.deal.id,
        from: deal.deal.current_stage_id,
        to: target_stage,
    })
}

/// Parses an optional amount. Blank means no value.
pub fn parse_value(input: &str) -> CrmResult<Option<f64>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    match input.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(CrmError::validation(format!("'{input}' is not a valid amount"))),
    }
}

pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("${v:.0}"),
        Some(v) => format!("${v:.2}"),
        None => "No value".to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealForm {
    pub title: String,
    pub value: String,
    pub process_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
}

/// Rejects a new deal without title, process or initial stage before any
/// write.
pub fn validate_new_deal(form: &DealForm) -> CrmResult<NewDeal> {
    let (Some(process_id), Some(stage_id)) = (form.process_id, form.stage_id) else {
        return Err(CrmError::validation(
            "Please choose a sales process and an initial stage.",
        ));
    };
    let title = form.title.trim();
    if title.is_empty() {
        return Err(CrmError::validation("Title is required"));
    }
    Ok(NewDeal {
        title: title.to_string(),
        value: parse_value(&form.value)?,
        contact_id: form.contact_id,
        company_id: form.company_id,
        sales_process_id: process_id,
        current_stage_id: stage_id,
    })
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::core::db::Deal;

    fn process(name: &str, is_default: bool) -> SalesProcess {
        SalesProcess {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.into(),
            is_default,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn stage(process_id: Uuid, name: &str, order: i32, stage_type: StageType) -> Stage {
        Stage {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            process_id,
            name: name.into(),
            stage_order: order,
            stage_type,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn card(stage_id: Option<Uuid>) -> DealCard {
        DealCard {
            deal: Deal {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                title: "Acme Contract".into(),
                value: Some(5000.0),
                contact_id: None,
                company_id: None,
                sales_process_id: None,
                current_stage_id: stage_id,
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            contact: None,
            company: None,
        }
    }

    #[test]
    fn active_process_fallback_order() {
        let alpha = process("Alpha", false);
        let beta = process("Beta", true);
        let processes = vec![alpha.clone(), beta.clone()];

        assert_eq!(resolve_active_process(&processes, Some(alpha.id)).map(|p| p.id), Some(alpha.id));
        // Stale selection falls back to the default.
        assert_eq!(resolve_active_process(&processes, Some(Uuid::new_v4())).map(|p| p.id), Some(beta.id));
        assert_eq!(resolve_active_process(&processes, None).map(|p| p.id), Some(beta.id));

        let no_default = vec![alpha.clone(), process("Zulu", false)];
        assert_eq!(resolve_active_process(&no_default, None).map(|p| p.id), Some(alpha.id));
        assert!(resolve_active_process(&[], None).is_none());
    }

    #[test]
    fn initial_stages_are_open_stages_of_the_selected_process() {
        let p = Uuid::new_v4();
        let other = Uuid::new_v4();
        let stages = vec![
            stage(p, "Negotiation", 2, StageType::Open),
            stage(p, "Won", 3, StageType::Won),
            stage(p, "Lead", 1, StageType::Open),
            stage(other, "Elsewhere", 1, StageType::Open),
        ];
        let names: Vec<_> = initial_stage_options(&stages, Some(p))
            .into_iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Lead", "Negotiation"]);
        assert!(initial_stage_options(&stages, None).is_empty());
    }

    #[test]
    fn columns_follow_stage_order_and_skip_detached_cards() {
        let p = Uuid::new_v4();
        let stages = vec![stage(p, "Won", 2, StageType::Won), stage(p, "Lead", 1, StageType::Open)];
        let deals = vec![card(Some(stages[1].id)), card(None)];
        let cols = columns(&stages, &deals);
        assert_eq!(cols[0].stage.name, "Lead");
        assert_eq!(cols[0].cards.len(), 1);
        assert!(cols[1].cards.is_empty());
    }

    #[test]
    fn same_column_drop_plans_nothing() {
        let lead = Uuid::new_v4();
        let won = Uuid::new_v4();
        let deal = card(Some(lead));
        assert_eq!(plan_drop(&deal, lead), None);
        assert_eq!(
            plan_drop(&deal, won),
            Some(Move {
                deal_id: deal.deal.id,
                from: Some(lead),
                to: won
            })
        );
    }

    #[test]
    fn new_deal_requires_process_stage_and_title() {
        let mut form = DealForm {
            title: "Acme Contract".into(),
            ..Default::default()
        };
        assert!(validate_new_deal(&form).is_err());

        form.process_id = Some(Uuid::new_v4());
        assert!(validate_new_deal(&form).is_err());

        form.stage_id = Some(Uuid::new_v4());
        form.value = "abc".into();
        assert!(validate_new_deal(&form).is_err());

        form.value = " 5000 ".into();
        let new = validate_new_deal(&form).unwrap();
        assert_eq!(new.value, Some(5000.0));

        form.title = "   ".into();
        assert!(validate_new_deal(&form).is_err());
    }

    #[test]
    fn value_formatting() {
        assert_eq!(format_value(Some(5000.0)), "$5000");
        assert_eq!(format_value(Some(12.5)), "$12.50");
        assert_eq!(format_value(None), "No value");
    }
}
