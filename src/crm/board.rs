//! Kanban board of deals for one sales process.
//!
//! The active process is remembered by the board instance. Drag-and-drop
//! updates the local snapshot first; a failed write reloads the board from
//! the backend.

use uuid::Uuid;

use crate::{
    core::db::{
        CompanyRef, CompanyRepository, ContactRef, ContactRepository, DealCard, DealRepository, DealUpdate, NewDeal,
        ProcessOrder, SalesProcess, SalesProcessRepository, Stage, StageRepository, StageType, Workspace,
    },
    crm::{
        Notification,
        pipeline::{self, Column, DealForm, Move, format_value, parse_value},
    },
    error::{CrmError, CrmResult},
};

#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    /// Every process of the user, by name.
    pub processes: Vec<SalesProcess>,
    pub active: Option<Uuid>,
    /// Stages of the active process, by order.
    pub stages: Vec<Stage>,
    /// Deals of the active process, newest first.
    pub deals: Vec<DealCard>,
    pub contacts: Vec<ContactRef>,
    pub companies: Vec<CompanyRef>,
}

impl BoardSnapshot {
    pub fn active_process(&self) -> Option<&SalesProcess> {
        let id = self.active?;
        self.processes.iter().find(|p| p.id == id)
    }

    pub fn columns(&self) -> Vec<Column<'_>> {
        pipeline::columns(&self.stages, &self.deals)
    }

    fn card_mut(&mut self, deal_id: Uuid) -> Option<&mut DealCard> {
        self.deals.iter_mut().find(|d| d.deal.id == deal_id)
    }
}

pub async fn fetch_board<W: Workspace>(ws: &W, last_selected: Option<Uuid>) -> CrmResult<BoardSnapshot> {
    let processes = ws.get_sales_processes(ProcessOrder::Name).await?;
    let Some(active) = pipeline::resolve_active_process(&processes, last_selected).map(|p| p.id) else {
        return Ok(BoardSnapshot {
            processes,
            active: None,
            stages: Vec::new(),
            deals: Vec::new(),
            contacts: Vec::new(),
            companies: Vec::new(),
        });
    };
    let stages = ws.get_stages(active, None).await?;
    let deals = ws.get_deals(Some(active)).await?;
    let contacts = ws
        .get_contacts()
        .await?
        .into_iter()
        .map(|c| ContactRef {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
        })
        .collect();
    let companies = ws
        .get_companies()
        .await?
        .into_iter()
        .map(|c| CompanyRef { id: c.id, name: c.name })
        .collect();
    tracing::debug!(process = %active, stages = stages.len(), deals = deals.len(), "board loaded");
    Ok(BoardSnapshot {
        processes,
        active: Some(active),
        stages,
        deals,
        contacts,
        companies,
    })
}

pub async fn fetch_open_stages<W: Workspace>(ws: &W, process_id: Uuid) -> CrmResult<Vec<Stage>> {
    ws.get_stages(process_id, Some(StageType::Open)).await
}

/// Writes only the stage of the moved deal.
pub async fn commit_move<W: Workspace>(ws: &W, mv: Move) -> CrmResult<()> {
    ws.move_deal(mv.deal_id, mv.to).await.map(drop)
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardState {
    Loading,
    /// No process exists: the board asks the user to configure one.
    NoProcesses,
    Ready(BoardSnapshot),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOptions {
    Loading,
    Ready(Vec<Stage>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DealEditor {
    pub deal_id: Uuid,
    pub process_id: Option<Uuid>,
    pub title: String,
    pub value: String,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    selected: Option<Uuid>,
    state: BoardState,
    dragging: Option<Uuid>,
    pub form: DealForm,
    form_stages: StageOptions,
    pub editor: Option<DealEditor>,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            selected: None,
            state: BoardState::Loading,
            dragging: None,
            form: DealForm::default(),
            form_stages: StageOptions::Ready(Vec::new()),
            editor: None,
        }
    }
}

impl Board {
    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn snapshot(&self) -> Option<&BoardSnapshot> {
        match &self.state {
            BoardState::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Last selected process, handed to [`fetch_board`] on reload.
    pub fn selected_process(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn begin_load(&mut self) {
        self.state = BoardState::Loading;
        self.dragging = None;
    }

    /// Returns a process whose open stages must be fetched for the new-deal
    /// form, if the form points somewhere other than the active process.
    pub fn finish_load(&mut self, result: Result<BoardSnapshot, String>) -> Option<Uuid> {
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(message) => {
                self.state = BoardState::Failed(message);
                return None;
            }
        };
        if snapshot.processes.is_empty() {
            self.selected = None;
            self.form = DealForm::default();
            self.state = BoardState::NoProcesses;
            return None;
        }

        self.selected = snapshot.active;
        let form_process_valid = self
            .form
            .process_id
            .is_some_and(|id| snapshot.processes.iter().any(|p| p.id == id));
        if !form_process_valid {
            self.form.process_id = snapshot.active;
            self.form.stage_id = None;
        }
        if !self
            .form
            .contact_id
            .is_some_and(|id| snapshot.contacts.iter().any(|c| c.id == id))
        {
            self.form.contact_id = None;
        }
        if !self
            .form
            .company_id
            .is_some_and(|id| snapshot.companies.iter().any(|c| c.id == id))
        {
            self.form.company_id = None;
        }

        let fetch = if self.form.process_id == snapshot.active {
            self.form_stages = StageOptions::Ready(
                pipeline::initial_stage_options(&snapshot.stages, snapshot.active)
                    .into_iter()
                    .cloned()
                    .collect(),
            );
            None
        } else {
            self.form_stages = StageOptions::Loading;
            self.form.process_id
        };
        self.state = BoardState::Ready(snapshot);
        self.keep_form_stage_valid();
        fetch
    }

    /// Switches the board to another process. The caller reloads.
    pub fn select_process(&mut self, process_id: Uuid) {
        tracing::debug!(process = %process_id, "board process selected");
        self.selected = Some(process_id);
        self.form.process_id = Some(process_id);
        self.form.stage_id = None;
        self.editor = None;
    }

    pub fn pick_up(&mut self, deal_id: Uuid) {
        self.dragging = Some(deal_id);
    }

    pub fn dragging(&self) -> Option<Uuid> {
        self.dragging
    }

    pub fn cancel_drag(&mut self) {
        self.dragging = None;
    }

    /// Drops the dragged card on a column. A move to another column is
    /// applied to the snapshot right away and returned for writing; a drop
    /// on the card's own column returns `None`.
    pub fn drop_on(&mut self, stage_id: Uuid) -> Option<Move> {
        let deal_id = self.dragging.take()?;
        let BoardState::Ready(snapshot) = &mut self.state else {
            return None;
        };
        if !snapshot.stages.iter().any(|s| s.id == stage_id) {
            return None;
        }
        let card = snapshot.card_mut(deal_id)?;
        let mv = pipeline::plan_drop(card, stage_id)?;
        card.deal.current_stage_id = Some(mv.to);
        tracing::debug!(deal = %deal_id, stage = %stage_id, "card moved");
        Some(mv)
    }

    /// Outcome of a move write. On failure the board goes back to loading and
    /// the caller reloads it.
    pub fn finish_move(&mut self, result: Result<(), String>) -> (Notification, bool) {
        match result {
            Ok(()) => (Notification::success("Deal stage updated"), false),
            Err(message) => {
                self.begin_load();
                (Notification::failed("Moving deal", message), true)
            }
        }
    }

    /// Changes the process of the new-deal form. Returns the process whose
    /// open stages must be fetched, if they are not already known.
    pub fn set_form_process(&mut self, process_id: Uuid) -> Option<Uuid> {
        self.form.process_id = Some(process_id);
        self.form.stage_id = None;
        match self.snapshot() {
            Some(snapshot) if snapshot.active == Some(process_id) => {
                let open = pipeline::initial_stage_options(&snapshot.stages, Some(process_id))
                    .into_iter()
                    .cloned()
                    .collect();
                self.form_stages = StageOptions::Ready(open);
                self.keep_form_stage_valid();
                None
            }
            _ => {
                self.form_stages = StageOptions::Loading;
                Some(process_id)
            }
        }
    }

    pub fn finish_form_stages(&mut self, process_id: Uuid, result: Result<Vec<Stage>, String>) {
        if self.form.process_id != Some(process_id) {
            return;
        }
        self.form_stages = match result {
            Ok(stages) => StageOptions::Ready(stages),
            Err(message) => StageOptions::Failed(message),
        };
        self.keep_form_stage_valid();
    }

    pub fn form_stages(&self) -> &StageOptions {
        &self.form_stages
    }

    /// Initial-stage choices for the new-deal form.
    pub fn form_stage_options(&self) -> Vec<&Stage> {
        match &self.form_stages {
            StageOptions::Ready(stages) => pipeline::initial_stage_options(stages, self.form.process_id),
            _ => Vec::new(),
        }
    }

    fn keep_form_stage_valid(&mut self) {
        let valid = self
            .form
            .stage_id
            .is_some_and(|id| self.form_stage_options().iter().any(|s| s.id == id));
        if !valid {
            self.form.stage_id = self.form_stage_options().first().map(|s| s.id);
        }
    }

    pub fn submit_new_deal(&self) -> Result<NewDeal, Notification> {
        let new = pipeline::validate_new_deal(&self.form).map_err(|e| Notification::error(e.to_string()))?;
        if !self
            .form_stage_options()
            .iter()
            .any(|s| s.id == new.current_stage_id)
        {
            return Err(Notification::error("The initial stage must be an open stage of the chosen process."));
        }
        Ok(new)
    }

    pub fn finish_create(&mut self, result: Result<(), String>) -> (Notification, bool) {
        match result {
            Ok(()) => {
                let process_id = self.form.process_id;
                self.form = DealForm {
                    process_id,
                    ..Default::default()
                };
                (Notification::success("Deal added"), true)
            }
            Err(message) => (Notification::failed("Adding deal", message), false),
        }
    }

    pub fn start_edit(&mut self, deal_id: Uuid) {
        let Some(card) = self.snapshot().and_then(|s| s.deals.iter().find(|d| d.deal.id == deal_id)) else {
            return;
        };
        let deal = &card.deal;
        self.editor = Some(DealEditor {
            deal_id,
            process_id: deal.sales_process_id,
            title: deal.title.clone(),
            value: deal.value.map(|v| v.to_string()).unwrap_or_default(),
            contact_id: deal.contact_id,
            company_id: deal.company_id,
            stage_id: deal.current_stage_id,
        });
    }

    pub fn cancel_edit(&mut self) {
        self.editor = None;
    }

    /// Any stage of the edited deal's own process.
    pub fn editor_stage_options(&self) -> Vec<&Stage> {
        let (Some(editor), Some(snapshot)) = (&self.editor, self.snapshot()) else {
            return Vec::new();
        };
        snapshot
            .stages
            .iter()
            .filter(|s| Some(s.process_id) == editor.process_id)
            .collect()
    }

    pub fn submit_edit(&self) -> Result<(Uuid, DealUpdate), Notification> {
        let Some(editor) = &self.editor else {
            return Err(Notification::error("Nothing to save"));
        };
        let reject = |e: CrmError| Notification::error(e.to_string());
        let title = editor.title.trim();
        if title.is_empty() {
            return Err(reject(CrmError::validation("Title is required")));
        }
        let value = parse_value(&editor.value).map_err(reject)?;
        if let Some(stage_id) = editor.stage_id {
            if !self.editor_stage_options().iter().any(|s| s.id == stage_id) {
                return Err(Notification::error("The stage must belong to the deal's sales process."));
            }
        }
        Ok((
            editor.deal_id,
            DealUpdate {
                title: Some(title.to_string()),
                value: Some(value),
                contact_id: Some(editor.contact_id),
                company_id: Some(editor.company_id),
                current_stage_id: editor.stage_id,
            },
        ))
    }

    pub fn finish_edit(&mut self, result: Result<(), String>) -> (Notification, bool) {
        match result {
            Ok(()) => {
                self.editor = None;
                (Notification::success("Deal updated"), true)
            }
            Err(message) => (Notification::failed("Updating deal", message), false),
        }
    }

    pub fn finish_delete(&mut self, deal_id: Uuid, result: Result<(), String>) -> (Notification, bool) {
        match result {
            Ok(()) => {
                if self.editor.as_ref().is_some_and(|e| e.deal_id == deal_id) {
                    self.editor = None;
                }
                (Notification::success("Deal deleted"), true)
            }
            Err(message) => (Notification::failed("Deleting deal", message), false),
        }
    }
}

/// Card text lines: value, contact, company.
pub fn card_details(card: &DealCard) -> [String; 3] {
    [
        format_value(card.deal.value),
        format!(
            "Contact: {}",
            card.contact.as_ref().map(|c| c.full_name()).unwrap_or_else(|| "None".into())
        ),
        format!(
            "Company: {}",
            card.company.as_ref().map(|c| c.name.clone()).unwrap_or_else(|| "None".into())
        ),
    ]
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::core::db::Deal;

    fn snapshot_with(stage_types: &[(&str, i32, StageType)]) -> BoardSnapshot {
        let process = SalesProcess {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: "Default Pipeline".into(),
            is_default: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let stages: Vec<Stage> = stage_types
            .iter()
            .map(|(name, order, stage_type)| Stage {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                process_id: process.id,
                name: (*name).into(),
                stage_order: *order,
                stage_type: *stage_type,
                created_at: OffsetDateTime::UNIX_EPOCH,
            })
            .collect();
        let deal = DealCard {
            deal: Deal {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                title: "Acme Contract".into(),
                value: Some(5000.0),
                contact_id: None,
                company_id: None,
                sales_process_id: Some(process.id),
                current_stage_id: Some(stages[0].id),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            contact: None,
            company: None,
        };
        BoardSnapshot {
            active: Some(process.id),
            processes: vec![process],
            stages,
            deals: vec![deal],
            contacts: Vec::new(),
            companies: Vec::new(),
        }
    }

    fn ready_board() -> Board {
        let mut board = Board::default();
        let snapshot = snapshot_with(&[
            ("Lead", 1, StageType::Open),
            ("Won", 2, StageType::Won),
            ("Lost", 3, StageType::Lost),
        ]);
        assert_eq!(board.finish_load(Ok(snapshot)), None);
        board
    }

    #[test]
    fn no_processes_blocks_the_board() {
        let mut board = Board::default();
        let mut snapshot = snapshot_with(&[("Lead", 1, StageType::Open)]);
        snapshot.processes.clear();
        snapshot.active = None;
        board.finish_load(Ok(snapshot));
        assert_eq!(board.state(), &BoardState::NoProcesses);
    }

    #[test]
    fn form_defaults_to_active_process_and_first_open_stage() {
        let board = ready_board();
        let snapshot = board.snapshot().unwrap();
        assert_eq!(board.form.process_id, snapshot.active);
        assert_eq!(board.form.stage_id, Some(snapshot.stages[0].id));
        assert_eq!(board.form_stage_options().len(), 1);
    }

    #[test]
    fn drop_moves_card_optimistically() {
        let mut board = ready_board();
        let snapshot = board.snapshot().unwrap().clone();
        let deal_id = snapshot.deals[0].deal.id;
        let lead = snapshot.stages[0].id;
        let won = snapshot.stages[1].id;

        board.pick_up(deal_id);
        assert_eq!(board.drop_on(lead), None);
        assert_eq!(board.dragging(), None);

        board.pick_up(deal_id);
        let mv = board.drop_on(won).unwrap();
        assert_eq!(mv.from, Some(lead));
        assert_eq!(mv.to, won);
        let moved = &board.snapshot().unwrap().deals[0];
        assert_eq!(moved.deal.current_stage_id, Some(won));
        assert_eq!(moved.deal.sales_process_id, snapshot.deals[0].deal.sales_process_id);

        let (notice, reload) = board.finish_move(Ok(()));
        assert!(!notice.is_error());
        assert!(!reload);
    }

    #[test]
    fn failed_move_reloads() {
        let mut board = ready_board();
        let (deal_id, won) = {
            let s = board.snapshot().unwrap();
            (s.deals[0].deal.id, s.stages[1].id)
        };
        board.pick_up(deal_id);
        assert!(board.drop_on(won).is_some());
        let (notice, reload) = board.finish_move(Err("offline".into()));
        assert!(notice.is_error());
        assert!(reload);
        assert_eq!(board.state(), &BoardState::Loading);
    }

    #[test]
    fn edit_rejects_bad_value() {
        let mut board = ready_board();
        let deal_id = board.snapshot().unwrap().deals[0].deal.id;
        board.start_edit(deal_id);
        board.editor.as_mut().unwrap().value = "lots".into();
        assert!(board.submit_edit().is_err());
        board.editor.as_mut().unwrap().value = "7500".into();
        let (id, update) = board.submit_edit().unwrap();
        assert_eq!(id, deal_id);
        assert_eq!(update.value, Some(Some(7500.0)));
    }
}
