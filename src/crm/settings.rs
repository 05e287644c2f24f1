//! Sales process and stage settings.

use uuid::Uuid;

use crate::{
    core::db::{
        DealFilter, DealRepository, NewSalesProcess, NewStage, ProcessOrder, SalesProcess, SalesProcessRepository,
        SalesProcessUpdate, Stage, StageRepository, StageType, StageUpdate, Workspace,
    },
    crm::Notification,
    error::{CrmError, CrmResult},
};

/// Which process the settings view is focused on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    NoneSelected,
    /// Stages of the process are listed.
    Managing(Uuid),
    /// The process form is open; its stage list is hidden.
    EditingProcess(Uuid),
}

impl Selection {
    pub fn process_id(self) -> Option<Uuid> {
        match self {
            Selection::NoneSelected => None,
            Selection::Managing(id) | Selection::EditingProcess(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessForm {
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageForm {
    pub name: String,
    pub order: String,
    pub stage_type: StageType,
}

impl Default for StageForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            order: String::new(),
            stage_type: StageType::Open,
        }
    }
}

impl From<&Stage> for StageForm {
    fn from(stage: &Stage) -> Self {
        Self {
            name: stage.name.clone(),
            order: stage.stage_order.to_string(),
            stage_type: stage.stage_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEditor {
    Closed,
    Creating(StageForm),
    Editing { id: Uuid, form: StageForm },
}

#[derive(Debug, Clone)]
pub enum ProcessWrite {
    Create(NewSalesProcess),
    Update(Uuid, SalesProcessUpdate),
}

#[derive(Debug, Clone)]
pub enum StageWrite {
    Create(NewStage),
    Update(Uuid, StageUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    Process(Uuid),
    Stage(Uuid),
}

/// What a delete would do, shown before the user confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteImpact {
    pub target: DeleteTarget,
    pub dependent_deals: u64,
}

impl DeleteImpact {
    pub fn message(&self) -> String {
        let deals = match self.dependent_deals {
            1 => "1 deal".to_string(),
            n => format!("{n} deals"),
        };
        match self.target {
            DeleteTarget::Process(_) if self.dependent_deals > 0 => format!(
                "Delete this sales process and all of its stages? {deals} will lose their process and stage."
            ),
            DeleteTarget::Process(_) => "Delete this sales process and all of its stages?".to_string(),
            DeleteTarget::Stage(_) if self.dependent_deals > 0 => {
                format!("Delete this stage? {deals} will lose their stage.")
            }
            DeleteTarget::Stage(_) => "Delete this stage? This cannot be undone.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loadable<T> {
    Loading,
    Loaded(T),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    processes: Loadable<Vec<SalesProcess>>,
    stages: Loadable<Vec<Stage>>,
    selection: Selection,
    pub process_form: ProcessForm,
    pub stage_editor: StageEditor,
    pending_delete: Option<DeleteImpact>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            processes: Loadable::Loading,
            stages: Loadable::Loading,
            selection: Selection::NoneSelected,
            process_form: ProcessForm::default(),
            stage_editor: StageEditor::Closed,
            pending_delete: None,
        }
    }
}

impl Settings {
    pub fn processes(&self) -> &Loadable<Vec<SalesProcess>> {
        &self.processes
    }

    pub fn stages(&self) -> &Loadable<Vec<Stage>> {
        &self.stages
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected_process(&self) -> Option<&SalesProcess> {
        let id = self.selection.process_id()?;
        match &self.processes {
            Loadable::Loaded(processes) => processes.iter().find(|p| p.id == id),
            _ => None,
        }
    }

    pub fn pending_delete(&self) -> Option<&DeleteImpact> {
        self.pending_delete.as_ref()
    }

    pub fn begin_load(&mut self) {
        self.processes = Loadable::Loading;
    }

    /// Returns the managed process whose stages must be (re)fetched.
    pub fn finish_load(&mut self, result: Result<Vec<SalesProcess>, String>) -> Option<Uuid> {
        match result {
            Ok(processes) => {
                if let Some(id) = self.selection.process_id() {
                    if !processes.iter().any(|p| p.id == id) {
                        self.selection = Selection::NoneSelected;
                        self.stage_editor = StageEditor::Closed;
                    }
                }
                self.processes = Loadable::Loaded(processes);
            }
            Err(message) => self.processes = Loadable::Failed(message),
        }
        match self.selection {
            Selection::Managing(id) => {
                self.stages = Loadable::Loading;
                Some(id)
            }
            _ => None,
        }
    }

    pub fn finish_stages(&mut self, process_id: Uuid, result: Result<Vec<Stage>, String>) {
        if self.selection != Selection::Managing(process_id) {
            return;
        }
        self.stages = match result {
            Ok(stages) => Loadable::Loaded(stages),
            Err(message) => Loadable::Failed(message),
        };
    }

    /// Shows the stages of a process. Returns the process to fetch.
    pub fn manage(&mut self, process_id: Uuid) -> Uuid {
        self.selection = Selection::Managing(process_id);
        self.stages = Loadable::Loading;
        self.stage_editor = StageEditor::Closed;
        self.process_form = ProcessForm::default();
        process_id
    }

    pub fn edit_process(&mut self, process_id: Uuid) {
        let Loadable::Loaded(processes) = &self.processes else {
            return;
        };
        let Some(process) = processes.iter().find(|p| p.id == process_id) else {
            return;
        };
        self.process_form = ProcessForm {
            name: process.name.clone(),
            is_default: process.is_default,
        };
        self.selection = Selection::EditingProcess(process_id);
        self.stage_editor = StageEditor::Closed;
    }

    /// Leaves the process form. An edited process goes back to having its
    /// stages managed; the returned id is the process to fetch.
    pub fn cancel_edit(&mut self) -> Option<Uuid> {
        self.process_form = ProcessForm::default();
        match self.selection {
            Selection::EditingProcess(id) => Some(self.manage(id)),
            _ => None,
        }
    }

    pub fn submit_process(&self) -> Result<ProcessWrite, Notification> {
        let name = self.process_form.name.trim();
        if name.is_empty() {
            return Err(Notification::error("Process name is required"));
        }
        Ok(match self.selection {
            Selection::EditingProcess(id) => ProcessWrite::Update(
                id,
                SalesProcessUpdate {
                    name: Some(name.to_string()),
                    is_default: Some(self.process_form.is_default),
                },
            ),
            _ => ProcessWrite::Create(NewSalesProcess {
                name: name.to_string(),
                is_default: self.process_form.is_default,
            }),
        })
    }

    /// A saved process becomes the managed one. The caller reloads.
    pub fn finish_save_process(&mut self, result: Result<SalesProcess, String>) -> (Notification, bool) {
        match result {
            Ok(process) => {
                let updated = self.selection == Selection::EditingProcess(process.id);
                self.manage(process.id);
                let text = if updated {
                    "Sales process updated"
                } else {
                    "Sales process created"
                };
                (Notification::success(text), true)
            }
            Err(message) => (Notification::failed("Saving sales process", message), false),
        }
    }

    pub fn start_new_stage(&mut self) {
        if let Selection::Managing(_) = self.selection {
            self.stage_editor = StageEditor::Creating(StageForm::default());
        }
    }

    pub fn start_edit_stage(&mut self, stage_id: Uuid) {
        let Loadable::Loaded(stages) = &self.stages else {
            return;
        };
        if let Some(stage) = stages.iter().find(|s| s.id == stage_id) {
            self.stage_editor = StageEditor::Editing {
                id: stage_id,
                form: StageForm::from(stage),
            };
        }
    }

    pub fn stage_form_mut(&mut self) -> Option<&mut StageForm> {
        match &mut self.stage_editor {
            StageEditor::Closed => None,
            StageEditor::Creating(form) | StageEditor::Editing { form, .. } => Some(form),
        }
    }

    pub fn cancel_stage(&mut self) {
        self.stage_editor = StageEditor::Closed;
    }

    pub fn submit_stage(&self) -> Result<StageWrite, Notification> {
        let Selection::Managing(process_id) = self.selection else {
            return Err(Notification::error("Choose a sales process first"));
        };
        let (id, form) = match &self.stage_editor {
            StageEditor::Closed => return Err(Notification::error("Nothing to save")),
            StageEditor::Creating(form) => (None, form),
            StageEditor::Editing { id, form } => (Some(*id), form),
        };
        let (name, order) = validate_stage(form).map_err(|e| Notification::error(e.to_string()))?;
        Ok(match id {
            Some(id) => StageWrite::Update(
                id,
                StageUpdate {
                    name: Some(name),
                    stage_order: Some(order),
                    stage_type: Some(form.stage_type),
                },
            ),
            None => StageWrite::Create(NewStage {
                process_id,
                name,
                stage_order: order,
                stage_type: form.stage_type,
            }),
        })
    }

    /// The caller refetches the stages of the managed process on success.
    pub fn finish_save_stage(&mut self, result: Result<(), String>) -> (Notification, Option<Uuid>) {
        match result {
            Ok(()) => {
                let text = match self.stage_editor {
                    StageEditor::Editing { .. } => "Stage updated",
                    _ => "Stage added",
                };
                self.stage_editor = StageEditor::Closed;
                let refetch = match self.selection {
                    Selection::Managing(id) => Some(self.manage(id)),
                    _ => None,
                };
                (Notification::success(text), refetch)
            }
            Err(message) => (Notification::failed("Saving stage", message), None),
        }
    }

    pub fn finish_assess(&mut self, result: Result<DeleteImpact, String>) -> Option<Notification> {
        match result {
            Ok(impact) => {
                self.pending_delete = Some(impact);
                None
            }
            Err(message) => Some(Notification::failed("Checking related deals", message)),
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn confirm_delete(&mut self) -> Option<DeleteTarget> {
        self.pending_delete.take().map(|impact| impact.target)
    }

    /// Deleting the focused process clears the selection. The caller reloads.
    pub fn finish_delete(&mut self, target: DeleteTarget, result: Result<(), String>) -> (Notification, bool) {
        if let Err(message) = result {
            return (Notification::failed("Deleting", message), false);
        }
        let text = match target {
            DeleteTarget::Process(id) => {
                if self.selection.process_id() == Some(id) {
                    self.selection = Selection::NoneSelected;
                    self.stage_editor = StageEditor::Closed;
                    self.process_form = ProcessForm::default();
                }
                "Sales process deleted"
            }
            DeleteTarget::Stage(id) => {
                if matches!(self.stage_editor, StageEditor::Editing { id: editing, .. } if editing == id) {
                    self.stage_editor = StageEditor::Closed;
                }
                "Stage deleted"
            }
        };
        (Notification::success(text), true)
    }
}

fn validate_stage(form: &StageForm) -> CrmResult<(String, i32)> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(CrmError::validation("Stage name is required"));
    }
    let order = form
        .order
        .trim()
        .parse::<i32>()
        .map_err(|_| CrmError::validation("Stage order must be a whole number"))?;
    Ok((name.to_string(), order))
}

pub async fn fetch_processes<W: Workspace>(ws: &W) -> CrmResult<Vec<SalesProcess>> {
    ws.get_sales_processes(ProcessOrder::Created).await
}

pub async fn fetch_stages<W: Workspace>(ws: &W, process_id: Uuid) -> CrmResult<Vec<Stage>> {
    ws.get_stages(process_id, None).await
}

/// Counts the deals a delete would detach.
pub async fn assess_delete<W: Workspace>(ws: &W, target: DeleteTarget) -> CrmResult<DeleteImpact> {
    let filter = match target {
        DeleteTarget::Process(id) => DealFilter::Process(id),
        DeleteTarget::Stage(id) => DealFilter::Stage(id),
    };
    let dependent_deals = ws.count_deals(filter).await?;
    Ok(DeleteImpact { target, dependent_deals })
}

pub async fn apply_delete<W: Workspace>(ws: &W, target: DeleteTarget) -> CrmResult<()> {
    match target {
        DeleteTarget::Process(id) => ws.delete_sales_process(id).await,
        DeleteTarget::Stage(id) => ws.delete_stage(id).await,
    }
}

pub async fn save_process<W: Workspace>(ws: &W, write: &ProcessWrite) -> CrmResult<SalesProcess> {
    match write {
        ProcessWrite::Create(new) => ws.add_sales_process(new).await,
        ProcessWrite::Update(id, update) => ws.update_sales_process(*id, update).await,
    }
}

pub async fn save_stage<W: Workspace>(ws: &W, write: &StageWrite) -> CrmResult<Stage> {
    match write {
        StageWrite::Create(new) => ws.add_stage(new).await,
        StageWrite::Update(id, update) => ws.update_stage(*id, update).await,
    }
}
