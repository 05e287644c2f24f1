use std::convert::Infallible;

use iced::{
    Element, Length, Task,
    widget::{button, column, container, pick_list, row, scrollable, text, text_input},
};
use iced_widget::container::bordered_box;
use uuid::Uuid;

use crate::{
    core::db::{DataSource, SalesProcess, Stage, StageType},
    crm::settings::{self, DeleteImpact, DeleteTarget, Loadable, Selection, Settings, StageEditor},
    gui::{
        AppState,
        screens::{Screen, ScreenMessage, local},
        widgets::{failure, loading},
    },
};

#[derive(Debug, Clone, Default)]
pub struct SettingsScreen {
    settings: Settings,
}

#[derive(Debug, Clone)]
pub enum SettingsMessage {
    Loaded(Result<Vec<SalesProcess>, String>),
    StagesLoaded(Uuid, Result<Vec<Stage>, String>),
    Manage(Uuid),
    EditProcess(Uuid),
    CancelEdit,
    ProcessName(String),
    ToggleDefault,
    SaveProcess,
    ProcessSaved(Result<SalesProcess, String>),
    NewStage,
    EditStage(Uuid),
    StageName(String),
    StageOrder(String),
    StageType(StageType),
    SaveStage,
    CancelStage,
    StageSaved(Result<(), String>),
    RequestDelete(DeleteTarget),
    Assessed(Result<DeleteImpact, String>),
    ConfirmDelete,
    CancelDelete,
    Deleted(DeleteTarget, Result<(), String>),
}

impl SettingsScreen {
    pub fn enter<D: DataSource>(&mut self, state: &AppState<D>) -> Task<ScreenMessage<Self>> {
        self.settings.begin_load();
        local(state.perform(
            |ws| async move { settings::fetch_processes(&ws).await },
            SettingsMessage::Loaded,
        ))
    }

    fn fetch_stages<D: DataSource>(state: &AppState<D>, process_id: Option<Uuid>) -> Task<ScreenMessage<Self>> {
        let Some(process_id) = process_id else {
            return Task::none();
        };
        local(state.perform(
            move |ws| async move { settings::fetch_stages(&ws, process_id).await },
            move |result| SettingsMessage::StagesLoaded(process_id, result),
        ))
    }

    fn process_form_view(&self) -> Element<'_, SettingsMessage> {
        let form = &self.settings.process_form;
        let editing = matches!(self.settings.selection(), Selection::EditingProcess(_));
        let default_label = if form.is_default {
            "Default process: yes"
        } else {
            "Default process: no"
        };
        let mut actions = row![
            button(default_label).style(button::secondary).on_press(SettingsMessage::ToggleDefault),
            button(if editing { "Save process" } else { "Create process" }).on_press(SettingsMessage::SaveProcess),
        ]
        .spacing(8);
        if editing {
            actions = actions.push(button("Cancel").style(button::secondary).on_press(SettingsMessage::CancelEdit));
        }
        container(
            column![
                text(if editing { "Edit sales process" } else { "New sales process" }).size(18),
                text_input("Process name", &form.name).on_input(SettingsMessage::ProcessName),
                actions,
            ]
            .spacing(8),
        )
        .style(bordered_box)
        .padding(10)
        .into()
    }

    fn processes_view(&self) -> Element<'_, SettingsMessage> {
        let processes = match self.settings.processes() {
            Loadable::Loading => return loading(),
            Loadable::Failed(message) => return failure(message),
            Loadable::Loaded(processes) => processes,
        };
        if processes.is_empty() {
            return text("No sales processes yet.").into();
        }
        let active = self.settings.selection().process_id();
        let mut list = column![].spacing(6);
        for process in processes {
            let mut name = process.name.clone();
            if process.is_default {
                name.push_str(" (default)");
            }
            let label = text(name).width(Length::Fill);
            let label = if active == Some(process.id) { label.style(text::primary) } else { label };
            list = list.push(
                row![
                    label,
                    button("Manage stages").on_press(SettingsMessage::Manage(process.id)),
                    button("Edit").on_press(SettingsMessage::EditProcess(process.id)),
                    button("Delete")
                        .style(button::danger)
                        .on_press(SettingsMessage::RequestDelete(DeleteTarget::Process(process.id))),
                ]
                .spacing(8),
            );
        }
        list.into()
    }

    fn stages_view(&self) -> Element<'_, SettingsMessage> {
        let process_name = self
            .settings
            .selected_process()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let stages = match self.settings.stages() {
            Loadable::Loading => return loading(),
            Loadable::Failed(message) => return failure(message),
            Loadable::Loaded(stages) => stages,
        };
        let mut content = column![
            row![
                text(format!("Stages of {process_name}")).size(18).width(Length::Fill),
                button("Add stage").on_press(SettingsMessage::NewStage),
            ]
            .spacing(8),
        ]
        .spacing(6);
        if stages.is_empty() {
            content = content.push(text("No stages yet."));
        }
        for stage in stages {
            content = content.push(
                row![
                    text(stage.stage_order.to_string()).width(Length::Fixed(40.0)),
                    text(stage.name.clone()).width(Length::Fill),
                    text(stage.stage_type.to_string()).width(Length::Fixed(60.0)),
                    button("Edit").on_press(SettingsMessage::EditStage(stage.id)),
                    button("Delete")
                        .style(button::danger)
                        .on_press(SettingsMessage::RequestDelete(DeleteTarget::Stage(stage.id))),
                ]
                .spacing(8),
            );
        }
        let form = match &self.settings.stage_editor {
            StageEditor::Closed => return content.into(),
            StageEditor::Creating(form) | StageEditor::Editing { form, .. } => form,
        };
        content
            .push(
                container(
                    column![
                        text_input("Stage name", &form.name).on_input(SettingsMessage::StageName),
                        text_input("Order", &form.order).on_input(SettingsMessage::StageOrder),
                        pick_list(StageType::ALL, Some(form.stage_type), SettingsMessage::StageType),
                        row![
                            button("Save stage").on_press(SettingsMessage::SaveStage),
                            button("Cancel").style(button::secondary).on_press(SettingsMessage::CancelStage),
                        ]
                        .spacing(8),
                    ]
                    .spacing(8),
                )
                .style(bordered_box)
                .padding(10),
            )
            .into()
    }
}

impl Screen for SettingsScreen {
    type Message = SettingsMessage;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let mut content = column![text("Pipeline Settings").size(28)].spacing(16);
        if let Some(impact) = self.settings.pending_delete() {
            content = content.push(
                container(
                    row![
                        text(impact.message()).width(Length::Fill),
                        button("Delete").style(button::danger).on_press(SettingsMessage::ConfirmDelete),
                        button("Keep").style(button::secondary).on_press(SettingsMessage::CancelDelete),
                    ]
                    .spacing(8),
                )
                .style(bordered_box)
                .padding(10),
            );
        }
        content = content.push(self.process_form_view()).push(self.processes_view());
        content = match self.settings.selection() {
            Selection::NoneSelected => content,
            Selection::Managing(_) => content.push(self.stages_view()),
            Selection::EditingProcess(_) => {
                content.push(text("Finish editing the process to manage its stages."))
            }
        };
        let content: Element<'_, SettingsMessage> = scrollable(content).into();
        content.map(ScreenMessage::ScreenMessage)
    }

    fn update<D: DataSource>(&mut self, message: Self::Message, state: &mut AppState<D>) -> Task<ScreenMessage<Self>> {
        let controller = &mut self.settings;
        match message {
            SettingsMessage::Loaded(result) => {
                let refetch = controller.finish_load(result);
                Self::fetch_stages(state, refetch)
            }
            SettingsMessage::StagesLoaded(process_id, result) => {
                controller.finish_stages(process_id, result);
                Task::none()
            }
            SettingsMessage::Manage(process_id) => {
                let process_id = controller.manage(process_id);
                Self::fetch_stages(state, Some(process_id))
            }
            SettingsMessage::EditProcess(process_id) => {
                controller.edit_process(process_id);
                Task::none()
            }
            SettingsMessage::CancelEdit => {
                let refetch = controller.cancel_edit();
                Self::fetch_stages(state, refetch)
            }
            SettingsMessage::ProcessName(name) => {
                controller.process_form.name = name;
                Task::none()
            }
            SettingsMessage::ToggleDefault => {
                controller.process_form.is_default = !controller.process_form.is_default;
                Task::none()
            }
            SettingsMessage::SaveProcess => match controller.submit_process() {
                Ok(write) => local(state.perform(
                    move |ws| async move { settings::save_process(&ws, &write).await },
                    SettingsMessage::ProcessSaved,
                )),
                Err(notice) => {
                    state.notify(notice);
                    Task::none()
                }
            },
            SettingsMessage::ProcessSaved(result) => {
                let (notice, reload) = controller.finish_save_process(result);
                state.notify(notice);
                if reload { self.enter(state) } else { Task::none() }
            }
            SettingsMessage::NewStage => {
                controller.start_new_stage();
                Task::none()
            }
            SettingsMessage::EditStage(stage_id) => {
                controller.start_edit_stage(stage_id);
                Task::none()
            }
            SettingsMessage::StageName(name) => {
                if let Some(form) = controller.stage_form_mut() {
                    form.name = name;
                }
                Task::none()
            }
            SettingsMessage::StageOrder(order) => {
                if let Some(form) = controller.stage_form_mut() {
                    form.order = order;
                }
                Task::none()
            }
            SettingsMessage::StageType(stage_type) => {
                if let Some(form) = controller.stage_form_mut() {
                    form.stage_type = stage_type;
                }
                Task::none()
            }
            SettingsMessage::SaveStage => match controller.submit_stage() {
                Ok(write) => local(state.perform(
                    move |ws| async move { settings::save_stage(&ws, &write).await.map(drop) },
                    SettingsMessage::StageSaved,
                )),
                Err(notice) => {
                    state.notify(notice);
                    Task::none()
                }
            },
            SettingsMessage::CancelStage => {
                controller.cancel_stage();
                Task::none()
            }
            SettingsMessage::StageSaved(result) => {
                let (notice, refetch) = controller.finish_save_stage(result);
                state.notify(notice);
                Self::fetch_stages(state, refetch)
            }
            SettingsMessage::RequestDelete(target) => local(state.perform(
                move |ws| async move { settings::assess_delete(&ws, target).await },
                SettingsMessage::Assessed,
            )),
            SettingsMessage::Assessed(result) => {
                if let Some(notice) = controller.finish_assess(result) {
                    state.notify(notice);
                }
                Task::none()
            }
            SettingsMessage::ConfirmDelete => match controller.confirm_delete() {
                Some(target) => local(state.perform(
                    move |ws| async move { settings::apply_delete(&ws, target).await },
                    move |result| SettingsMessage::Deleted(target, result),
                )),
                None => Task::none(),
            },
            SettingsMessage::CancelDelete => {
                controller.cancel_delete();
                Task::none()
            }
            SettingsMessage::Deleted(target, result) => {
                let (notice, reload) = controller.finish_delete(target, result);
                state.notify(notice);
                if reload { self.enter(state) } else { Task::none() }
            }
        }
    }
}
