use std::fmt;

use iced::{
    Element, Length, Task,
    widget::{button, column, container, mouse_area, pick_list, row, scrollable, text, text_input},
};
use iced_widget::container::bordered_box;
use uuid::Uuid;

use crate::{
    core::db::{DataSource, DealRepository, Stage},
    crm::{
        board::{self, Board, BoardSnapshot, BoardState, StageOptions},
        pipeline::DealForm,
    },
    gui::{
        AppState,
        screens::{Screen, ScreenMessage, local},
        widgets::{Choice, failure, loading},
    },
};

#[derive(Debug, Clone, Default)]
pub struct BoardScreen {
    board: Board,
}

#[derive(Debug, Clone)]
pub enum DealField {
    Title(String),
    Value(String),
    Stage(Option<Uuid>),
    Contact(Option<Uuid>),
    Company(Option<Uuid>),
}

#[derive(Debug, Clone)]
pub enum BoardMessage {
    Loaded(Result<BoardSnapshot, String>),
    SelectProcess(Uuid),
    PickUp(Uuid),
    DropOn(Uuid),
    CancelDrag,
    Moved(Result<(), String>),
    Form(DealField),
    FormProcess(Uuid),
    FormStages(Uuid, Result<Vec<Stage>, String>),
    Create,
    Created(Result<(), String>),
    Edit(Uuid),
    EditField(DealField),
    SaveEdit,
    CancelEdit,
    Edited(Result<(), String>),
    Delete(Uuid),
    Deleted(Uuid, Result<(), String>),
}

#[derive(Debug, Clone)]
pub enum BoardParentMessage {
    OpenSettings,
}

fn stage_choices<'a>(
    stages: impl IntoIterator<Item = &'a Stage>,
    selected: Option<Uuid>,
) -> (Vec<Choice>, Option<Choice>) {
    let choices: Vec<Choice> = stages.into_iter().map(|s| Choice::of(s.id, &s.name)).collect();
    let current = choices.iter().find(|c| c.id.is_some() && c.id == selected).cloned();
    (choices, current)
}

fn deal_fields<'a>(
    snapshot: &'a BoardSnapshot,
    title: &'a str,
    value: &'a str,
    contact_id: Option<Uuid>,
    company_id: Option<Uuid>,
) -> Element<'a, DealField> {
    let (contacts, contact) = Choice::list(
        "No contact",
        snapshot.contacts.iter().map(|c| Choice::of(c.id, c)),
        contact_id,
    );
    let (companies, company) = Choice::list(
        "No company",
        snapshot.companies.iter().map(|c| Choice::of(c.id, c)),
        company_id,
    );
    row![
        text_input("Title", title).on_input(DealField::Title),
        text_input("Value", value).on_input(DealField::Value),
        pick_list(contacts, contact, |c: Choice| DealField::Contact(c.id)),
        pick_list(companies, company, |c: Choice| DealField::Company(c.id)),
    ]
    .spacing(8)
    .into()
}

fn apply_field(form: &mut DealForm, field: DealField) {
    match field {
        DealField::Title(v) => form.title = v,
        DealField::Value(v) => form.value = v,
        DealField::Stage(id) => form.stage_id = id,
        DealField::Contact(id) => form.contact_id = id,
        DealField::Company(id) => form.company_id = id,
    }
}

fn settings_prompt<'a>(message: &'a str) -> Element<'a, ScreenMessage<BoardScreen>> {
    column![
        text(message),
        button("Go to Pipeline Settings").on_press(ScreenMessage::ParentMessage(BoardParentMessage::OpenSettings)),
    ]
    .spacing(10)
    .into()
}

impl BoardScreen {
    pub fn enter<D: DataSource>(&mut self, state: &AppState<D>) -> Task<ScreenMessage<Self>> {
        self.board.begin_load();
        let selected = self.board.selected_process();
        local(state.perform(
            move |ws| async move { board::fetch_board(&ws, selected).await },
            BoardMessage::Loaded,
        ))
    }

    fn fetch_form_stages<D: DataSource>(state: &AppState<D>, process_id: Uuid) -> Task<ScreenMessage<Self>> {
        local(state.perform(
            move |ws| async move { board::fetch_open_stages(&ws, process_id).await },
            move |result| BoardMessage::FormStages(process_id, result),
        ))
    }

    fn reload_if<D: DataSource>(&mut self, reload: bool, state: &AppState<D>) -> Task<ScreenMessage<Self>> {
        if reload { self.enter(state) } else { Task::none() }
    }

    fn new_deal_view<'a>(&'a self, snapshot: &'a BoardSnapshot) -> Element<'a, BoardMessage> {
        let form = &self.board.form;
        let (processes, process) = process_choices(snapshot, form.process_id);
        let stage_picker: Element<'a, BoardMessage> = match self.board.form_stages() {
            StageOptions::Loading => text("Loading stages...").into(),
            StageOptions::Failed(message) => failure(message),
            StageOptions::Ready(_) => {
                let options = self.board.form_stage_options();
                if options.is_empty() {
                    text("This process has no open stages.").into()
                } else {
                    let (stages, stage) = stage_choices(options, form.stage_id);
                    pick_list(stages, stage, |c: Choice| BoardMessage::Form(DealField::Stage(c.id))).into()
                }
            }
        };
        container(
            column![
                text("New deal").size(18),
                deal_fields(snapshot, &form.title, &form.value, form.contact_id, form.company_id)
                    .map(BoardMessage::Form),
                row![
                    pick_list(processes, process, |c: ProcessChoice| BoardMessage::FormProcess(c.id)),
                    stage_picker,
                    button("Add deal").on_press(BoardMessage::Create),
                ]
                .spacing(8),
            ]
            .spacing(8),
        )
        .style(bordered_box)
        .padding(10)
        .into()
    }

    fn editor_view<'a>(&'a self, snapshot: &'a BoardSnapshot) -> Option<Element<'a, BoardMessage>> {
        let editor = self.board.editor.as_ref()?;
        let (stages, stage) = stage_choices(self.board.editor_stage_options(), editor.stage_id);
        Some(
            container(
                column![
                    text("Edit deal").size(18),
                    deal_fields(snapshot, &editor.title, &editor.value, editor.contact_id, editor.company_id)
                        .map(BoardMessage::EditField),
                    row![
                        pick_list(stages, stage, |c: Choice| BoardMessage::EditField(DealField::Stage(c.id))),
                        button("Save").on_press(BoardMessage::SaveEdit),
                        button("Cancel").style(button::secondary).on_press(BoardMessage::CancelEdit),
                        button("Delete")
                            .style(button::danger)
                            .on_press(BoardMessage::Delete(editor.deal_id)),
                    ]
                    .spacing(8),
                ]
                .spacing(8),
            )
            .style(bordered_box)
            .padding(10)
            .into(),
        )
    }

    fn columns_view<'a>(&'a self, snapshot: &'a BoardSnapshot) -> Element<'a, BoardMessage> {
        let dragging = self.board.dragging();
        let mut lanes = row![].spacing(10);
        for lane in snapshot.columns() {
            let heading = text(format!("{} ({})", lane.stage.name, lane.stage.stage_type)).size(18);
            let mut cards = column![heading].spacing(8);
            for card in lane.cards {
                let id = card.deal.id;
                let [value, contact, company] = board::card_details(card);
                let body = container(
                    column![
                        text(card.deal.title.clone()).size(16),
                        text(value),
                        text(contact),
                        text(company),
                        button("Edit").style(button::text).on_press(BoardMessage::Edit(id)),
                    ]
                    .spacing(2),
                )
                .style(bordered_box)
                .padding(8)
                .width(Length::Fill);
                let body: Element<'a, BoardMessage> = if dragging == Some(id) {
                    container(body).padding(4).style(container::dark).into()
                } else {
                    body.into()
                };
                cards = cards.push(mouse_area(body).on_press(BoardMessage::PickUp(id)));
            }
            lanes = lanes.push(
                mouse_area(
                    container(cards)
                        .style(bordered_box)
                        .padding(8)
                        .width(Length::Fixed(240.0))
                        .height(Length::Fill),
                )
                .on_release(BoardMessage::DropOn(lane.stage.id)),
            );
        }
        mouse_area(scrollable(lanes).direction(scrollable::Direction::Horizontal(
            scrollable::Scrollbar::default(),
        )))
        .on_release(BoardMessage::CancelDrag)
        .into()
    }
}

/// Picker entry naming an existing sales process.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProcessChoice {
    id: Uuid,
    name: String,
}

impl fmt::Display for ProcessChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn process_choices(snapshot: &BoardSnapshot, selected: Option<Uuid>) -> (Vec<ProcessChoice>, Option<ProcessChoice>) {
    let choices: Vec<ProcessChoice> = snapshot
        .processes
        .iter()
        .map(|p| ProcessChoice {
            id: p.id,
            name: p.name.clone(),
        })
        .collect();
    let current = choices.iter().find(|c| Some(c.id) == selected).cloned();
    (choices, current)
}

impl Screen for BoardScreen {
    type Message = BoardMessage;
    type ParentMessage = BoardParentMessage;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let snapshot = match self.board.state() {
            BoardState::Loading => return loading(),
            BoardState::Failed(message) => return failure(message),
            BoardState::NoProcesses => {
                return settings_prompt("No sales process exists yet. Configure one in Pipeline Settings first.");
            }
            BoardState::Ready(snapshot) => snapshot,
        };
        let (processes, active) = process_choices(snapshot, snapshot.active);
        let header: Element<'_, BoardMessage> = row![
            text("Deals").size(28).width(Length::Fill),
            pick_list(processes, active, |c: ProcessChoice| BoardMessage::SelectProcess(c.id)),
        ]
        .spacing(10)
        .into();

        let mut content = column![header.map(ScreenMessage::ScreenMessage)].spacing(12);
        if snapshot.stages.is_empty() {
            return content
                .push(settings_prompt(
                    "This sales process has no stages. Add stages in Pipeline Settings.",
                ))
                .into();
        }
        content = content.push(self.new_deal_view(snapshot).map(ScreenMessage::ScreenMessage));
        if let Some(editor) = self.editor_view(snapshot) {
            content = content.push(editor.map(ScreenMessage::ScreenMessage));
        }
        content
            .push(self.columns_view(snapshot).map(ScreenMessage::ScreenMessage))
            .into()
    }

    fn update<D: DataSource>(&mut self, message: Self::Message, state: &mut AppState<D>) -> Task<ScreenMessage<Self>> {
        match message {
            BoardMessage::Loaded(result) => match self.board.finish_load(result) {
                Some(process_id) => Self::fetch_form_stages(state, process_id),
                None => Task::none(),
            },
            BoardMessage::SelectProcess(process_id) => {
                self.board.select_process(process_id);
                self.enter(state)
            }
            BoardMessage::PickUp(deal_id) => {
                self.board.pick_up(deal_id);
                Task::none()
            }
            BoardMessage::DropOn(stage_id) => match self.board.drop_on(stage_id) {
                Some(mv) => local(state.perform(
                    move |ws| async move { board::commit_move(&ws, mv).await },
                    BoardMessage::Moved,
                )),
                None => Task::none(),
            },
            BoardMessage::CancelDrag => {
                self.board.cancel_drag();
                Task::none()
            }
            BoardMessage::Moved(result) => {
                let (notice, reload) = self.board.finish_move(result);
                state.notify(notice);
                self.reload_if(reload, state)
            }
            BoardMessage::Form(field) => {
                apply_field(&mut self.board.form, field);
                Task::none()
            }
            BoardMessage::FormProcess(process_id) => match self.board.set_form_process(process_id) {
                Some(process_id) => Self::fetch_form_stages(state, process_id),
                None => Task::none(),
            },
            BoardMessage::FormStages(process_id, result) => {
                self.board.finish_form_stages(process_id, result);
                Task::none()
            }
            BoardMessage::Create => match self.board.submit_new_deal() {
                Ok(new) => local(state.perform(
                    move |ws| async move { ws.add_deal(&new).await.map(drop) },
                    BoardMessage::Created,
                )),
                Err(notice) => {
                    state.notify(notice);
                    Task::none()
                }
            },
            BoardMessage::Created(result) => {
                let (notice, reload) = self.board.finish_create(result);
                state.notify(notice);
                self.reload_if(reload, state)
            }
            BoardMessage::Edit(deal_id) => {
                self.board.start_edit(deal_id);
                Task::none()
            }
            BoardMessage::EditField(field) => {
                if let Some(editor) = self.board.editor.as_mut() {
                    match field {
                        DealField::Title(v) => editor.title = v,
                        DealField::Value(v) => editor.value = v,
                        DealField::Stage(id) => editor.stage_id = id,
                        DealField::Contact(id) => editor.contact_id = id,
                        DealField::Company(id) => editor.company_id = id,
                    }
                }
                Task::none()
            }
            BoardMessage::SaveEdit => match self.board.submit_edit() {
                Ok((deal_id, update)) => local(state.perform(
                    move |ws| async move { ws.update_deal(deal_id, &update).await.map(drop) },
                    BoardMessage::Edited,
                )),
                Err(notice) => {
                    state.notify(notice);
                    Task::none()
                }
            },
            BoardMessage::CancelEdit => {
                self.board.cancel_edit();
                Task::none()
            }
            BoardMessage::Edited(result) => {
                let (notice, reload) = self.board.finish_edit(result);
                state.notify(notice);
                self.reload_if(reload, state)
            }
            BoardMessage::Delete(deal_id) => local(state.perform(
                move |ws| async move { ws.delete_deal(deal_id).await },
                move |result| BoardMessage::Deleted(deal_id, result),
            )),
            BoardMessage::Deleted(deal_id, result) => {
                let (notice, reload) = self.board.finish_delete(deal_id, result);
                state.notify(notice);
                self.reload_if(reload, state)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::core::db::SalesProcess;

    fn process(name: &str) -> SalesProcess {
        SalesProcess {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.into(),
            is_default: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn process_choices_name_every_process_and_mark_the_active_one() {
        let (default, enterprise) = (process("Default Pipeline"), process("Enterprise"));
        let snapshot = BoardSnapshot {
            active: Some(enterprise.id),
            processes: vec![default.clone(), enterprise.clone()],
            stages: Vec::new(),
            deals: Vec::new(),
            contacts: Vec::new(),
            companies: Vec::new(),
        };

        let (choices, current) = process_choices(&snapshot, snapshot.active);
        let ids: Vec<Uuid> = choices.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![default.id, enterprise.id]);
        assert_eq!(current.map(|c| c.to_string()), Some("Enterprise".to_string()));

        let (_, current) = process_choices(&snapshot, None);
        assert!(current.is_none());
    }
}
