use std::convert::Infallible;

use iced::{
    Element, Task,
    widget::{column, container},
};

use crate::{
    core::db::DataSource,
    crm::{
        Notification,
        records::{Companies, Contacts, Tasks},
        shell::{self, NavItem, Shell},
    },
    gui::{
        AppState,
        screens::{
            Screen, ScreenMessage,
            board::{BoardParentMessage, BoardScreen},
            records::RecordsScreen,
            settings::SettingsScreen,
        },
        widgets::{layout, nav},
    },
};

/// The signed-in application: navigation plus one view per entry. Views
/// keep their state between visits and re-fetch on every entry.
#[derive(Debug, Clone, Default)]
pub struct MainScreen {
    shell: Shell,
    contacts: RecordsScreen<Contacts>,
    companies: RecordsScreen<Companies>,
    board: BoardScreen,
    tasks: RecordsScreen<Tasks>,
    settings: SettingsScreen,
}

#[derive(Debug, Clone)]
pub enum MainMessage {
    Navigate(NavItem),
    Logout,
    LoggedOut(Option<Notification>),
    Dismiss(u64),
    Contacts(ScreenMessage<RecordsScreen<Contacts>>),
    Companies(ScreenMessage<RecordsScreen<Companies>>),
    Board(ScreenMessage<BoardScreen>),
    Tasks(ScreenMessage<RecordsScreen<Tasks>>),
    Settings(ScreenMessage<SettingsScreen>),
}

impl MainScreen {
    /// Activates `item` and loads its view.
    pub fn navigate<D: DataSource>(&mut self, item: NavItem, state: &AppState<D>) -> Task<ScreenMessage<Self>> {
        self.shell.select(item);
        match item {
            NavItem::Contacts => self.contacts.enter(state).map(MainMessage::Contacts),
            NavItem::Companies => self.companies.enter(state).map(MainMessage::Companies),
            NavItem::Deals => self.board.enter(state).map(MainMessage::Board),
            NavItem::Tasks => self.tasks.enter(state).map(MainMessage::Tasks),
            NavItem::PipelineSettings => self.settings.enter(state).map(MainMessage::Settings),
        }
        .map(ScreenMessage::ScreenMessage)
    }
}

/// Routes a child screen's own messages back to it. Children without parent
/// messages use `Infallible`.
fn child<S: Screen<ParentMessage = Infallible>, D: DataSource>(
    screen: &mut S,
    message: ScreenMessage<S>,
    state: &mut AppState<D>,
) -> Task<ScreenMessage<S>> {
    match message {
        ScreenMessage::ScreenMessage(msg) => screen.update(msg, state),
        ScreenMessage::ParentMessage(never) => match never {},
    }
}

impl Screen for MainScreen {
    type Message = MainMessage;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let active = self.shell.active();
        let page: Element<'_, MainMessage> = match active {
            NavItem::Contacts => self.contacts.view().map(MainMessage::Contacts),
            NavItem::Companies => self.companies.view().map(MainMessage::Companies),
            NavItem::Deals => self.board.view().map(MainMessage::Board),
            NavItem::Tasks => self.tasks.view().map(MainMessage::Tasks),
            NavItem::PipelineSettings => self.settings.view().map(MainMessage::Settings),
        };
        let sidebar = nav(active, MainMessage::Navigate, MainMessage::Logout);
        layout(sidebar, container(column![page]).width(iced::Length::Fill)).map(ScreenMessage::ScreenMessage)
    }

    fn update<D: DataSource>(&mut self, message: Self::Message, state: &mut AppState<D>) -> Task<ScreenMessage<Self>> {
        let task = match message {
            MainMessage::Navigate(item) => return self.navigate(item, state),
            MainMessage::Logout => {
                let source = state.source.clone();
                Task::perform(async move { shell::logout(&source).await }, MainMessage::LoggedOut)
            }
            MainMessage::LoggedOut(notice) => {
                if let Some(notice) = notice {
                    state.notify(notice);
                }
                Task::none()
            }
            MainMessage::Dismiss(id) => {
                state.notifications.dismiss(id);
                Task::none()
            }
            MainMessage::Contacts(msg) => child(&mut self.contacts, msg, state).map(MainMessage::Contacts),
            MainMessage::Companies(msg) => child(&mut self.companies, msg, state).map(MainMessage::Companies),
            MainMessage::Tasks(msg) => child(&mut self.tasks, msg, state).map(MainMessage::Tasks),
            MainMessage::Settings(msg) => child(&mut self.settings, msg, state).map(MainMessage::Settings),
            MainMessage::Board(msg) => match msg {
                ScreenMessage::ScreenMessage(msg) => self.board.update(msg, state).map(MainMessage::Board),
                ScreenMessage::ParentMessage(BoardParentMessage::OpenSettings) => {
                    return self.navigate(NavItem::PipelineSettings, state);
                }
            },
        };
        task.map(ScreenMessage::ScreenMessage)
    }
}
