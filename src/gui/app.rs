use iced::{Element, Task, widget::column};
use tokio::sync::watch;

use super::{AppState, Message};
use crate::{
    core::{auth::Session, db::DataSource},
    crm::{
        gate::{self, Gate, GateState},
        shell::NavItem,
    },
    error::CrmError,
    gui::{
        screens::{
            Screen, ScreenMessage,
            login_page::{self, LoginMessage},
            main_page::{MainMessage, MainScreen},
        },
        widgets,
    },
};

pub struct CrmApp<D: DataSource> {
    state: AppState<D>,
    gate: Gate,
    main: MainScreen,
    sessions: watch::Receiver<Option<Session>>,
}

impl<D: DataSource> CrmApp<D> {
    pub fn new(source: D) -> (Self, Task<Message>) {
        let sessions = source.subscribe();
        let app = Self {
            state: AppState::new(source.clone()),
            gate: Gate::default(),
            main: MainScreen::default(),
            sessions,
        };
        let bootstrap = Task::perform(
            async move { source.get_session().await.map_err(|e| e.to_string()) },
            Message::Bootstrapped,
        );
        let watch = app.watch_sessions();
        (app, Task::batch([bootstrap, watch]))
    }

    /// Waits for the next session event published by the auth provider.
    fn watch_sessions(&self) -> Task<Message> {
        let mut sessions = self.sessions.clone();
        Task::perform(
            async move {
                sessions.changed().await.ok()?;
                let session = sessions.borrow_and_update().clone();
                Some(session)
            },
            |event| match event {
                Some(session) => Message::SessionChanged(session),
                None => Message::SessionFeedClosed,
            },
        )
    }

    /// Rebinds the workspace to the gate's session. Entering the application
    /// starts over on the contacts view.
    fn after_gate(&mut self, entered: bool) -> Task<Message> {
        self.state.workspace = self.gate.session().map(|s| self.state.source.workspace(s));
        if !entered {
            return Task::none();
        }
        self.main = MainScreen::default();
        self.state.notifications.clear();
        self.main.navigate(NavItem::Contacts, &self.state).map(Message::Main)
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Bootstrapped(result) => {
                let entered = self.gate.bootstrap(result.map_err(CrmError::Auth));
                self.after_gate(entered)
            }
            Message::SessionChanged(session) => {
                self.sessions.mark_unchanged();
                let entered = self.gate.on_session(session);
                Task::batch([self.after_gate(entered), self.watch_sessions()])
            }
            Message::SessionFeedClosed => {
                tracing::warn!("session feed closed");
                Task::none()
            }
            Message::Login(msg) => match msg {
                LoginMessage::Email(email) => {
                    if let Some(form) = self.gate.form_mut() {
                        form.email = email;
                    }
                    Task::none()
                }
                LoginMessage::Password(password) => {
                    if let Some(form) = self.gate.form_mut() {
                        form.password = password;
                    }
                    Task::none()
                }
                LoginMessage::Submit(action) => match self.gate.submit(action) {
                    Some(credentials) => {
                        let source = self.state.source.clone();
                        Task::perform(
                            async move { gate::authenticate(&source, action, credentials).await },
                            Message::AuthReplied,
                        )
                    }
                    None => Task::none(),
                },
            },
            Message::AuthReplied(reply) => {
                self.gate.on_reply(reply);
                Task::none()
            }
            Message::Main(msg) => match msg {
                ScreenMessage::ScreenMessage(msg) => self.main.update(msg, &mut self.state).map(Message::Main),
                ScreenMessage::ParentMessage(never) => match never {},
            },
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        match self.gate.state() {
            GateState::Starting => widgets::loading(),
            GateState::SignedOut(form) => login_page::view(form).map(Message::Login),
            GateState::SignedIn(_) => column![
                widgets::notifications(&self.state.notifications, |id| {
                    Message::Main(ScreenMessage::ScreenMessage(MainMessage::Dismiss(id)))
                }),
                self.main.view().map(Message::Main),
            ]
            .into(),
        }
    }
}

pub fn run<D: DataSource>(source: D) -> iced::Result {
    iced::application(move || CrmApp::new(source.clone()), CrmApp::<D>::update, CrmApp::<D>::view)
        .title("crmdesk")
        .window_size((1280.0, 800.0))
        .run()
}

/// Static error window for startup failures.
struct FatalApp {
    message: String,
}

impl FatalApp {
    fn update(&mut self, _message: ()) -> Task<()> {
        Task::none()
    }

    fn view(&self) -> Element<'_, ()> {
        widgets::fatal(&self.message)
    }
}

pub fn run_fatal(message: String) -> iced::Result {
    iced::application(
        move || FatalApp {
            message: message.clone(),
        },
        FatalApp::update,
        FatalApp::view,
    )
    .title("crmdesk")
    .run()
}
