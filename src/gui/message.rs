use crate::{
    core::auth::Session,
    crm::gate::AuthReply,
    gui::screens::{ScreenMessage, login_page::LoginMessage, main_page::MainScreen},
};

#[derive(Debug, Clone)]
pub enum Message {
    Bootstrapped(Result<Option<Session>, String>),
    SessionChanged(Option<Session>),
    SessionFeedClosed,
    Login(LoginMessage),
    AuthReplied(AuthReply),
    Main(ScreenMessage<MainScreen>),
}
