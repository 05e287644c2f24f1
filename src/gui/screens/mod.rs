pub mod board;
pub mod login_page;
pub mod main_page;
pub mod records;
pub mod settings;

use iced::{Element, Task};

use crate::{core::db::DataSource, gui::AppState};

#[derive(Debug, Clone)]
pub enum ScreenMessage<S: Screen> {
    ScreenMessage(S::Message),
    ParentMessage(S::ParentMessage),
}

pub trait Screen: Sized {
    type Message: std::fmt::Debug + Clone + Send + 'static;
    type ParentMessage: std::fmt::Debug + Clone + Send + 'static;
    fn view(&self) -> Element<'_, ScreenMessage<Self>>;
    fn update<D: DataSource>(
        &mut self,
        message: Self::Message,
        state: &mut AppState<D>,
    ) -> Task<ScreenMessage<Self>>;
}

/// Wraps a task of screen-local messages.
pub(crate) fn local<S: Screen>(task: Task<S::Message>) -> Task<ScreenMessage<S>>
where
    S: Send + 'static,
{
    task.map(ScreenMessage::ScreenMessage)
}
