use std::future::Future;

use iced::Task;

use crate::{
    core::db::DataSource,
    crm::{Notification, Notifications},
    error::{CrmError, CrmResult},
};

/// State shared by every screen of a signed-in window.
pub struct AppState<D: DataSource> {
    pub source: D,
    /// Bound to the current session; `None` while signed out.
    pub workspace: Option<D::Workspace>,
    pub notifications: Notifications,
}

impl<D: DataSource> AppState<D> {
    pub fn new(source: D) -> Self {
        Self {
            source,
            workspace: None,
            notifications: Notifications::default(),
        }
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// Runs `op` against the current workspace and maps its outcome, with the
    /// error rendered as text, into a message.
    pub fn perform<T, F, Fut, M>(
        &self,
        op: F,
        to_message: impl FnOnce(Result<T, String>) -> M + Send + 'static,
    ) -> Task<M>
    where
        F: FnOnce(D::Workspace) -> Fut + Send + 'static,
        Fut: Future<Output = CrmResult<T>> + Send + 'static,
        T: Send + 'static,
        M: Send + 'static,
    {
        let Some(workspace) = self.workspace.clone() else {
            return Task::done(to_message(Err(CrmError::NotSignedIn.to_string())));
        };
        Task::perform(async move { op(workspace).await.map_err(|e| e.to_string()) }, to_message)
    }
}
