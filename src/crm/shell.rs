use crate::{core::auth::AuthProvider, crm::Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavItem {
    Contacts,
    Companies,
    Deals,
    Tasks,
    PipelineSettings,
}

impl NavItem {
    pub const ALL: [NavItem; 5] = [
        NavItem::Contacts,
        NavItem::Companies,
        NavItem::Deals,
        NavItem::Tasks,
        NavItem::PipelineSettings,
    ];

    pub fn label(self) -> &'static str {
        match self {
            NavItem::Contacts => "Contacts",
            NavItem::Companies => "Companies",
            NavItem::Deals => "Deals",
            NavItem::Tasks => "Tasks",
            NavItem::PipelineSettings => "Pipeline Settings",
        }
    }
}

/// Navigation state of the signed-in application. Exactly one entry is
/// active at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    active: NavItem,
}

impl Default for Shell {
    fn default() -> Self {
        Self {
            active: NavItem::Contacts,
        }
    }
}

impl Shell {
    pub fn active(&self) -> NavItem {
        self.active
    }

    pub fn is_active(&self, item: NavItem) -> bool {
        self.active == item
    }

    /// Every selection re-enters the view, even when it is already active.
    pub fn select(&mut self, item: NavItem) {
        tracing::debug!(view = item.label(), "navigate");
        self.active = item;
    }
}

/// Signs out. Navigation is left to the session event; a failure is
/// returned as a notification.
pub async fn logout<A: AuthProvider>(auth: &A) -> Option<Notification> {
    match auth.sign_out().await {
        Ok(()) => None,
        Err(e) => Some(Notification::failed("Logout", e)),
    }
}
