use std::fmt;

use iced::{
    Color, Element, Length, Theme, border,
    widget::{button, column, container, container::Style, row, text},
};
use iced_widget::container::bordered_box;
use uuid::Uuid;

use crate::crm::{Level, Notifications, shell::NavItem};

/// Bordered box; the active entry gets a darkened background.
fn entry_style(active: bool) -> impl Fn(&Theme) -> Style {
    move |theme: &Theme| {
        let style = bordered_box(theme).border(border::width(1));
        if active {
            let mut rgba = theme.palette().background.into_rgba8();
            rgba[0] /= 2;
            rgba[1] /= 2;
            rgba[2] /= 2;
            style.background(Color::from_rgb8(rgba[0], rgba[1], rgba[2]))
        } else {
            style.background(theme.palette().background)
        }
    }
}

/// Sidebar with one entry per view plus a logout button.
pub fn nav<'a, Message: Clone + 'a>(
    active: NavItem,
    on_select: impl Fn(NavItem) -> Message,
    on_logout: Message,
) -> Element<'a, Message> {
    let mut entries = column![text("crmdesk").size(24)].spacing(8).padding(10);
    for item in NavItem::ALL {
        entries = entries.push(
            container(
                button(text(item.label()))
                    .style(button::text)
                    .width(Length::Fill)
                    .on_press(on_select(item)),
            )
            .style(entry_style(item == active))
            .padding(2),
        );
    }
    entries
        .push(button("Logout").style(button::secondary).on_press(on_logout))
        .into()
}

pub fn layout<'a, Message>(
    sidebar: impl Into<Element<'a, Message>>,
    main_content: impl Into<Element<'a, Message>>,
) -> Element<'a, Message>
where
    Message: 'a,
{
    container(row![
        container(sidebar.into())
            .height(Length::Fill)
            .width(Length::FillPortion(1)),
        container(main_content.into())
            .padding(10)
            .width(Length::FillPortion(5)),
    ])
    .center_x(Length::Fill)
    .center_y(Length::Fill)
    .into()
}

pub fn loading<'a, Message: 'a>() -> Element<'a, Message> {
    container(text("Loading..."))
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Replaces the whole window when the backend could not be set up.
pub fn fatal<'a, Message: 'a>(message: &'a str) -> Element<'a, Message> {
    container(
        column![
            text("crmdesk could not start").size(28),
            text(message).style(text::danger),
        ]
        .spacing(16),
    )
    .center_x(Length::Fill)
    .center_y(Length::Fill)
    .into()
}

/// Error text shown in place of a list.
pub fn failure<'a, Message: 'a>(message: &str) -> Element<'a, Message> {
    container(text(message.to_string()).style(text::danger))
        .padding(10)
        .into()
}

pub fn notifications<'a, Message: Clone + 'a>(
    stack: &Notifications,
    on_dismiss: impl Fn(u64) -> Message,
) -> Element<'a, Message> {
    let mut items = column![].spacing(4);
    for (id, notice) in stack.iter() {
        let label = text(notice.message.clone());
        let label = match notice.level {
            Level::Success => label.style(text::success),
            Level::Info => label,
            Level::Error => label.style(text::danger),
        };
        items = items.push(
            container(row![label.width(Length::Fill), button("x").style(button::text).on_press(on_dismiss(*id))])
                .style(bordered_box)
                .padding(6),
        );
    }
    items.into()
}

/// An entry of a selector whose value is an optional id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub id: Option<Uuid>,
    pub label: String,
}

impl Choice {
    pub fn none(label: &str) -> Self {
        Self {
            id: None,
            label: label.to_string(),
        }
    }

    pub fn of(id: Uuid, label: impl fmt::Display) -> Self {
        Self {
            id: Some(id),
            label: label.to_string(),
        }
    }

    /// The "none" entry followed by `items`; returns the list and the entry
    /// matching `selected`.
    pub fn list<I>(none_label: &str, items: I, selected: Option<Uuid>) -> (Vec<Choice>, Option<Choice>)
    where
        I: IntoIterator<Item = Choice>,
    {
        let mut choices = vec![Choice::none(none_label)];
        choices.extend(items);
        let current = choices.iter().find(|c| c.id == selected).cloned();
        (choices, current)
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
