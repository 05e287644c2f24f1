use iced::{
    Alignment::Center,
    Element, Length,
    widget::{button, column, container, row, text, text_input},
};

use crate::crm::gate::{AuthAction, InlineMessage, LoginForm};

#[derive(Debug, Clone)]
pub enum LoginMessage {
    Email(String),
    Password(String),
    Submit(AuthAction),
}

pub fn view(form: &LoginForm) -> Element<'_, LoginMessage> {
    let submit = |action| (!form.busy).then_some(LoginMessage::Submit(action));
    let mut content = column![
        text("crmdesk").size(32),
        text("Sign in or create an account"),
        text_input("Email", &form.email)
            .on_input(LoginMessage::Email)
            .width(Length::Fixed(320.0)),
        text_input("Password", &form.password)
            .secure(true)
            .on_input(LoginMessage::Password)
            .on_submit_maybe(submit(AuthAction::SignIn))
            .width(Length::Fixed(320.0)),
        row![
            button("Sign in").on_press_maybe(submit(AuthAction::SignIn)),
            button("Register")
                .style(button::secondary)
                .on_press_maybe(submit(AuthAction::SignUp)),
        ]
        .spacing(20),
    ]
    .spacing(20)
    .padding(20)
    .align_x(Center);

    if let Some(message) = &form.message {
        let line = text(message.text().to_string());
        content = content.push(match message {
            InlineMessage::Info(_) => line.style(text::success),
            InlineMessage::Error(_) => line.style(text::danger),
        });
    }

    container(content)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
