use std::time::Duration;

use iced::keyboard::{self, key::Named, Key, Modifiers};
use iced::widget::{container, image, text};
use iced::{event, window, ContentFit, Element, Event, Length, Subscription, Task};

use facewatch_core::presentation::domain::presentation_sink::InputSignal;
use facewatch_core::presentation::infrastructure::window_sink::{SessionClosed, ViewerLink};
use facewatch_core::shared::constants::WINDOW_TITLE;

/// How often the window checks for a new frame.
const FRAME_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub enum Message {
    Tick,
    Signal(InputSignal),
}

/// Shows the session's annotated frames and forwards key presses to it.
pub struct Viewer {
    link: ViewerLink,
    frame: Option<image::Handle>,
}

impl Viewer {
    fn new(link: ViewerLink) -> (Self, Task<Message>) {
        (Self { link, frame: None }, Task::none())
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => match self.link.latest_frame() {
                Ok(Some(shown)) => {
                    self.frame = Some(image::Handle::from_rgba(
                        shown.width,
                        shown.height,
                        shown.to_rgba(),
                    ));
                }
                Ok(None) => {}
                Err(SessionClosed) => return iced::exit(),
            },
            Message::Signal(signal) => self.link.send(signal),
        }
        Task::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let content: Element<'_, Message> = match &self.frame {
            Some(handle) => image(handle.clone())
                .content_fit(ContentFit::ScaleDown)
                .into(),
            None => text("Waiting for the first frame...").into(),
        };
        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(FRAME_POLL).map(|_| Message::Tick),
            event::listen_with(key_message),
        ])
    }
}

/// Runs the window on the calling thread until the session ends or the
/// user closes it. Closing drops the link, which the session sees as quit.
pub fn run(link: ViewerLink, width: u32, height: u32) -> iced::Result {
    iced::application(
        move || Viewer::new(link.clone()),
        Viewer::update,
        Viewer::view,
    )
    .title(WINDOW_TITLE)
    .subscription(Viewer::subscription)
    .window(window::Settings {
        size: iced::Size::new(width as f32, height as f32),
        ..Default::default()
    })
    .run()
}

fn key_message(event: Event, _status: event::Status, _window: window::Id) -> Option<Message> {
    match event {
        Event::Keyboard(keyboard::Event::KeyPressed { key, modifiers, .. }) => {
            signal_for_key(&key, modifiers).map(Message::Signal)
        }
        _ => None,
    }
}

/// Maps a window key press to a session signal.
pub fn signal_for_key(key: &Key, modifiers: Modifiers) -> Option<InputSignal> {
    match key.as_ref() {
        Key::Character("c") if modifiers.control() => Some(InputSignal::Quit),
        Key::Character("q") | Key::Named(Named::Escape) => Some(InputSignal::Quit),
        Key::Character("s") => Some(InputSignal::CaptureStill),
        _ => None,
    }
}
