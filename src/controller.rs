use std::time::Duration;
use tracing::trace;

use crate::domain::{AppConfig, Message, RegistryError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, RegistryError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(self.handle_key(key));
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::PrevPage),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::NextPage),
            (KeyCode::Home, _) => Some(Message::FirstPage),
            (KeyCode::End, _) => Some(Message::LastPage),
            (KeyCode::Char(']'), _) => Some(Message::PageSizeUp),
            (KeyCode::Char('['), _) => Some(Message::PageSizeDown),
            (KeyCode::Char(c @ '1'..='9'), _) => c.to_digit(10).map(|d| Message::SortColumn(d as usize - 1)),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('g'), _) => Some(Message::GotoPage),
            (KeyCode::Char('c'), _) => Some(Message::ClearFilter),
            (KeyCode::Char('a'), _) => Some(Message::Register),
            (KeyCode::Char('d'), _) => Some(Message::Delete),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn map(code: KeyCode) -> Option<Message> {
        Controller::new(&AppConfig::default()).handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn maps_directory_keys() {
        assert_eq!(map(KeyCode::Char('q')), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char('j')), Some(Message::MoveDown));
        assert_eq!(map(KeyCode::Right), Some(Message::NextPage));
        assert_eq!(map(KeyCode::Char('1')), Some(Message::SortColumn(0)));
        assert_eq!(map(KeyCode::Char('5')), Some(Message::SortColumn(4)));
        assert_eq!(map(KeyCode::Char(']')), Some(Message::PageSizeUp));
        assert_eq!(map(KeyCode::Esc), Some(Message::Exit));
        assert_eq!(map(KeyCode::Char('z')), None);
    }

    #[test]
    fn ctrl_c_quits() {
        let controller = Controller::new(&AppConfig::default());
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(controller.handle_key(key), Some(Message::Quit));
    }
}
