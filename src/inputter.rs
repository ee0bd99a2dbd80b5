use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line text input with a character based cursor.
#[derive(Debug, Default, Clone)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize,
    max_len: Option<usize>,
    finished: bool,
    canceled: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
}

impl Inputter {
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len: Some(max_len),
            ..Self::default()
        }
    }

    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.current_input.clear();
                self.curser_pos = 0;
                self.get()
            }
            (kc, km) => self.key(kc, km),
        }
    }

    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.curser_pos = self.current_input.chars().count();
        self.finished = false;
        self.canceled = false;
    }

    pub fn value(&self) -> &str {
        &self.current_input
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            curser_pos: self.curser_pos,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let idx = self.getbytepos();
            self.current_input.remove(idx);
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            let idx = self.getbytepos();
            self.current_input.remove(idx);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            self.curser_pos += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.curser_pos = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.curser_pos = self.current_input.chars().count();
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if modifier.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            trace!("Ignoring modified key {code:?} {modifier:?}");
            return self.get();
        }
        if let Some(chr) = code.as_char() {
            let full = self
                .max_len
                .is_some_and(|max| self.current_input.chars().count() >= max);
            if !full {
                self.current_input.insert(self.getbytepos(), chr);
                self.curser_pos += 1;
            }
        }
        self.get()
    }

    fn getbytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(input: &mut Inputter, code: KeyCode) -> InputResult {
        input.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(input: &mut Inputter, s: &str) {
        for c in s.chars() {
            press(input, KeyCode::Char(c));
        }
    }

    #[test]
    fn typing_and_editing_in_the_middle() {
        let mut input = Inputter::default();
        type_str(&mut input, "Jne");
        press(&mut input, KeyCode::Left);
        press(&mut input, KeyCode::Left);
        press(&mut input, KeyCode::Char('a'));
        assert_eq!(input.value(), "Jane");
        press(&mut input, KeyCode::End);
        let result = press(&mut input, KeyCode::Backspace);
        assert_eq!(result.input, "Jan");
        assert_eq!(result.curser_pos, 3);
        press(&mut input, KeyCode::Home);
        press(&mut input, KeyCode::Delete);
        assert_eq!(input.value(), "an");
    }

    #[test]
    fn multibyte_characters_are_edited_by_char() {
        let mut input = Inputter::default();
        input.set("Zoë");
        assert_eq!(input.get().curser_pos, 3);
        press(&mut input, KeyCode::Backspace);
        assert_eq!(input.value(), "Zo");
    }

    #[test]
    fn enter_finishes_and_escape_cancels() {
        let mut input = Inputter::default();
        type_str(&mut input, "42");
        let done = press(&mut input, KeyCode::Enter);
        assert!(done.finished && !done.canceled);
        assert_eq!(done.input, "42");
        let canceled = press(&mut input, KeyCode::Esc);
        assert!(canceled.finished && canceled.canceled);
        assert_eq!(canceled.input, "");
    }

    #[test]
    fn max_len_limits_input() {
        let mut input = Inputter::with_max_len(3);
        type_str(&mut input, "12345");
        assert_eq!(input.value(), "123");
    }

    #[test]
    fn control_chords_are_not_inserted() {
        let mut input = Inputter::default();
        type_str(&mut input, "abc");
        input.read(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL));
        assert_eq!(input.value(), "abc");
        input.read(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(input.value(), "");
    }
}
