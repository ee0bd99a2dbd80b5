use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::inputter::Inputter;
use crate::patient::{NewPatient, PatientField, PatientInput, ValidationErrors, validate};

const FIELD_MAX_LEN: usize = 120;

#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    Editing,
    Submit(NewPatient),
    Cancel,
}

/// Registration form: one line editor per patient field.
#[derive(Debug, Clone)]
pub struct RegisterForm {
    inputs: Vec<Inputter>,
    focus: usize,
    errors: ValidationErrors,
    submitted: bool,
}

impl Default for RegisterForm {
    fn default() -> Self {
        Self {
            inputs: PatientField::ALL
                .iter()
                .map(|_| Inputter::with_max_len(FIELD_MAX_LEN))
                .collect(),
            focus: 0,
            errors: ValidationErrors::default(),
            submitted: false,
        }
    }
}

impl RegisterForm {
    pub fn focused(&self) -> PatientField {
        PatientField::ALL[self.focus]
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn value(&self, field: PatientField) -> &str {
        self.inputs[Self::slot(field)].value()
    }

    pub fn set(&mut self, field: PatientField, value: &str) {
        self.inputs[Self::slot(field)].set(value);
    }

    pub fn input(&self) -> PatientInput {
        let mut input = PatientInput::default();
        for (field, editor) in PatientField::ALL.iter().zip(&self.inputs) {
            input.set(*field, editor.value());
        }
        input
    }

    /// Back to empty fields, first field focused, no errors.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.inputs.len();
    }

    pub fn prev_field(&mut self) {
        self.focus = (self.focus + self.inputs.len() - 1) % self.inputs.len();
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        match key.code {
            KeyCode::Esc => FormAction::Cancel,
            KeyCode::Enter => self.submit(),
            KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.prev_field();
                FormAction::Editing
            }
            KeyCode::Tab | KeyCode::Down => {
                self.next_field();
                FormAction::Editing
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.prev_field();
                FormAction::Editing
            }
            _ => {
                self.inputs[self.focus].read(key);
                // After a failed submit, errors follow the input.
                if self.submitted {
                    self.errors = validate(&self.input()).err().unwrap_or_default();
                }
                FormAction::Editing
            }
        }
    }

    /// Validates the current input; on failure the errors stay on the form.
    pub fn submit(&mut self) -> FormAction {
        self.submitted = true;
        match validate(&self.input()) {
            Ok(patient) => {
                self.errors = ValidationErrors::default();
                FormAction::Submit(patient)
            }
            Err(errors) => {
                trace!("Registration rejected: {errors}");
                if let Some(first) = errors.errors.first() {
                    self.focus = Self::slot(first.field);
                }
                self.errors = errors;
                FormAction::Editing
            }
        }
    }

    fn slot(field: PatientField) -> usize {
        PatientField::ALL
            .iter()
            .position(|f| *f == field)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(form: &mut RegisterForm, code: KeyCode) -> FormAction {
        form.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(form: &mut RegisterForm, s: &str) {
        for c in s.chars() {
            press(form, KeyCode::Char(c));
        }
    }

    #[test]
    fn tab_cycles_through_fields() {
        let mut form = RegisterForm::default();
        assert_eq!(form.focused(), PatientField::FirstName);
        press(&mut form, KeyCode::Tab);
        assert_eq!(form.focused(), PatientField::LastName);
        press(&mut form, KeyCode::BackTab);
        press(&mut form, KeyCode::BackTab);
        assert_eq!(form.focused(), PatientField::Address);
    }

    #[test]
    fn empty_submit_reports_required_fields() {
        let mut form = RegisterForm::default();
        press(&mut form, KeyCode::Tab);
        assert_eq!(press(&mut form, KeyCode::Enter), FormAction::Editing);
        let errors = form.errors();
        assert_eq!(errors.for_field(PatientField::FirstName), Some("First name is required"));
        assert_eq!(errors.for_field(PatientField::LastName), Some("Last name is required"));
        assert_eq!(
            errors.for_field(PatientField::DateOfBirth),
            Some("Date of birth must be in MM/DD/YYYY format")
        );
        assert_eq!(form.focused(), PatientField::FirstName);
    }

    #[test]
    fn errors_follow_edits_after_a_failed_submit() {
        let mut form = RegisterForm::default();
        form.submit();
        type_str(&mut form, "Jane");
        assert_eq!(form.errors().for_field(PatientField::FirstName), None);
        assert!(form.errors().for_field(PatientField::LastName).is_some());
    }

    #[test]
    fn valid_input_submits_a_patient() {
        let mut form = RegisterForm::default();
        type_str(&mut form, "Jane");
        press(&mut form, KeyCode::Tab);
        type_str(&mut form, "Doe");
        press(&mut form, KeyCode::Tab);
        type_str(&mut form, "01/02/1990");
        form.set(PatientField::Phone, "5551234567");

        match press(&mut form, KeyCode::Enter) {
            FormAction::Submit(patient) => {
                assert_eq!(patient.first_name, "Jane");
                assert_eq!(patient.last_name, "Doe");
                assert_eq!(patient.phone.as_deref(), Some("5551234567"));
                assert_eq!(patient.email, None);
            }
            other => panic!("expected submit, got {other:?}"),
        }
        assert!(form.errors().is_empty());

        form.reset();
        assert_eq!(form.input(), PatientInput::default());
        assert_eq!(form.focused(), PatientField::FirstName);
    }

    #[test]
    fn escape_cancels() {
        let mut form = RegisterForm::default();
        type_str(&mut form, "Ja");
        assert_eq!(press(&mut form, KeyCode::Esc), FormAction::Cancel);
        assert_eq!(form.value(PatientField::FirstName), "Ja");
    }
}
