//! Form handling
//!
//! A form is a static list of [`FieldSpec`]s. Each field names its rules as
//! an ordered list of predicate + message pairs; [`Form::validate`] walks the
//! fields in declaration order and keeps the first failing rule of each.

pub mod definitions;

use std::collections::HashMap;

pub use definitions::{ADD_QUERY_FORM, LOGIN_FORM, PROFILE_FORM, REGISTER_FORM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Password,
    TextArea,
    Checkbox,
    /// Several checkboxes sharing a name, one per dynamic choice.
    MultiCheckbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Present and not blank.
    Required,
    /// Shaped like `local@domain.tld`.
    Email,
    /// Same value as the named field.
    EqualTo(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub predicate: Predicate,
    pub message: &'static str,
}

impl Rule {
    pub const REQUIRED: Rule = Rule {
        predicate: Predicate::Required,
        message: "This field is required.",
    };

    pub const EMAIL: Rule = Rule {
        predicate: Predicate::Email,
        message: "Invalid email address.",
    };

    pub const fn equal_to(field: &'static str, message: &'static str) -> Rule {
        Rule {
            predicate: Predicate::EqualTo(field),
            message,
        }
    }

    pub fn check(&self, value: &str, data: &FormData) -> bool {
        match self.predicate {
            Predicate::Required => !value.trim().is_empty(),
            Predicate::Email => is_email(value),
            Predicate::EqualTo(other) => data.get(other).unwrap_or_default() == value,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub rules: &'static [Rule],
}

/// Decoded `application/x-www-form-urlencoded` body, repeated keys kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

impl FormData {
    pub fn parse(body: &[u8]) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// First value submitted under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Form {
    fields: &'static [FieldSpec],
    data: FormData,
    choices: Vec<(i32, String)>,
    errors: HashMap<&'static str, String>,
}

impl Form {
    pub fn new(fields: &'static [FieldSpec]) -> Self {
        Self::with_data(fields, FormData::default())
    }

    pub fn with_data(fields: &'static [FieldSpec], data: FormData) -> Self {
        Self {
            fields,
            data,
            choices: Vec::new(),
            errors: HashMap::new(),
        }
    }

    /// Choices offered by the form's multi-checkbox field.
    pub fn set_choices(&mut self, choices: Vec<(i32, String)>) {
        self.choices = choices;
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn choices(&self) -> &[(i32, String)] {
        &self.choices
    }

    pub fn value(&self, name: &str) -> &str {
        self.data.get(name).unwrap_or_default()
    }

    /// Checked choices of a multi-checkbox field, coerced and deduplicated.
    /// Values that are not integers are skipped; `validate` reports them.
    pub fn selected(&self, name: &str) -> Vec<i32> {
        let mut selected: Vec<i32> = Vec::new();
        for value in self.data.get_all(name) {
            if let Ok(id) = value.trim().parse::<i32>() {
                if !selected.contains(&id) {
                    selected.push(id);
                }
            }
        }
        selected
    }

    pub fn is_checked(&self, name: &str, choice: i32) -> bool {
        self.selected(name).contains(&choice)
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(String::as_str)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Attaches an error found after validation, e.g. a taken username.
    pub fn add_error(&mut self, name: &str, message: impl Into<String>) {
        if let Some(field) = self.fields.iter().find(|f| f.name == name) {
            self.errors.insert(field.name, message.into());
        }
    }

    /// Runs every field's rules. Returns true when no field failed.
    pub fn validate(&mut self) -> bool {
        self.errors.clear();
        for field in self.fields {
            if let Some(message) = self.first_failure(field) {
                self.errors.insert(field.name, message);
            }
        }
        self.errors.is_empty()
    }

    fn first_failure(&self, field: &FieldSpec) -> Option<String> {
        if field.kind == FieldKind::MultiCheckbox {
            if let Some(message) = self.check_choices(field) {
                return Some(message);
            }
        }

        let value = self.value(field.name);
        field
            .rules
            .iter()
            .find(|rule| !rule.check(value, &self.data))
            .map(|rule| rule.message.to_string())
    }

    fn check_choices(&self, field: &FieldSpec) -> Option<String> {
        for value in self.data.get_all(field.name) {
            let Ok(id) = value.trim().parse::<i32>() else {
                return Some("Invalid choice(s): one or more data inputs could not be coerced".to_string());
            };
            if !self.choices.iter().any(|(choice, _)| *choice == id) {
                return Some(format!("'{}' is not a valid choice for this field", id));
            }
        }
        None
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || value.chars().any(char::is_whitespace) {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_data(pairs: &[(&str, &str)]) -> Form {
        Form::with_data(REGISTER_FORM, FormData::from_pairs(pairs.iter().copied()))
    }

    fn valid_registration() -> Vec<(&'static str, &'static str)> {
        vec![
            ("username", "alice"),
            ("fullname", "Alice Liddell"),
            ("email", "alice@example.com"),
            ("password", "secret"),
            ("confirm_password", "secret"),
            ("terms", "y"),
        ]
    }

    #[test]
    fn test_parse_keeps_repeated_keys() {
        let data = FormData::parse(b"versions=1&versions=2&title=Locks+held&tags=a%2Cb");
        assert_eq!(data.get_all("versions").collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(data.get("title"), Some("Locks held"));
        assert_eq!(data.get("tags"), Some("a,b"));
        assert_eq!(data.get("missing"), None);
    }

    #[test]
    fn test_valid_registration() {
        let mut form = register_data(&valid_registration());
        assert!(form.validate());
        assert!(!form.has_errors());
    }

    #[test]
    fn test_first_failing_rule_is_reported() {
        let mut pairs = valid_registration();
        pairs.retain(|(k, _)| *k != "email");
        let mut form = register_data(&pairs);

        assert!(!form.validate());
        // Required comes before Email in the declaration
        assert_eq!(form.error("email"), Some("This field is required."));
    }

    #[test]
    fn test_email_shape() {
        let mut pairs = valid_registration();
        pairs.retain(|(k, _)| *k != "email");
        pairs.push(("email", "not-an-email"));
        let mut form = register_data(&pairs);

        assert!(!form.validate());
        assert_eq!(form.error("email"), Some("Invalid email address."));

        assert!(is_email("a.b@example.org"));
        assert!(!is_email("a@b"));
        assert!(!is_email("a@@example.org"));
        assert!(!is_email(".a@example.org"));
        assert!(!is_email("a b@example.org"));
    }

    #[test]
    fn test_password_confirmation() {
        let mut pairs = valid_registration();
        pairs.retain(|(k, _)| *k != "confirm_password");
        pairs.push(("confirm_password", "different"));
        let mut form = register_data(&pairs);

        assert!(!form.validate());
        assert_eq!(form.error("password"), Some("Passwords must match"));
        assert_eq!(form.error("confirm_password"), None);
    }

    #[test]
    fn test_blank_is_not_present() {
        let mut pairs = valid_registration();
        pairs.retain(|(k, _)| *k != "username");
        pairs.push(("username", "   "));
        let mut form = register_data(&pairs);

        assert!(!form.validate());
        assert_eq!(form.error("username"), Some("This field is required."));
    }

    #[test]
    fn test_injected_error() {
        let mut form = register_data(&valid_registration());
        assert!(form.validate());

        form.add_error("username", "This username is already registered.");
        assert_eq!(form.error("username"), Some("This username is already registered."));

        // Unknown fields are ignored
        form.add_error("nickname", "nope");
        assert_eq!(form.error("nickname"), None);
    }

    #[test]
    fn test_multi_checkbox_coercion() {
        let data = FormData::from_pairs([
            ("title", "t"),
            ("query", "select 1"),
            ("versions", "90100"),
            ("versions", "90100"),
            ("versions", "90300"),
        ]);
        let mut form = Form::with_data(ADD_QUERY_FORM, data);
        form.set_choices(vec![(90100, "9.1".to_string()), (90300, "9.3".to_string())]);

        assert!(form.validate());
        assert_eq!(form.selected("versions"), vec![90100, 90300]);
        assert!(form.is_checked("versions", 90300));
    }

    #[test]
    fn test_multi_checkbox_rejects_unknown_choices() {
        let mut form = Form::with_data(
            ADD_QUERY_FORM,
            FormData::from_pairs([("title", "t"), ("query", "q"), ("versions", "7")]),
        );
        form.set_choices(vec![(90100, "9.1".to_string())]);
        assert!(!form.validate());
        assert_eq!(form.error("versions"), Some("'7' is not a valid choice for this field"));

        let mut form = Form::with_data(
            ADD_QUERY_FORM,
            FormData::from_pairs([("title", "t"), ("query", "q"), ("versions", "latest")]),
        );
        form.set_choices(vec![(90100, "9.1".to_string())]);
        assert!(!form.validate());
        assert!(form.error("versions").unwrap().starts_with("Invalid choice(s)"));
    }

    #[test]
    fn test_empty_version_selection_is_valid() {
        let mut form = Form::with_data(
            ADD_QUERY_FORM,
            FormData::from_pairs([("title", "t"), ("query", "q")]),
        );
        form.set_choices(vec![(90100, "9.1".to_string())]);
        assert!(form.validate());
        assert!(form.selected("versions").is_empty());
    }
}
