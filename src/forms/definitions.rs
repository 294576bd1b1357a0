use super::{FieldKind, FieldSpec, Rule};

const PASSWORDS_MATCH: Rule = Rule::equal_to("confirm_password", "Passwords must match");

pub const REGISTER_FORM: &[FieldSpec] = &[
    FieldSpec {
        name: "username",
        label: "Username",
        kind: FieldKind::Text,
        rules: &[Rule::REQUIRED],
    },
    FieldSpec {
        name: "fullname",
        label: "Full name",
        kind: FieldKind::Text,
        rules: &[Rule::REQUIRED],
    },
    FieldSpec {
        name: "email",
        label: "E-mail",
        kind: FieldKind::Text,
        rules: &[Rule::REQUIRED, Rule::EMAIL],
    },
    FieldSpec {
        name: "password",
        label: "Password",
        kind: FieldKind::Password,
        rules: &[Rule::REQUIRED, PASSWORDS_MATCH],
    },
    FieldSpec {
        name: "confirm_password",
        label: "Confirm password",
        kind: FieldKind::Password,
        rules: &[],
    },
    FieldSpec {
        name: "terms",
        label: "I have read and accept the terms of service",
        kind: FieldKind::Checkbox,
        rules: &[Rule::REQUIRED],
    },
];

pub const LOGIN_FORM: &[FieldSpec] = &[
    FieldSpec {
        name: "username",
        label: "Username",
        kind: FieldKind::Text,
        rules: &[Rule::REQUIRED],
    },
    FieldSpec {
        name: "password",
        label: "Password",
        kind: FieldKind::Password,
        rules: &[Rule::REQUIRED],
    },
];

pub const PROFILE_FORM: &[FieldSpec] = &[
    FieldSpec {
        name: "fullname",
        label: "Full name",
        kind: FieldKind::Text,
        rules: &[Rule::REQUIRED],
    },
    FieldSpec {
        name: "email",
        label: "E-mail",
        kind: FieldKind::Text,
        rules: &[Rule::REQUIRED, Rule::EMAIL],
    },
    FieldSpec {
        name: "password",
        label: "Password",
        kind: FieldKind::Password,
        rules: &[Rule::REQUIRED, PASSWORDS_MATCH],
    },
    FieldSpec {
        name: "confirm_password",
        label: "Confirm password",
        kind: FieldKind::Password,
        rules: &[],
    },
];

pub const ADD_QUERY_FORM: &[FieldSpec] = &[
    FieldSpec {
        name: "title",
        label: "Title",
        kind: FieldKind::Text,
        rules: &[Rule::REQUIRED],
    },
    FieldSpec {
        name: "query",
        label: "Query",
        kind: FieldKind::TextArea,
        rules: &[Rule::REQUIRED],
    },
    FieldSpec {
        name: "versions",
        label: "Supported versions",
        kind: FieldKind::MultiCheckbox,
        rules: &[],
    },
    FieldSpec {
        name: "description",
        label: "Description",
        kind: FieldKind::TextArea,
        rules: &[],
    },
    FieldSpec {
        name: "tags",
        label: "Tags",
        kind: FieldKind::Text,
        rules: &[],
    },
];
