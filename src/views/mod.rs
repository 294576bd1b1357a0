//! HTML rendering
//!
//! Handlers hand over already prepared data; nothing here touches the
//! database or the request. All user supplied text goes through
//! [`escape_html`].

use actix_web::http::StatusCode;

use crate::auth::session::{Session, SessionUser};
use crate::forms::{FieldKind, FieldSpec, Form};
use crate::queries::service::QueryView;

/// Values every page shows around its content.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<SessionUser>,
    pub flashes: Vec<String>,
}

impl PageContext {
    /// Takes the pending flash messages out of the session.
    pub fn from_session(session: &mut Session) -> Self {
        Self {
            user: session.user().cloned(),
            flashes: session.take_flashes(),
        }
    }
}

/// Fixed texts of a page that shows a single form.
#[derive(Debug, Clone, Copy)]
pub struct FormPage {
    pub name: &'static str,
    pub title: &'static str,
    pub button: &'static str,
    pub action: &'static str,
}

pub fn escape_html(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 2);
    for c in input.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

fn layout(ctx: &PageContext, page: &str, title: &str, content: &str) -> String {
    let nav = match &ctx.user {
        Some(user) => format!(
            r#"<a href="/add">Add a query</a> <a href="/profile">{}</a> <a href="/logout">Log out</a>"#,
            escape_html(&user.username)
        ),
        None => r#"<a href="/login">Log in</a> <a href="/register">Register</a>"#.to_string(),
    };

    let flashes: String = ctx
        .flashes
        .iter()
        .map(|message| format!(r#"<li class="flash">{}</li>"#, escape_html(message)))
        .collect();
    let flashes = if flashes.is_empty() {
        String::new()
    } else {
        format!(r#"<ul class="flashes">{}</ul>"#, flashes)
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title} - Pouch</title></head>
<body class="{page}">
<nav><a href="/">Pouch</a> {nav}</nav>
{flashes}
<main>
<h1>{title}</h1>
{content}
</main>
</body>
</html>
"#,
        title = escape_html(title),
        page = page,
        nav = nav,
        flashes = flashes,
        content = content,
    )
}

pub fn index_page(ctx: &PageContext, queries: &[QueryView]) -> String {
    let mut content = String::new();
    if queries.is_empty() {
        content.push_str("<p>No query has been saved yet.</p>\n");
    }

    for query in queries {
        let tags: String = query
            .tags
            .iter()
            .map(|tag| format!(r#"<li class="tag">{}</li>"#, escape_html(tag)))
            .collect();
        content.push_str(&format!(
            r#"<article id="query-{id}">
<h2>{title}</h2>
<p class="versions">{versions}</p>
<pre><code class="sql">{query}</code></pre>
<p class="description">{description}</p>
<ul class="tags">{tags}</ul>
</article>
"#,
            id = query.id,
            title = escape_html(&query.title),
            versions = escape_html(&query.versions),
            query = escape_html(&query.query),
            description = escape_html(&query.description),
            tags = tags,
        ));
    }

    layout(ctx, "index", "Latest queries", &content)
}

pub fn form_page(ctx: &PageContext, page: &FormPage, form: &Form) -> String {
    let mut content = format!(r#"<form method="post" action="{}">"#, page.action);
    content.push('\n');
    for field in form.fields() {
        content.push_str(&render_field(form, field));
    }
    content.push_str(&format!(
        "<button type=\"submit\">{}</button>\n</form>\n",
        escape_html(page.button)
    ));

    layout(ctx, page.name, page.title, &content)
}

fn render_field(form: &Form, field: &FieldSpec) -> String {
    let label = escape_html(field.label);
    let value = escape_html(form.value(field.name));

    let input = match field.kind {
        FieldKind::Text => format!(
            r#"<label for="{name}">{label}</label> <input type="text" id="{name}" name="{name}" value="{value}">"#,
            name = field.name,
        ),
        // Passwords are never sent back to the browser
        FieldKind::Password => format!(
            r#"<label for="{name}">{label}</label> <input type="password" id="{name}" name="{name}">"#,
            name = field.name,
        ),
        FieldKind::TextArea => format!(
            r#"<label for="{name}">{label}</label> <textarea id="{name}" name="{name}">{value}</textarea>"#,
            name = field.name,
        ),
        FieldKind::Checkbox => format!(
            r#"<input type="checkbox" id="{name}" name="{name}" value="y"{checked}> <label for="{name}">{label}</label>"#,
            name = field.name,
            checked = if form.value(field.name).is_empty() { "" } else { " checked" },
        ),
        FieldKind::MultiCheckbox => {
            let choices: String = form
                .choices()
                .iter()
                .map(|(id, text)| {
                    format!(
                        r#"<li><input type="checkbox" id="{name}-{id}" name="{name}" value="{id}"{checked}> <label for="{name}-{id}">{text}</label></li>"#,
                        name = field.name,
                        id = id,
                        text = escape_html(text),
                        checked = if form.is_checked(field.name, *id) { " checked" } else { "" },
                    )
                })
                .collect();
            format!(r#"<fieldset><legend>{label}</legend><ul id="{name}">{choices}</ul></fieldset>"#, name = field.name)
        }
    };

    let error = form
        .error(field.name)
        .map(|message| format!(r#" <span class="error">{}</span>"#, escape_html(message)))
        .unwrap_or_default();

    format!("<p>{}{}</p>\n", input, error)
}

pub fn error_page(status: StatusCode) -> String {
    let title = match status {
        StatusCode::NOT_FOUND => "Not Found",
        _ => status.canonical_reason().unwrap_or("Error"),
    };
    let message = match status {
        StatusCode::NOT_FOUND => "The requested URL was not found on the server.",
        _ => "Something went wrong while handling the request.",
    };
    layout(
        &PageContext::default(),
        "error",
        title,
        &format!("<p>{}</p>\n", message),
    )
}
