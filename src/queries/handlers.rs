use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use tracing::{error, info};

use crate::auth::session::{require_login, Session};
use crate::db::{NewQuery, Store};
use crate::error::{AppError, DatabaseError};
use crate::forms::{Form, FormData, ADD_QUERY_FORM};
use crate::queries::service::{parse_tags, save_query, AddQueryRequest, QueryView};
use crate::views::{self, FormPage, PageContext};
use crate::AppState;

const LATEST_LIMIT: i64 = 10;

const SAVE_FAILED: &str = "An error occurred while saving the query";

const ADD_PAGE: FormPage = FormPage {
    name: "add",
    title: "Save a useful query",
    button: "Save",
    action: "/add",
};

pub async fn index(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let mut session = state.sessions.load(&req);

    let mut store = state.stores.open().await?;
    let rows = store.latest_queries(LATEST_LIMIT).await?;
    store.close().await?;

    let queries: Vec<QueryView> = rows.into_iter().map(QueryView::from).collect();
    let ctx = PageContext::from_session(&mut session);
    Ok(state.sessions.html(&session, StatusCode::OK, views::index_page(&ctx, &queries)))
}

/// The submission form with the current versions as checkbox choices.
async fn add_form(store: &mut dyn Store, data: FormData) -> Result<Form, DatabaseError> {
    let versions = store.versions().await?;
    let mut form = Form::with_data(ADD_QUERY_FORM, data);
    form.set_choices(
        versions
            .into_iter()
            .map(|v| (v.version_num, v.version))
            .collect(),
    );
    Ok(form)
}

fn render_add(state: &AppState, session: &mut Session, form: &Form) -> HttpResponse {
    let ctx = PageContext::from_session(session);
    state
        .sessions
        .html(session, StatusCode::OK, views::form_page(&ctx, &ADD_PAGE, form))
}

pub async fn add_page(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let mut session = state.sessions.load(&req);
    if let Err(redirect) = require_login(&session) {
        return Ok(redirect);
    }

    let mut store = state.stores.open().await?;
    let form = add_form(store.as_mut(), FormData::default()).await?;
    store.close().await?;

    Ok(render_add(&state, &mut session, &form))
}

pub async fn add_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let mut session = state.sessions.load(&req);
    let user = match require_login(&session) {
        Ok(user) => user,
        Err(redirect) => return Ok(redirect),
    };

    let mut store = state.stores.open().await?;
    let mut form = add_form(store.as_mut(), FormData::parse(&body)).await?;

    if form.validate() {
        let request = AddQueryRequest {
            query: NewQuery {
                query: form.value("query").to_string(),
                title: form.value("title").to_string(),
                description: form.value("description").to_string(),
                account_id: user.id,
            },
            versions: form.selected("versions"),
            tags: parse_tags(form.value("tags")),
        };

        match save_query(store.as_mut(), &request).await {
            Ok(query_id) => {
                store.close().await?;
                info!("{} saved query {}", user.username, query_id);
                return Ok(state.sessions.redirect(&session, "/"));
            }
            Err(e) => {
                // Nothing of the submission may stay behind
                error!("Failed to save query for {}: {}", user.username, e);
                store.rollback().await?;
                session.flash(SAVE_FAILED);
            }
        }
    }

    store.close().await?;
    Ok(render_add(&state, &mut session, &form))
}

pub async fn tag_cloud() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound)
}

pub async fn by_tag(_tag: web::Path<String>) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound)
}

pub async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound)
}
