use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use tracing::{debug, info, warn};

use crate::auth::service::{self, RegisterRequest, Registration};
use crate::auth::session::{require_login, Session};
use crate::error::AppError;
use crate::forms::{Form, FormData, LOGIN_FORM, PROFILE_FORM, REGISTER_FORM};
use crate::views::{self, FormPage, PageContext};
use crate::AppState;

const USERNAME_TAKEN: &str = "This username is already registered.";

const LOGIN_FAILED: &str = "Invalid username or password.";

const REGISTER_PAGE: FormPage = FormPage {
    name: "register",
    title: "Register",
    button: "Register",
    action: "/register",
};

const LOGIN_PAGE: FormPage = FormPage {
    name: "login",
    title: "Log In",
    button: "Log In",
    action: "/login",
};

const PROFILE_PAGE: FormPage = FormPage {
    name: "profile",
    title: "Profile",
    button: "Update",
    action: "/profile",
};

fn render(state: &AppState, session: &mut Session, page: &FormPage, form: &Form) -> HttpResponse {
    let ctx = PageContext::from_session(session);
    state
        .sessions
        .html(session, StatusCode::OK, views::form_page(&ctx, page, form))
}

pub async fn register_page(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let mut session = state.sessions.load(&req);
    render(&state, &mut session, &REGISTER_PAGE, &Form::new(REGISTER_FORM))
}

pub async fn register(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let mut session = state.sessions.load(&req);
    let mut form = Form::with_data(REGISTER_FORM, FormData::parse(&body));

    if form.validate() {
        let request = RegisterRequest {
            username: form.value("username").to_string(),
            fullname: form.value("fullname").to_string(),
            email: form.value("email").to_string(),
            password: form.value("password").to_string(),
        };

        let mut store = state.stores.open().await?;
        let outcome = service::register(store.as_mut(), &request).await?;
        store.close().await?;

        match outcome {
            Registration::Created(user) => {
                // Log the new account in right away
                session.login(user);
                return Ok(state.sessions.redirect(&session, "/profile"));
            }
            Registration::UsernameTaken => {
                info!("Registration refused, {} is taken", request.username);
                form.add_error("username", USERNAME_TAKEN);
            }
        }
    }

    Ok(render(&state, &mut session, &REGISTER_PAGE, &form))
}

pub async fn login_page(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let mut session = state.sessions.load(&req);
    render(&state, &mut session, &LOGIN_PAGE, &Form::new(LOGIN_FORM))
}

pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let mut session = state.sessions.load(&req);
    let mut form = Form::with_data(LOGIN_FORM, FormData::parse(&body));

    if form.validate() {
        let username = form.value("username").to_string();

        let mut store = state.stores.open().await?;
        let user = service::authenticate(store.as_mut(), &username, form.value("password")).await?;
        store.close().await?;

        match user {
            Some(user) => {
                info!("Login successful for {}", username);
                session.login(user);
                return Ok(state.sessions.redirect(&session, "/profile"));
            }
            None => {
                warn!("Login failed for {}", username);
                form.add_error("password", LOGIN_FAILED);
            }
        }
    }

    Ok(render(&state, &mut session, &LOGIN_PAGE, &form))
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let mut session = state.sessions.load(&req);
    if session.logout() {
        session.flash("You are logged out.");
    }
    state.sessions.redirect(&session, "/login")
}

pub async fn profile_page(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let mut session = state.sessions.load(&req);
    let user = match require_login(&session) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let form = Form::with_data(
        PROFILE_FORM,
        FormData::from_pairs([("fullname", user.fullname), ("email", user.email)]),
    );
    render(&state, &mut session, &PROFILE_PAGE, &form)
}

pub async fn update_profile(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> HttpResponse {
    let mut session = state.sessions.load(&req);
    let user = match require_login(&session) {
        Ok(user) => user,
        Err(redirect) => return redirect,
    };

    let mut form = Form::with_data(PROFILE_FORM, FormData::parse(&body));
    if form.validate() {
        // Profile changes are accepted but not stored
        debug!("Profile update for {} validated, nothing persisted", user.username);
    }
    render(&state, &mut session, &PROFILE_PAGE, &form)
}
