use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::api::{FeedEntry, FeedItem};
use crate::console::{Console, ConsoleState, ItemsPanel, Session, SessionId};

/// Cookie carrying the browser's console session id
pub const SESSION_COOKIE: &str = "feed_console_session";

pub struct AppState {
    pub console: Arc<Console>,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub state: ConsoleState,
    pub link_missing_comments: bool,
}

#[derive(Template)]
#[template(path = "console.html")]
pub struct ConsoleTemplate {
    pub state: ConsoleState,
    pub link_missing_comments: bool,
}

impl ConsoleTemplate {
    async fn current(session: &Session<'_>) -> Self {
        Self {
            state: session.snapshot().await,
            link_missing_comments: session.link_missing_comments(),
        }
    }
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// Session id from the request cookie, or a fresh one added to the jar
fn session_id(jar: CookieJar) -> (CookieJar, SessionId) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| SessionId::parse(cookie.value()))
    {
        return (jar, id);
    }

    let id = SessionId::new();
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), id)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/console/feeds", get(list_feeds).post(add_feed))
        .route("/console/feeds/remove", post(remove_feed))
        .route("/console/items", get(view_items))
        .route("/console/all", get(view_all))
        .route("/console/groups/toggle", post(toggle_group))
        .route("/console/content", get(view_content))
        .route("/console/content/summarize", post(summarize))
        .route("/console/notice/dismiss", post(dismiss_notice))
        .route("/console/read_later", get(list_read_later).post(save_for_later))
        .route("/console/read_later/custom", post(add_custom_link))
        .route("/console/read_later/remove", post(remove_read_later))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
pub struct FeedForm {
    #[serde(default)]
    pub url: String,
}

#[derive(Deserialize)]
pub struct ReadLaterForm {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Deserialize)]
pub struct CustomLinkForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Deserialize)]
pub struct LinkForm {
    pub link: String,
}

#[derive(Deserialize)]
pub struct ContentQuery {
    pub feed: String,
    pub link: String,
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.list_feeds().await;
    let _ = session.view_all().await;

    let ConsoleTemplate {
        state,
        link_missing_comments,
    } = ConsoleTemplate::current(&session).await;
    (
        jar,
        HtmlTemplate(IndexTemplate {
            state,
            link_missing_comments,
        }),
    )
}

pub async fn list_feeds(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.list_feeds().await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn add_feed(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<FeedForm>,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.add_feed(&form.url).await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn remove_feed(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<FeedForm>,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.remove_feed(&form.url).await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn view_items(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<FeedForm>,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.view_items(&query.url).await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn view_all(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.view_all().await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn toggle_group(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<FeedForm>,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    session.toggle_group(&form.url).await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn view_content(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<ContentQuery>,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.view_content(&query.feed, &query.link).await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn summarize(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.summarize().await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn dismiss_notice(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    session.dismiss_notice().await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn list_read_later(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.list_read_later().await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn save_for_later(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<ReadLaterForm>,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let item = FeedItem {
        title: form.title,
        link: form.link,
        comments: form.comments,
        description: None,
    };
    let _ = session.save_for_later(item).await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn add_custom_link(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<CustomLinkForm>,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.add_custom_link(&form.title, &form.url).await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn remove_read_later(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LinkForm>,
) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let session = state.console.session(id);
    let _ = session.remove_read_later(&form.link).await;
    (jar, HtmlTemplate(ConsoleTemplate::current(&session).await))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
