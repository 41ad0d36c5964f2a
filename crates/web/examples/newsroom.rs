//! A small newsroom on top of the router: login pages behind session checks,
//! an administrator area, a JSON api restricted to the website origin and an
//! external api behind bearer tokens.
//!
//! ```text
//! cargo run --example newsroom -- config/newsdesk.toml
//! curl -v http://127.0.0.1:8080/newsdesk/home
//! curl -v -d 'username=ana' http://127.0.0.1:8080/newsdesk/
//! curl -H 'Origin: http://127.0.0.1:8080' -H 'Referer: http://127.0.0.1:8080/newsdesk/' \
//!     http://127.0.0.1:8080/newsdesk/api/authorization
//! curl -H "Authorization: Bearer $TOKEN" http://127.0.0.1:8080/newsdesk/api/external/news/all
//! ```

use std::sync::Arc;

use http::header::SET_COOKIE;
use http::StatusCode;
use newsdesk_web::config::AppConfig;
use newsdesk_web::middleware::{
    middleware_fn, MemorySessionStore, Middlewares, Privilege, RequireAdministrator, RequireAuthorization,
    RequireLogin, RequireLogout, RequireWebsiteOrigin, SessionStore, SessionUser,
};
use newsdesk_web::router::{get, post};
use newsdesk_web::{handler_fn, HandlerError, RequestContext, Response, Router, Server};
use tracing::info;

struct News {
    id: u64,
    title: &'static str,
    highlighted: bool,
}

static NEWS: [News; 3] = [
    News { id: 1, title: "City council approves new budget", highlighted: true },
    News { id: 2, title: "Harbour reopens after storm", highlighted: false },
    News { id: 3, title: "Local team wins the championship", highlighted: true },
];

fn news_json(news: &News) -> serde_json::Value {
    serde_json::json!({ "id": news.id, "title": news.title, "highlighted": news.highlighted })
}

fn api_envelope(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "success": true, "data": data, "message": "" })
}

fn router(config: &AppConfig, sessions: &Arc<MemorySessionStore>) -> Result<Router, Box<dyn std::error::Error>> {
    let store: Arc<dyn SessionStore> = Arc::clone(sessions) as Arc<dyn SessionStore>;
    let authorization = Arc::new(RequireAuthorization::from_config(&config.jwt));
    let issuer = Arc::clone(&authorization);
    let middlewares = Middlewares::builder()
        .add("required-logout", RequireLogout::new(Arc::clone(&store)))
        .add("required-login", RequireLogin::new(Arc::clone(&store)))
        .add("required-administrator", RequireAdministrator::new(Arc::clone(&store)))
        .add("required-website-origin", RequireWebsiteOrigin::new(&config.origin.origin, &config.origin.referer))
        .add("required-authorization", authorization)
        .add(
            "access-log",
            middleware_fn(|req, next| {
                let response = next.run(req)?;
                info!(method = %req.request().method(), path = req.request().path(), status = response.status().as_u16(), "served");
                Ok(response)
            }),
        )
        .defaults(["access-log"])
        .build();

    let login_sessions = Arc::clone(sessions);
    let logout_sessions = Arc::clone(&store);

    let router = Router::builder()
        .base_url(config.app.url.clone())
        .middlewares(middlewares)
        .route(
            "/",
            get(handler_fn(|_req: &RequestContext<'_>| {
                Ok::<_, HandlerError>("<form method=\"post\"><input name=\"username\"><button>Login</button></form>")
            }))
            .with("required-logout"),
        )
        .route(
            "/",
            post(handler_fn(move |req: &RequestContext<'_>| -> Result<Response, HandlerError> {
                let username = req.request().post_var("username").unwrap_or_default();
                if username.is_empty() {
                    return Err(HandlerError::bad_request("username is required"));
                }
                let privilege = if username == "admin" { Privilege::Administrator } else { Privilege::Editor };
                let id = login_sessions.login(SessionUser { id: 1, username: username.to_owned(), privilege });
                let cookie = login_sessions.session_cookie(&id).map_err(|e| HandlerError::internal(e.to_string()))?;

                let mut response = req.redirect("/home");
                response.append_header(SET_COOKIE, cookie);
                Ok(response)
            }))
            .with("required-logout"),
        )
        .route(
            "/home",
            get(handler_fn(|_req: &RequestContext<'_>| Ok::<_, HandlerError>("<h1>Newsroom</h1>"))).with("required-login"),
        )
        .route(
            "/logout",
            get(handler_fn(move |req: &RequestContext<'_>| -> Result<Response, HandlerError> {
                logout_sessions.logout(req.request()).map_err(|e| HandlerError::internal(e.to_string()))?;
                let mut response = req.redirect("/");
                response.append_header(SET_COOKIE, logout_sessions.expired_cookie());
                Ok(response)
            }))
            .with("required-login"),
        )
        .route(
            "/news/preview/{id}",
            get(handler_fn(|req: &RequestContext<'_>| -> Result<String, HandlerError> {
                let id: u64 = req.var("id").parse().map_err(|_e| HandlerError::bad_request("invalid news id"))?;
                let news = NEWS.iter().find(|news| news.id == id).ok_or_else(|| HandlerError::not_found("news not found"))?;
                Ok(format!("<article><h1>{}</h1></article>", news.title))
            }))
            .with("required-login"),
        )
        .route(
            "/users",
            get(handler_fn(|_req: &RequestContext<'_>| Ok::<_, HandlerError>("<h1>Users</h1>")))
                .with("required-login")
                .with("required-administrator"),
        )
        .route(
            "/api/news/all",
            get(handler_fn(|_req: &RequestContext<'_>| {
                Ok::<_, HandlerError>(api_envelope(NEWS.iter().map(news_json).collect()))
            }))
            .with("required-website-origin"),
        )
        .route(
            "/api/news/highlighted",
            get(handler_fn(|_req: &RequestContext<'_>| {
                let highlighted = NEWS.iter().filter(|news| news.highlighted).map(news_json).collect();
                Ok::<_, HandlerError>(api_envelope(highlighted))
            }))
            .with("required-website-origin"),
        )
        .route(
            "/api/authorization",
            get(handler_fn(move |_req: &RequestContext<'_>| -> Result<serde_json::Value, HandlerError> {
                let token = issuer.issue().map_err(|_e| HandlerError::internal("Erro interno."))?;
                Ok(serde_json::json!({ "success": true, "data": token, "message": "Token gerado com sucesso." }))
            }))
            .with("required-website-origin"),
        )
        .route(
            "/api/external/news/all",
            get(handler_fn(|_req: &RequestContext<'_>| {
                Ok::<_, HandlerError>(api_envelope(NEWS.iter().map(news_json).collect()))
            }))
            .with("required-authorization"),
        )
        .route(
            "/api/news/{id}",
            get(handler_fn(|req: &RequestContext<'_>| {
                let found = NEWS.iter().find(|news| news.id.to_string() == req.var("id"));
                Ok::<_, HandlerError>(match found {
                    Some(news) => (StatusCode::OK, api_envelope(news_json(news))),
                    None => (
                        StatusCode::NOT_FOUND,
                        serde_json::json!({ "success": false, "data": "", "message": "News not found." }),
                    ),
                })
            }))
            .with("required-website-origin"),
        )
        .build()?;

    Ok(router)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default().with_env_overrides(|name| std::env::var(name).ok()),
    };

    let sessions = Arc::new(MemorySessionStore::new());
    let router = router(&config, &sessions)?;
    let server = Server::builder().router(router).config(&config).build()?;

    server.start().await;
    Ok(())
}
