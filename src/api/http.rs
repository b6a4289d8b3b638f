use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Router,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::Receiver as BroadcastReceiver;
use tracing::info;

use crate::api::error::ApiError;
use crate::storage::RecordId;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRequest {
    pub value: i64,
    pub city: String,
    pub datetime: DateTime<FixedOffset>,
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub id: RecordId,
}

pub fn router(state: Arc<crate::AppState>) -> Router {
    Router::new()
        .route("/temperature", collection_routes())
        .route("/temperature/", collection_routes())
        .route(
            "/temperature/:id",
            reject_other_methods(
                get(get_temperature).delete(delete_temperature),
                "GET or DELETE",
                "/temperature/<id>",
            ),
        )
        .route(
            "/city/",
            reject_other_methods(get(temperatures_by_empty_city), "GET", "/city/<city>"),
        )
        .route(
            "/city/:city",
            reject_other_methods(get(temperatures_by_city), "GET", "/city/<city>"),
        )
        .route(
            "/datetime/:year/:month/:day",
            reject_other_methods(
                get(temperatures_by_date),
                "GET",
                "/datetime/<year>/<month>/<day>",
            ),
        )
        .layer(Extension(state))
}

/// Serve `router` on `listener` until a shutdown signal arrives.
pub async fn run(
    listener: TcpListener,
    state: Arc<crate::AppState>,
    mut shutdown: BroadcastReceiver<()>,
) -> anyhow::Result<()> {
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    info!("http server stopped");
    Ok(())
}

fn collection_routes() -> MethodRouter {
    reject_other_methods(
        get(list_temperatures)
            .post(create_temperature)
            .delete(delete_all_temperatures),
        "GET, POST or DELETE",
        "/temperature/",
    )
}

/// Answer 405 for every method `route` does not register. HEAD is rejected
/// explicitly, since axum would otherwise serve it with the GET handler.
fn reject_other_methods(route: MethodRouter, allowed: &'static str, path: &'static str) -> MethodRouter {
    let reject = move |method: Method| async move { method_not_allowed(allowed, path, &method) };
    route.head(reject).fallback(reject)
}

fn method_not_allowed(allowed: &str, path: &str, method: &Method) -> ApiError {
    ApiError::MethodNotAllowed(format!(
        "use method {} at {}, don't {}",
        allowed, path, method
    ))
}

fn json<T: Serialize>(value: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value)?;
    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response())
}

/// Media type of the request with parameters stripped, lowercased.
fn media_type(headers: &HeaderMap) -> Result<String, ApiError> {
    let raw = match headers.get(header::CONTENT_TYPE) {
        Some(v) => v
            .to_str()
            .map_err(|_| ApiError::BadRequest("invalid Content-Type header".to_string()))?,
        None => "",
    };
    let media = raw.split(';').next().unwrap_or_default().trim();
    if media.is_empty() {
        return Err(ApiError::BadRequest("no media type".to_string()));
    }
    match media.split_once('/') {
        Some((kind, sub)) if !kind.is_empty() && !sub.is_empty() => Ok(media.to_ascii_lowercase()),
        _ => Err(ApiError::BadRequest(format!("malformed media type {:?}", media))),
    }
}

fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Incorrect id".to_string()))
}

async fn create_temperature(
    Extension(state): Extension<Arc<crate::AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    info!("handling temperature create at {}", uri.path());

    if media_type(&headers)? != "application/json" {
        return Err(ApiError::UnsupportedMediaType(
            "use application/json Content-Type".to_string(),
        ));
    }
    let req: CreateRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let id = state.store.create(req.value, req.city, req.datetime);
    json(&CreateResponse { id })
}

async fn list_temperatures(
    Extension(state): Extension<Arc<crate::AppState>>,
    uri: Uri,
) -> Result<Response, ApiError> {
    info!("handling get all temperatures at {}", uri.path());
    json(&state.store.list())
}

async fn delete_all_temperatures(
    Extension(state): Extension<Arc<crate::AppState>>,
    uri: Uri,
) -> Response {
    info!("handling delete all temperatures at {}", uri.path());
    state.store.delete_all();
    ().into_response()
}

async fn get_temperature(
    Extension(state): Extension<Arc<crate::AppState>>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<Response, ApiError> {
    info!("handling get temperature at {}", uri.path());
    let temperature = state.store.get(parse_id(&id)?)?;
    json(&temperature)
}

async fn delete_temperature(
    Extension(state): Extension<Arc<crate::AppState>>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<Response, ApiError> {
    info!("handling delete temperature at {}", uri.path());
    state.store.delete(parse_id(&id)?)?;
    Ok(().into_response())
}

async fn temperatures_by_city(
    Extension(state): Extension<Arc<crate::AppState>>,
    Path(city): Path<String>,
    uri: Uri,
) -> Result<Response, ApiError> {
    info!("handling temperatures by city at {}", uri.path());
    json(&state.store.find_by_city(&city))
}

// `/city/:city` never matches an empty segment
async fn temperatures_by_empty_city(
    Extension(state): Extension<Arc<crate::AppState>>,
    uri: Uri,
) -> Result<Response, ApiError> {
    info!("handling temperatures by city at {}", uri.path());
    json(&state.store.find_by_city(""))
}

async fn temperatures_by_date(
    Extension(state): Extension<Arc<crate::AppState>>,
    Path((year, month, day)): Path<(String, String, String)>,
    uri: Uri,
) -> Result<Response, ApiError> {
    info!("handling temperatures by datetime at {}", uri.path());

    let bad_request =
        || ApiError::BadRequest(format!("use /datetime/<year>/<month>/<day>, got {}", uri.path()));
    let year: i64 = year.parse().map_err(|_| bad_request())?;
    let month: u32 = month.parse().map_err(|_| bad_request())?;
    let day: i64 = day.parse().map_err(|_| bad_request())?;
    if !(1..=12).contains(&month) {
        return Err(bad_request());
    }

    json(&state.store.find_by_date(year, month, day))
}
