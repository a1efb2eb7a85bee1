use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use log::{debug, info};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use shared::{BatchResponse, SessionCreated};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::batch::{BatchContext, BatchOptions, UploadedFile, process_batch};
use crate::classifier::{ConfidencePolicy, ModelHandle};
use crate::config::{DiagnosticsConfig, parse_flag};
use crate::error::ApiError;
use crate::image_loader::ImageLoader;
use crate::session::{SessionState, SessionStore};

/// Process-wide collaborators shared by every worker.
pub struct AppState {
    pub model: ModelHandle,
    pub loader: ImageLoader,
    pub policy: ConfidencePolicy,
    pub diagnostics: DiagnosticsConfig,
}

/// Per-request overrides of the diagnostic toggles. Values are read like the
/// environment flags, so `1`, `yes` and `on` all switch a toggle on.
#[derive(Debug, Deserialize)]
pub struct ClassifyQuery {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub debug: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub bypass_validation: Option<bool>,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|value| parse_flag(&value)))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/model").route(web::get().to(model_info)))
        .service(web::resource("/api/sessions").route(web::post().to(create_session)))
        .service(
            web::resource("/api/sessions/{session_id}").route(web::delete().to(close_session)),
        )
        .service(
            web::resource("/api/sessions/{session_id}/classify")
                .route(web::post().to(handle_classify)),
        )
        .service(
            web::resource("/api/sessions/{session_id}/history").route(web::get().to(get_history)),
        )
        .service(
            web::resource("/api/sessions/{session_id}/history/export")
                .route(web::get().to(export_history)),
        );
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::SessionNotFound(raw.to_string()))
}

fn find_session(
    store: &SessionStore,
    raw: &str,
) -> Result<(Uuid, Arc<Mutex<SessionState>>), ApiError> {
    let id = parse_session_id(raw)?;
    let session = store
        .get(id)?
        .ok_or_else(|| ApiError::SessionNotFound(raw.to_string()))?;
    Ok((id, session))
}

fn poisoned(_: impl std::fmt::Display) -> ApiError {
    ApiError::Internal("session lock poisoned".into())
}

async fn health(store: web::Data<SessionStore>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "sessions": store.len()?
    })))
}

async fn model_info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.model.info(&state.policy))
}

async fn create_session(store: web::Data<SessionStore>) -> Result<HttpResponse, ApiError> {
    let session_id = store.create()?;
    Ok(HttpResponse::Created().json(SessionCreated { session_id }))
}

async fn close_session(
    store: web::Data<SessionStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let raw = path.into_inner();
    let id = parse_session_id(&raw)?;
    if store.remove(id)? {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::SessionNotFound(raw))
    }
}

/// Reads every file part of the upload, plus any `selected` text parts naming the
/// files to process.
async fn read_upload(
    mut payload: Multipart,
) -> Result<(Vec<UploadedFile>, Option<Vec<String>>), ApiError> {
    let mut files = Vec::new();
    let mut selected: Option<Vec<String>> = None;

    while let Some(mut field) = payload.try_next().await? {
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);
        let field_name = field.name().map(str::to_owned);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            data.extend_from_slice(&chunk?);
        }

        match (file_name, field_name.as_deref()) {
            // a file input left blank is sent with an empty filename
            (Some(name), _) if name.is_empty() => {
                debug!("Ignoring file field without a filename ({} bytes)", data.len());
            }
            (Some(name), _) => files.push(UploadedFile { name, bytes: data }),
            (None, Some("selected")) => selected
                .get_or_insert_with(Vec::new)
                .push(String::from_utf8_lossy(&data).trim().to_string()),
            _ => {}
        }
    }
    Ok((files, selected))
}

async fn handle_classify(
    state: web::Data<AppState>,
    store: web::Data<SessionStore>,
    path: web::Path<String>,
    query: web::Query<ClassifyQuery>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let (session_id, session) = find_session(&store, &path.into_inner())?;
    let (files, selected) = read_upload(payload).await?;

    let options = BatchOptions {
        debug: query.debug.unwrap_or(state.diagnostics.debug_mode),
        bypass_validation: query
            .bypass_validation
            .unwrap_or(state.diagnostics.bypass_validation),
        selected,
    };
    info!(
        "Session {}: received {} files (debug: {}, bypass validation: {})",
        session_id,
        files.len(),
        options.debug,
        options.bypass_validation
    );

    let ctx = BatchContext {
        model: &state.model,
        loader: &state.loader,
        policy: &state.policy,
    };
    let mut session = session.lock().map_err(poisoned)?;
    let results = process_batch(&mut session, &ctx, files, &options);

    Ok(HttpResponse::Ok().json(BatchResponse {
        session_id,
        results,
        history: session.records().to_vec(),
    }))
}

async fn get_history(
    store: web::Data<SessionStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let (_, session) = find_session(&store, &path.into_inner())?;
    let session = session.lock().map_err(poisoned)?;
    Ok(HttpResponse::Ok().json(session.records()))
}

async fn export_history(
    store: web::Data<SessionStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let (session_id, session) = find_session(&store, &path.into_inner())?;
    let session = session.lock().map_err(poisoned)?;
    let file_name = SessionState::export_file_name(Utc::now());
    info!(
        "Session {}: exporting {} records as {}",
        session_id,
        session.records().len(),
        file_name
    );

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ))
        .body(session.export_csv()))
}
