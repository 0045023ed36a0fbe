use std::path::Path;

use axum::{
    extract::{Multipart, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio::task::spawn_blocking;

use crate::{
    error::{validation::validate_name, AppError, AppResult},
    middleware::{
        ip::MaybeRemoteAddr,
        rate_limit::{RECOGNITION_ENDPOINT, REGISTER_ENDPOINT},
        validation::sanitize_for_logging,
    },
    preprocess::{self, PreprocessOptions},
    recognition::{QueryImage, Recognition},
    state::AppState,
    store::StoreError,
    types::{
        DeleteAllResponse, DeleteQuery, DeleteResponse, InfoQuery, RecognitionResponse, RecognizeQuery,
        RegisterQuery, RegisterResponse, RenameQuery, RenameResponse, StoreInfo,
    },
};

/// Multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "img_file";
const DEFAULT_QUERY_EXTENSION: &str = "jpg";

struct Upload {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to Face Recognition API." }))
}

pub async fn recognize(
    State(state): State<AppState>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    Query(q): Query<RecognizeQuery>,
    multipart: Multipart,
) -> AppResult<Response> {
    let ip = remote.client_ip(&headers);
    if let Err((status, body)) = state.rate_limiter.check_endpoint_limit(RECOGNITION_ENDPOINT, ip).await {
        return Ok((status, body).into_response());
    }

    let upload = read_upload(multipart).await?;
    let extension = upload
        .file_name
        .as_deref()
        .and_then(extension_of)
        .unwrap_or(DEFAULT_QUERY_EXTENSION)
        .to_string();
    let opts = PreprocessOptions {
        resize: q.resize.then_some((state.config.preprocess.width, state.config.preprocess.height)),
        grayscale: q.grayscale,
    };
    let bytes = run_preprocess(upload.bytes, extension.clone(), opts).await?;

    state.metrics.inc_recognitions();
    let outcome = {
        let store = state.store.read().await;
        state.gateway.recognize(&QueryImage { bytes, extension }, &store).await
    };
    let recognition = match outcome {
        Ok(r) => r,
        Err(e) => {
            if matches!(e, StoreError::RecognitionFailed(_) | StoreError::RecognitionTimeout(_)) {
                state.metrics.inc_recognition_failures();
            }
            return Err(e.into());
        }
    };

    let body = match recognition {
        Recognition::Match(m) => {
            state.metrics.inc_matches();
            tracing::info!("Recognized {} (score {:.4})", m.name, m.score);
            let name = if q.return_image_name { m.identifier().to_string() } else { m.name.clone() };
            RecognitionResponse::Match { name, path: m.path.display().to_string(), score: m.score }
        }
        Recognition::NoMatch => {
            state.metrics.inc_no_matches();
            RecognitionResponse::NoMatch { message: "No Image Found".to_string() }
        }
    };
    Ok(Json(body).into_response())
}

pub async fn register(
    State(state): State<AppState>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    Query(q): Query<RegisterQuery>,
    multipart: Multipart,
) -> AppResult<Response> {
    let ip = remote.client_ip(&headers);
    if let Err((status, body)) = state.rate_limiter.check_endpoint_limit(REGISTER_ENDPOINT, ip).await {
        return Ok((status, body).into_response());
    }

    let upload = read_upload(multipart).await?;
    let name = resolve_save_name(upload.file_name.as_deref(), q.img_save_name.as_deref())?;
    let extension = extension_of(&name).unwrap_or_default().to_string();

    let pre = &state.config.preprocess;
    let opts = PreprocessOptions {
        resize: q.resize.unwrap_or(pre.resize).then_some((pre.width, pre.height)),
        grayscale: q.grayscale,
    };
    let bytes = run_preprocess(upload.bytes, extension, opts).await?;

    let mut store = state.store.clone().write_owned().await;
    let stored = spawn_blocking(move || store.add(&name, &bytes)).await??;
    state.metrics.inc_registrations();

    let path = stored.path.display().to_string();
    Ok(Json(RegisterResponse {
        message: format!("{} has been saved at {}", stored.name, path),
        name: stored.name,
        path,
    })
    .into_response())
}

pub async fn rename(State(state): State<AppState>, Query(q): Query<RenameQuery>) -> AppResult<Json<RenameResponse>> {
    let old_name = validate_name(&q.src_path, "src_path")?.to_string();
    let new_name = validate_name(&q.img_name, "img_name")?.to_string();
    tracing::debug!(
        "Rename request: '{}' -> '{}'",
        sanitize_for_logging(&old_name),
        sanitize_for_logging(&new_name)
    );

    let mut store = state.store.clone().write_owned().await;
    let source = old_name.clone();
    let stored = spawn_blocking(move || store.rename(&source, &new_name)).await??;
    state.metrics.inc_renames();

    Ok(Json(RenameResponse {
        message: format!("Renamed {} to {}", old_name, stored.name),
        old_name,
        new_name: stored.name,
    }))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Query(q): Query<DeleteQuery>,
) -> AppResult<Json<DeleteResponse>> {
    let name = validate_name(&q.img_path, "img_path")?.to_string();

    let mut store = state.store.clone().write_owned().await;
    let target = name.clone();
    spawn_blocking(move || store.delete(&target)).await??;
    state.metrics.add_deletions(1);

    Ok(Json(DeleteResponse { message: format!("{} has been deleted", name), name }))
}

pub async fn delete_all(State(state): State<AppState>) -> AppResult<Json<DeleteAllResponse>> {
    let mut store = state.store.clone().write_owned().await;
    let removed = spawn_blocking(move || store.delete_all()).await??;
    state.metrics.add_deletions(removed as u64);

    let message = if removed == 0 {
        "The image store is already empty".to_string()
    } else {
        "All images have been deleted".to_string()
    };
    Ok(Json(DeleteAllResponse { message, removed }))
}

pub async fn store_info(State(state): State<AppState>, Query(q): Query<InfoQuery>) -> AppResult<Json<StoreInfo>> {
    let store = state.store.clone().read_owned().await;
    let names = spawn_blocking(move || store.list()).await??;

    Ok(Json(StoreInfo {
        number_of_images: names.len(),
        all_images_file: q.return_img_file.then_some(names),
    }))
}

async fn read_upload(mut multipart: Multipart) -> AppResult<Upload> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().and_then(client_file_name).map(str::to_string);
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Uploaded image is empty".into()));
        }
        return Ok(Upload { file_name, bytes: bytes.to_vec() });
    }
    Err(AppError::BadRequest(format!("Image file needs to be sent in multipart field '{}'", UPLOAD_FIELD)))
}

async fn run_preprocess(bytes: Vec<u8>, extension: String, opts: PreprocessOptions) -> AppResult<Vec<u8>> {
    if opts.is_noop() {
        return Ok(bytes);
    }
    Ok(spawn_blocking(move || preprocess::apply(bytes, &extension, opts)).await??)
}

/// Picks the name an upload is stored under.
///
/// - no save name: the upload's own file name
/// - save name without extension: the upload's extension is appended
/// - save name with extension: must match the upload's extension, if it has one
pub fn resolve_save_name(upload_name: Option<&str>, save_name: Option<&str>) -> AppResult<String> {
    let upload_ext = upload_name.and_then(extension_of);

    let Some(save) = save_name.map(str::trim).filter(|s| !s.is_empty()) else {
        return upload_name
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("img_save_name is required when the upload has no file name".into()));
    };
    let save = validate_name(save, "img_save_name")?;

    match (extension_of(save), upload_ext) {
        (Some(save_ext), Some(upload_ext)) if !save_ext.eq_ignore_ascii_case(upload_ext) => Err(
            AppError::BadRequest(format!("File extension should match the uploaded file (.{})", upload_ext)),
        ),
        (Some(_), _) => Ok(save.to_string()),
        (None, Some(upload_ext)) => Ok(format!("{}.{}", save, upload_ext)),
        (None, None) => Err(AppError::BadRequest(
            "Cannot infer a file extension: give img_save_name an extension".into(),
        )),
    }
}

fn extension_of(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str()).filter(|e| !e.is_empty())
}

/// Strips any client-side directory from an uploaded file name.
fn client_file_name(raw: &str) -> Option<&str> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_save_name() {
        assert_eq!(resolve_save_name(Some("alice.jpg"), None).unwrap(), "alice.jpg");
        assert_eq!(resolve_save_name(Some("upload.png"), Some("bob")).unwrap(), "bob.png");
        assert_eq!(resolve_save_name(Some("upload.png"), Some("bob.PNG")).unwrap(), "bob.PNG");
        assert_eq!(resolve_save_name(None, Some("carol.jpg")).unwrap(), "carol.jpg");
        assert_eq!(resolve_save_name(Some("upload.jpg"), Some("  ")).unwrap(), "upload.jpg");
    }

    #[test]
    fn test_resolve_save_name_rejections() {
        assert!(matches!(resolve_save_name(Some("upload.png"), Some("bob.jpg")), Err(AppError::BadRequest(_))));
        assert!(matches!(resolve_save_name(None, Some("bob")), Err(AppError::BadRequest(_))));
        assert!(matches!(resolve_save_name(None, None), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_client_file_name() {
        assert_eq!(client_file_name("C:\\Users\\me\\alice.jpg"), Some("alice.jpg"));
        assert_eq!(client_file_name("photos/alice.jpg"), Some("alice.jpg"));
        assert_eq!(client_file_name("alice.jpg"), Some("alice.jpg"));
        assert_eq!(client_file_name("photos/"), None);
    }
}
