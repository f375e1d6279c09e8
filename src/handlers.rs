use crate::error::AppError;
use crate::images::Upload;
use crate::models::{Category, Image};
use crate::policy::{session_token, Admin, CurrentIdentity, SESSION_COOKIE};
use crate::storage::ContentLocation;
use crate::AppState;
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio::fs;
use tokio_util::io::ReaderStream;

#[derive(Deserialize)]
pub struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    message: &'static str,
    is_admin: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    message: &'static str,
    is_admin: bool,
    username: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
}

#[derive(Deserialize)]
pub struct NewCategory {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageQuery {
    category_id: Option<String>,
}

fn parse_category_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::invalid_input("categoryId must be an integer"))
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.cookie_secure)
        .max_age(time::Duration::seconds(state.sessions.ttl().num_seconds()))
        .build()
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .credentials
        .create_user(&body.username, &body.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully",
            is_admin: user.is_admin,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(body): Json<Credentials>,
) -> Result<(SignedCookieJar, Json<LoginResponse>), AppError> {
    let user = match state
        .credentials
        .verify_user(&body.username, &body.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(username = %body.username, "Failed login attempt");
            return Err(e);
        }
    };

    // A fresh login on this client replaces whatever session it held.
    if let Some(previous) = session_token(&jar) {
        state.sessions.revoke(&previous);
    }
    let token = state.sessions.issue(&user);
    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    Ok((
        jar.add(session_cookie(&state, token)),
        Json(LoginResponse {
            message: "Login successful",
            is_admin: user.is_admin,
            username: user.username,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Json<MessageResponse>) {
    if let Some(token) = session_token(&jar) {
        if state.sessions.revoke(&token) {
            tracing::debug!("Session revoked");
        }
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/").build()),
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}

pub async fn check_auth(CurrentIdentity(identity): CurrentIdentity) -> Json<AuthStatus> {
    Json(match identity {
        Some(identity) => AuthStatus {
            authenticated: true,
            is_admin: Some(identity.is_admin),
            username: Some(identity.username),
        },
        None => AuthStatus {
            authenticated: false,
            is_admin: None,
            username: None,
        },
    })
}

pub async fn create_category(
    Admin(_): Admin,
    State(state): State<AppState>,
    Json(body): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = state.categories.create(&body.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.categories.list_all().await?))
}

pub async fn upload_image(
    Admin(identity): Admin,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Image>), AppError> {
    let mut upload = None;
    let mut category_id = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                upload = Some(Upload {
                    original_name,
                    content_type,
                    bytes,
                });
            }
            "categoryId" => category_id = Some(parse_category_id(&field.text().await?)?),
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| AppError::invalid_input("No file uploaded"))?;
    let category_id = category_id.ok_or_else(|| AppError::invalid_input("categoryId is required"))?;

    let image = state
        .images
        .create(upload, category_id, &identity.username)
        .await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<Vec<Image>>, AppError> {
    let category_id = match query.category_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_category_id(raw)?),
    };

    Ok(Json(state.images.list(category_id).await?))
}

pub async fn download_image(
    Admin(_): Admin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let download = state.images.download(id).await?;

    let path = match download.location {
        ContentLocation::Redirect(url) => return Ok(Redirect::temporary(&url).into_response()),
        ContentLocation::File(path) => path,
    };

    let file = match fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(image_id = id, path = %path.display(), "Image metadata points at a missing file");
            return Err(AppError::NotFound("Image"));
        }
        Err(e) => return Err(AppError::Storage(e.into())),
    };

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);
    let disposition = attachment_disposition(&download.image.original_name);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.image.content_type.as_str())
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(body)
        .map_err(|e| AppError::internal(format!("failed to build download response: {e}")))
}

/// Quotes and backslashes would break out of the quoted filename and control
/// characters are not allowed in header values.
fn attachment_disposition(original_name: &str) -> String {
    let name: String = original_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{name}\"")
}

pub async fn delete_image(
    Admin(identity): Admin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.images.delete(id).await?;
    tracing::info!(image_id = id, deleted_by = %identity.username, "Image deleted");

    Ok(Json(MessageResponse {
        message: "Image deleted successfully",
    }))
}
