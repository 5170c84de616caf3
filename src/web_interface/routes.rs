use std::convert::Infallible;
use std::sync::Arc;

use bytes::BufMut;
use futures::TryStreamExt;
use log::{debug, error, info, warn};
use percent_encoding::percent_decode_str;
use rust_embed::RustEmbed;
use warp::http::header::{CONTENT_TYPE, SET_COOKIE};
use warp::http::{StatusCode, Uri};
use warp::multipart::{FormData, Part};
use warp::path::Tail;
use warp::reply::{self, Response};
use warp::{Filter, Rejection, Reply};

use super::render;
use super::session::{require_login, with_session, SessionData};
use super::types::{AppState, LoginForm, NewEntryForm, UploadForm};
use crate::error_handling::types::{StorageError, UploadError, WebError};
use crate::storage::{Attachment, Storage};

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/static/"]
struct Assets;

fn reject(err: impl Into<WebError>) -> Rejection {
    warp::reject::custom(err.into())
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn redirect(location: &str) -> Result<impl Reply, Rejection> {
    let uri: Uri = location
        .parse()
        .map_err(|_| reject(WebError::Internal(format!("bad redirect target {}", location))))?;
    Ok(warp::redirect::found(uri))
}

fn with_session_cookie(
    state: &AppState,
    reply: impl Reply,
    session: &SessionData,
) -> Result<Response, Rejection> {
    let cookie = state.signer.set_cookie(session).map_err(reject)?;
    Ok(reply::with_header(reply, SET_COOKIE, cookie).into_response())
}

/// Renders a page, consuming the pending flash messages. The cookie is only
/// rewritten when there were messages to consume.
fn page(
    state: &AppState,
    mut session: SessionData,
    render: impl FnOnce(bool, &[String]) -> String,
) -> Result<Response, Rejection> {
    let flashes = session.take_flashes();
    let html = reply::html(render(session.logged_in, &flashes));
    if flashes.is_empty() {
        Ok(html.into_response())
    } else {
        with_session_cookie(state, html, &session)
    }
}

/// GET /
pub fn show_entries_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.signer.clone()))
        .and_then(|state: Arc<AppState>, session: SessionData| async move {
            let entries = state
                .database
                .with_storage(|storage| async move { storage.list_entries().await })
                .await
                .map_err(reject)?;
            page(&state, session, |logged_in, flashes| {
                render::show_entries(&entries, logged_in, flashes)
            })
        })
}

/// POST /add
pub fn add_entry_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("add")
        .and(warp::post())
        .and(warp::body::content_length_limit(state.config.max_content_length))
        .and(with_state(state.clone()))
        .and(require_login(state.signer.clone()))
        .and(warp::body::form::<NewEntryForm>())
        .and_then(
            |state: Arc<AppState>, mut session: SessionData, form: NewEntryForm| async move {
                let entry = state
                    .database
                    .with_storage(|storage| async move {
                        storage.create_entry(&form.title, &form.text).await
                    })
                    .await
                    .map_err(reject)?;
                debug!("Posted entry {}", entry.resid);
                session.flash("New entry was successfully posted");
                with_session_cookie(&state, redirect("/")?, &session)
            },
        )
}

/// GET /view/:resid
pub fn view_entry_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("view" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.signer.clone()))
        .and_then(
            |raw: String, state: Arc<AppState>, session: SessionData| async move {
                let resid = percent_decode_str(&raw)
                    .decode_utf8()
                    .map_err(|_| {
                        reject(WebError::BadRequest("identifier is not valid UTF-8".into()))
                    })?
                    .into_owned();
                let lookup = resid.clone();
                let found = state
                    .database
                    .with_storage(|storage| async move {
                        let Some(entry) = storage.get_entry(&lookup).await? else {
                            return Ok::<_, StorageError>(None);
                        };
                        let files = storage.list_attachments(&lookup).await?;
                        Ok(Some((entry, files)))
                    })
                    .await
                    .map_err(reject)?;
                let Some((entry, files)) = found else {
                    debug!("No entry {}", resid);
                    return Err(reject(WebError::NotFound));
                };
                page(&state, session, |logged_in, flashes| {
                    render::show_files(&entry, &files, logged_in, flashes)
                })
            },
        )
}

async fn read_part(mut part: Part) -> Result<Vec<u8>, WebError> {
    let mut data = Vec::new();
    while let Some(chunk) = part.data().await {
        let chunk =
            chunk.map_err(|e| WebError::BadRequest(format!("unreadable upload field: {}", e)))?;
        data.put(chunk);
    }
    Ok(data)
}

fn field_text(name: &str, data: Vec<u8>) -> Result<String, WebError> {
    String::from_utf8(data)
        .map_err(|_| WebError::BadRequest(format!("field {} is not valid UTF-8", name)))
}

async fn read_upload_form(mut form: FormData) -> Result<UploadForm, WebError> {
    let mut upload = UploadForm::default();
    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| WebError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        let name = part.name().to_string();
        let file_name = part.filename().map(str::to_string);
        let data = read_part(part).await?;
        match name.as_str() {
            "file" => {
                upload.file_name = file_name;
                upload.data = data;
            }
            "resid" => upload.resid = Some(field_text(&name, data)?),
            "title" => upload.title = Some(field_text(&name, data)?),
            other => debug!("Ignoring upload field {}", other),
        }
    }
    Ok(upload)
}

/// POST /upload
pub fn upload_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let limit = state.config.max_content_length;
    warp::path!("upload")
        .and(warp::post())
        .and(warp::body::content_length_limit(limit))
        .and(with_state(state.clone()))
        .and(require_login(state.signer.clone()))
        .and(warp::multipart::form().max_length(limit))
        .and_then(
            |state: Arc<AppState>, _session: SessionData, form: FormData| async move {
                let upload = read_upload_form(form).await.map_err(reject)?;
                let resid = upload
                    .resid
                    .ok_or_else(|| reject(WebError::BadRequest("missing field resid".into())))?;
                let title = upload
                    .title
                    .ok_or_else(|| reject(WebError::BadRequest("missing field title".into())))?;
                let file_name = upload
                    .file_name
                    .ok_or_else(|| reject(UploadError::MissingFile))?;

                let filename = state
                    .uploads
                    .save(&file_name, &upload.data)
                    .await
                    .map_err(reject)?;
                let attachment = Attachment {
                    resid: resid.clone(),
                    title,
                    filename,
                };
                state
                    .database
                    .with_storage(|storage| async move {
                        storage.add_attachment(&attachment).await
                    })
                    .await
                    .map_err(reject)?;
                Ok::<_, Rejection>(redirect(&render::entry_url(&resid))?.into_response())
            },
        )
}

/// GET /uploads/:filename
///
/// Served straight from the upload directory; anyone who knows a name can
/// fetch the file.
pub fn uploads_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("uploads")
        .and(warp::fs::dir(state.uploads.dir().to_path_buf()))
        .map(|file: warp::fs::File| file.into_response())
}

/// GET /login
pub fn login_form_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("login")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.signer.clone()))
        .and_then(|state: Arc<AppState>, session: SessionData| async move {
            page(&state, session, |logged_in, flashes| {
                render::login(None, logged_in, flashes)
            })
        })
}

/// POST /login
pub fn login_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("login")
        .and(warp::post())
        .and(warp::body::content_length_limit(state.config.max_content_length))
        .and(with_state(state.clone()))
        .and(with_session(state.signer.clone()))
        .and(warp::body::form::<LoginForm>())
        .and_then(
            |state: Arc<AppState>, mut session: SessionData, form: LoginForm| async move {
                let outcome = state.credentials.check(&form.username, &form.password);
                match outcome.error_message() {
                    None => {
                        info!("Admin logged in");
                        session.log_in();
                        session.flash("You were logged in");
                        with_session_cookie(&state, redirect("/")?, &session)
                    }
                    Some(message) => {
                        warn!("Failed login attempt: {}", message);
                        page(&state, session, |logged_in, flashes| {
                            render::login(Some(message), logged_in, flashes)
                        })
                    }
                }
            },
        )
}

/// GET /logout
pub fn logout_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("logout")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(with_session(state.signer.clone()))
        .and_then(|state: Arc<AppState>, mut session: SessionData| async move {
            session.log_out();
            session.flash("You were logged out");
            with_session_cookie(&state, redirect("/")?, &session)
        })
}

/// GET /static/*
pub fn static_route() -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("static")
        .and(warp::path::tail())
        .and(warp::get())
        .and_then(|tail: Tail| async move {
            let Some(asset) = Assets::get(tail.as_str()) else {
                return Err(warp::reject::not_found());
            };
            let mime = mime_guess::from_path(tail.as_str()).first_or_octet_stream();
            Ok(reply::with_header(asset.data.into_owned(), CONTENT_TYPE, mime.to_string())
                .into_response())
        })
}

/// Turns every rejection into a response.
///
/// `Unauthorized` gets an empty body; everything else a short HTML page.
/// Server-side failures are logged and answered with a generic message.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if let Some(e) = err.find::<WebError>() {
        match e {
            WebError::Unauthorized => return Ok(StatusCode::UNAUTHORIZED.into_response()),
            WebError::Storage(_)
            | WebError::Internal(_)
            | WebError::Upload(UploadError::IoError(_)) => {
                error!("Request failed: {}", e);
                (
                    e.status(),
                    "The server encountered an internal error.".to_string(),
                )
            }
            _ => (e.status(), e.to_string()),
        }
    } else if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            "The requested URL was not found on the server.".to_string(),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "The request body is larger than the server accepts.".to_string(),
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "A Content-Length header is required.".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "The method is not allowed for the requested URL.".to_string(),
        )
    } else if err.find::<warp::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
        || err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::MissingHeader>().is_some()
    {
        (
            StatusCode::BAD_REQUEST,
            "Missing or malformed form fields.".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "The server encountered an internal error.".to_string(),
        )
    };
    let page = reply::html(render::error_page(status, &message));
    Ok(reply::with_status(page, status).into_response())
}
