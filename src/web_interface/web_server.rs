use std::convert::Infallible;
use std::sync::Arc;

use log::{info, warn};
use warp::{Filter, Reply};

use super::routes::*;
use super::types::AppState;
use crate::configuration::Config;
use crate::error_handling::types::WebError;

/// Every route of the blog, with error recovery and access logging.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    show_entries_route(state.clone())
        .or(add_entry_route(state.clone()))
        .or(view_entry_route(state.clone()))
        .or(upload_route(state.clone()))
        .or(uploads_route(state.clone()))
        .or(login_form_route(state.clone()))
        .or(login_route(state.clone()))
        .or(logout_route(state))
        .or(static_route())
        .recover(handle_rejection)
        .with(warp::log("microblog::access"))
}

/// HTTP server for the blog
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            state: Arc::new(AppState::new(config)),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Serves until the process is stopped.
    pub async fn start(&self) -> Result<(), WebError> {
        self.state.uploads.ensure_dir()?;
        if !self.state.database.path().exists() {
            warn!(
                "Database {} does not exist, run `microblog init-db` first",
                self.state.database.path().display()
            );
        }
        let addr = self
            .state
            .config
            .socket_addr()
            .map_err(|e| WebError::Internal(e.to_string()))?;

        info!("Listening on http://{}", addr);
        warp::serve(routes(self.state.clone())).run(addr).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::path::Path;
    use tempfile::TempDir;
    use warp::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
    use warp::http::{Response, StatusCode};

    use crate::storage::Storage;

    const BOUNDARY: &str = "----microblog-test-boundary";

    struct TestApp {
        _dir: TempDir,
        state: Arc<AppState>,
    }

    impl TestApp {
        async fn new() -> Self {
            Self::with_config(|_| {}).await
        }

        async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
            let dir = TempDir::new().unwrap();
            let mut config = Config {
                database: dir.path().join("microblog.db"),
                upload_folder: dir.path().join("files"),
                secret_key: "test secret".into(),
                ..Config::default()
            };
            tweak(&mut config);
            let server = WebServer::new(Arc::new(config));
            let state = server.state();
            state.database.init_schema().await.unwrap();
            state.uploads.ensure_dir().unwrap();
            Self { _dir: dir, state }
        }

        fn upload_dir(&self) -> &Path {
            self.state.uploads.dir()
        }

        async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Bytes> {
            let mut request = warp::test::request().method("GET").path(path);
            if let Some(cookie) = cookie {
                request = request.header(COOKIE, cookie);
            }
            request.reply(&routes(self.state.clone())).await
        }

        async fn post_form(&self, path: &str, body: &str, cookie: Option<&str>) -> Response<Bytes> {
            let mut request = warp::test::request()
                .method("POST")
                .path(path)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body.to_string());
            if let Some(cookie) = cookie {
                request = request.header(COOKIE, cookie);
            }
            request.reply(&routes(self.state.clone())).await
        }

        async fn upload(
            &self,
            resid: &str,
            title: &str,
            filename: &str,
            data: &[u8],
            cookie: Option<&str>,
        ) -> Response<Bytes> {
            let body = multipart_body(resid, title, filename, data);
            let mut request = warp::test::request()
                .method("POST")
                .path("/upload")
                .header(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(body);
            if let Some(cookie) = cookie {
                request = request.header(COOKIE, cookie);
            }
            request.reply(&routes(self.state.clone())).await
        }

        /// Logs in and returns the `Cookie` header value for later requests.
        async fn login(&self) -> String {
            let res = self
                .post_form("/login", "username=admin&password=default", None)
                .await;
            assert_eq!(res.status(), StatusCode::FOUND);
            session_cookie(&res).expect("login sets a session cookie")
        }

        async fn entry_count(&self) -> usize {
            self.state
                .database
                .with_storage(|storage| async move { storage.list_entries().await })
                .await
                .unwrap()
                .len()
        }

        async fn attachment_count(&self, resid: &str) -> usize {
            let resid = resid.to_string();
            self.state
                .database
                .with_storage(|storage| async move { storage.list_attachments(&resid).await })
                .await
                .unwrap()
                .len()
        }
    }

    fn multipart_body(resid: &str, title: &str, filename: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in [("resid", resid), ("title", title)] {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    /// `name=value` part of the Set-Cookie header, if any.
    fn session_cookie(res: &Response<Bytes>) -> Option<String> {
        let header = res.headers().get(SET_COOKIE)?.to_str().ok()?;
        header.split(';').next().map(str::to_string)
    }

    fn body_text(res: &Response<Bytes>) -> String {
        String::from_utf8_lossy(res.body()).into_owned()
    }

    fn location(res: &Response<Bytes>) -> &str {
        res.headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let app = TestApp::new().await;
        let res = app.get("/", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(&res).contains("No entries here so far"));
        assert!(!body_text(&res).contains(r#"action="/add""#));
    }

    #[tokio::test]
    async fn test_add_entry_requires_login() {
        let app = TestApp::new().await;
        let res = app.post_form("/add", "title=Hello&text=World", None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.body().is_empty());
        assert_eq!(app.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_forged_cookie_is_not_logged_in() {
        let app = TestApp::new().await;
        let res = app
            .post_form(
                "/add",
                "title=Hello&text=World",
                Some("session=eyJsb2dnZWRfaW4iOnRydWV9.00"),
            )
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_listing_is_reverse_creation_order() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        for i in 0..3 {
            let res = app
                .post_form("/add", &format!("title=post{}&text=body{}", i, i), Some(&cookie))
                .await;
            assert_eq!(res.status(), StatusCode::FOUND);
            assert_eq!(location(&res), "/");
        }
        assert_eq!(app.entry_count().await, 3);

        let html = body_text(&app.get("/", Some(&cookie)).await);
        let p0 = html.find("post0").unwrap();
        let p1 = html.find("post1").unwrap();
        let p2 = html.find("post2").unwrap();
        assert!(p2 < p1 && p1 < p0);
    }

    #[tokio::test]
    async fn test_flash_shown_once_after_posting() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        let res = app
            .post_form("/add", "title=Hello&text=World", Some(&cookie))
            .await;
        let cookie = session_cookie(&res).unwrap();

        let res = app.get("/", Some(&cookie)).await;
        assert!(body_text(&res).contains("New entry was successfully posted"));
        let cookie = session_cookie(&res).unwrap();

        let res = app.get("/", Some(&cookie)).await;
        assert!(!body_text(&res).contains("New entry was successfully posted"));
        assert!(body_text(&res).contains(r#"action="/add""#));
    }

    #[tokio::test]
    async fn test_entry_roundtrip_through_view() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        app.post_form("/add", "title=Hello&text=World", Some(&cookie))
            .await;

        let resid = app
            .state
            .database
            .with_storage(|storage| async move { storage.list_entries().await })
            .await
            .unwrap()
            .remove(0)
            .resid;
        let res = app.get(&format!("/view/{}", resid), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(&res);
        assert!(html.contains("<h2>Hello</h2>"));
        assert!(html.contains("World"));
        assert!(!html.contains(r#"action="/upload""#));
    }

    #[tokio::test]
    async fn test_view_unknown_entry_is_not_found() {
        let app = TestApp::new().await;
        let res = app.get("/view/doesnotexist", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app.get("/view/%27%20OR%20%271%27%3D%271", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_wrong_then_right_password() {
        let app = TestApp::new().await;

        let res = app
            .post_form("/login", "username=admin&password=wrong", None)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(&res).contains("Invalid password"));
        assert!(session_cookie(&res).is_none());

        let res = app
            .post_form("/login", "username=root&password=default", None)
            .await;
        assert!(body_text(&res).contains("Invalid username"));
        assert!(session_cookie(&res).is_none());

        let cookie = app.login().await;
        let decoded = app
            .state
            .signer
            .decode(cookie.trim_start_matches("session="))
            .unwrap();
        assert!(decoded.logged_in);
        assert_eq!(decoded.flashes, vec!["You were logged in"]);
    }

    #[tokio::test]
    async fn test_logout_clears_login() {
        let app = TestApp::new().await;
        let cookie = app.login().await;

        let res = app.get("/logout", Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/");
        let cookie = session_cookie(&res).unwrap();
        let decoded = app
            .state
            .signer
            .decode(cookie.trim_start_matches("session="))
            .unwrap();
        assert!(!decoded.logged_in);

        let res = app.post_form("/add", "title=a&text=b", Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        // Logging out without a session is harmless.
        let res = app.get("/logout", None).await;
        assert_eq!(res.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_login_form_renders() {
        let app = TestApp::new().await;
        let res = app.get("/login", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(&res).contains(r#"action="/login""#));
    }

    #[tokio::test]
    async fn test_upload_requires_login() {
        let app = TestApp::new().await;
        let res = app
            .upload("abc", "Notes", "notes.txt", b"hello", None)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.attachment_count("abc").await, 0);
        assert!(!app.upload_dir().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_and_download_roundtrip() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        let data = b"line one\nline two\n\x00\xff";

        let res = app
            .upload("abc", "Notes", "notes.txt", data, Some(&cookie))
            .await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(location(&res), "/view/abc");
        assert_eq!(app.attachment_count("abc").await, 1);

        let res = app.get("/uploads/notes.txt", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), data);
        assert_eq!(res.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[tokio::test]
    async fn test_upload_disallowed_extension_is_rejected() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        let res = app
            .upload("abc", "Binary", "notes.exe", b"MZ", Some(&cookie))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(&res).contains("File type not allowed"));
        assert_eq!(app.attachment_count("abc").await, 0);
        assert!(!app.upload_dir().join("notes.exe").exists());
    }

    #[tokio::test]
    async fn test_upload_sanitizes_filename() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        let res = app
            .upload("abc", "Sneaky", "../../evil name.txt", b"x", Some(&cookie))
            .await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert!(app.upload_dir().join("evil_name.txt").exists());

        let res = app.get("/uploads/evil_name.txt", None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_view_lists_attachments_for_unchecked_resid() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        app.post_form("/add", "title=Hello&text=World", Some(&cookie))
            .await;
        let resid = app
            .state
            .database
            .with_storage(|storage| async move { storage.list_entries().await })
            .await
            .unwrap()
            .remove(0)
            .resid;

        app.upload(&resid, "First", "a.txt", b"1", Some(&cookie)).await;
        app.upload(&resid, "Second", "b.pdf", b"2", Some(&cookie)).await;
        // No entry "orphan" exists; the attachment is stored anyway.
        let res = app
            .upload("orphan", "Lost", "c.txt", b"3", Some(&cookie))
            .await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(app.attachment_count("orphan").await, 1);

        let html = body_text(&app.get(&format!("/view/{}", resid), Some(&cookie)).await);
        let first = html.find("a.txt").unwrap();
        let second = html.find("b.pdf").unwrap();
        assert!(second < first);
        assert!(!html.contains("c.txt"));
        assert!(html.contains(r#"action="/upload""#));
    }

    #[tokio::test]
    async fn test_download_missing_or_traversal_is_not_found() {
        let app = TestApp::new().await;
        let res = app.get("/uploads/missing.txt", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app.get("/uploads/..%2Fmicroblog.db", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let app = TestApp::with_config(|config| config.max_content_length = 64).await;
        let cookie = app.login().await;
        let text = "x".repeat(200);
        let res = app
            .post_form("/add", &format!("title=big&text={}", text), Some(&cookie))
            .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(app.entry_count().await, 0);

        let res = app
            .upload("abc", "Big", "big.txt", text.as_bytes(), Some(&cookie))
            .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!app.upload_dir().join("big.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_form_field_is_bad_request() {
        let app = TestApp::new().await;
        let cookie = app.login().await;
        let res = app.post_form("/add", "title=only", Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_oversized_login_is_rejected() {
        let app = TestApp::with_config(|config| config.max_content_length = 64).await;
        let password = "x".repeat(200);
        let res = app
            .post_form("/login", &format!("username=admin&password={}", password), None)
            .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(session_cookie(&res).is_none());
    }

    #[tokio::test]
    async fn test_login_without_fields_is_bad_request() {
        let app = TestApp::new().await;
        let res = app.post_form("/login", "username=admin", None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(session_cookie(&res).is_none());
    }

    #[tokio::test]
    async fn test_upload_without_multipart_body_is_bad_request() {
        let app = TestApp::new().await;
        let cookie = app.login().await;

        let res = app
            .post_form("/upload", "resid=abc&title=Notes", Some(&cookie))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(&res).contains("Missing or malformed form fields"));

        let res = warp::test::request()
            .method("POST")
            .path("/upload")
            .header(COOKIE, cookie.as_str())
            .body("resid=abc&title=Notes")
            .reply(&routes(app.state.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        assert_eq!(app.attachment_count("abc").await, 0);
    }

    #[tokio::test]
    async fn test_uninitialised_database_is_server_error() {
        let app = TestApp::new().await;
        std::fs::remove_file(app.state.database.path()).unwrap();
        let res = app.get("/", None).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_route_and_wrong_method() {
        let app = TestApp::new().await;
        assert_eq!(app.get("/nope", None).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            app.get("/add", None).await.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn test_stylesheet_is_served() {
        let app = TestApp::new().await;
        let res = app.get("/static/style.css", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get(CONTENT_TYPE).unwrap(), "text/css");
        assert_eq!(
            app.get("/static/missing.css", None).await.status(),
            StatusCode::NOT_FOUND
        );
    }
}
