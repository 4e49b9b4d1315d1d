//! Production [`DriveApi`] over blocking `reqwest`, plus the loopback
//! OAuth consent flow.

use super::drive::{ApiResult, AuthorizationGrant, DriveApi, DriveApiError, DriveFile, GrantProvider, TokenGrant};
use crate::error::{Result, SyncError};
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

const OAUTH_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.appdata";
const FILE_FIELDS: &str = "id,name,modifiedTime,version";

pub struct ReqwestDriveApi {
    client: Client,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

impl ReqwestDriveApi {
    pub fn new(client_id: &str, client_secret: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
        })
    }

    fn token_request(&self, params: &[(&str, &str)]) -> ApiResult<TokenGrant> {
        self.check_configured()?;
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(params);
        let resp = self
            .client
            .post(OAUTH_TOKEN_URL)
            .form(&form)
            .send()
            .map_err(transport)?;
        json(checked(resp)?)
    }
}

fn transport(err: reqwest::Error) -> DriveApiError {
    DriveApiError::Transport(Box::new(err))
}

fn checked(resp: Response) -> ApiResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(DriveApiError::Unauthorized);
    }
    let body = resp.text().unwrap_or_default();
    Err(DriveApiError::Http {
        status: status.as_u16(),
        body: truncate(&body, 300),
    })
}

fn json<T: for<'de> Deserialize<'de>>(resp: Response) -> ApiResult<T> {
    resp.json()
        .map_err(|e| DriveApiError::Decode(e.to_string()))
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Body for a `multipart/related` upload: JSON metadata, then the content.
fn multipart_body(boundary: &str, metadata: &str, content: &str) -> String {
    format!(
        "--{boundary}\r\n\
         Content-Type: application/json; charset=UTF-8\r\n\r\n\
         {metadata}\r\n\
         --{boundary}\r\n\
         Content-Type: application/json\r\n\r\n\
         {content}\r\n\
         --{boundary}--\r\n"
    )
}

impl DriveApi for ReqwestDriveApi {
    fn check_configured(&self) -> ApiResult<()> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            Err(DriveApiError::NotConfigured)
        } else {
            Ok(())
        }
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ];
        match Url::parse_with_params(OAUTH_AUTH_URL, params) {
            Ok(url) => url.to_string(),
            Err(_) => OAUTH_AUTH_URL.to_string(),
        }
    }

    fn exchange_code(&self, code: &str, redirect_uri: &str) -> ApiResult<TokenGrant> {
        self.token_request(&[
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
    }

    fn refresh_token(&self, refresh_token: &str) -> ApiResult<TokenGrant> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
    }

    fn list_files(&self, access_token: &str, name: &str) -> ApiResult<Vec<DriveFile>> {
        let query = format!("name = '{}' and trashed = false", name.replace('\'', "\\'"));
        let fields = format!("files({FILE_FIELDS})");
        let resp = self
            .client
            .get(DRIVE_FILES_URL)
            .bearer_auth(access_token)
            .query(&[
                ("spaces", "appDataFolder"),
                ("q", query.as_str()),
                ("fields", fields.as_str()),
            ])
            .send()
            .map_err(transport)?;
        let list: FileList = json(checked(resp)?)?;
        Ok(list.files)
    }

    fn download(&self, access_token: &str, file_id: &str) -> ApiResult<String> {
        let resp = self
            .client
            .get(format!("{DRIVE_FILES_URL}/{file_id}"))
            .bearer_auth(access_token)
            .query(&[("alt", "media")])
            .send()
            .map_err(transport)?;
        checked(resp)?.text().map_err(transport)
    }

    fn create_file(&self, access_token: &str, name: &str, content: &str) -> ApiResult<DriveFile> {
        let metadata = serde_json::json!({
            "name": name,
            "parents": ["appDataFolder"],
            "mimeType": "application/json",
        });
        let boundary = format!("versesync-{}", Uuid::new_v4().simple());
        let body = multipart_body(&boundary, &metadata.to_string(), content);
        let resp = self
            .client
            .post(DRIVE_UPLOAD_URL)
            .bearer_auth(access_token)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .map_err(transport)?;
        json(checked(resp)?)
    }

    fn update_file(
        &self,
        access_token: &str,
        file_id: &str,
        content: &str,
    ) -> ApiResult<DriveFile> {
        let resp = self
            .client
            .patch(format!("{DRIVE_UPLOAD_URL}/{file_id}"))
            .bearer_auth(access_token)
            .query(&[("uploadType", "media"), ("fields", FILE_FIELDS)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(content.to_string())
            .send()
            .map_err(transport)?;
        json(checked(resp)?)
    }
}

/// Shows the consent URL to the user: print it, open a browser, or both.
pub trait ConsentPresenter {
    fn present(&mut self, auth_url: &str);
}

impl<F: FnMut(&str)> ConsentPresenter for F {
    fn present(&mut self, auth_url: &str) {
        self(auth_url)
    }
}

/// Receives the OAuth redirect on an ephemeral `127.0.0.1` port.
pub struct LoopbackGrant {
    presenter: Box<dyn ConsentPresenter>,
    timeout: Duration,
}

impl LoopbackGrant {
    pub fn new(presenter: Box<dyn ConsentPresenter>, timeout: Duration) -> Self {
        Self { presenter, timeout }
    }

    fn wait_for_connection(&self, listener: &TcpListener, deadline: Instant) -> Result<TcpStream> {
        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    stream.set_nonblocking(false)?;
                    return Ok(stream);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(SyncError::backend(
                            super::drive::DRIVE_ADAPTER,
                            "timed out waiting for authorization",
                        ));
                    }
                    thread::sleep(Duration::from_millis(200));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Outcome of one request on the loopback listener.
#[derive(Debug, PartialEq, Eq)]
enum Redirect {
    Code(String),
    Denied,
    Invalid(String),
    /// Not our redirect: favicon fetches, stale tabs from an earlier attempt.
    Unrelated,
}

fn parse_redirect(request_line: &str, expected_state: &str) -> Redirect {
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{target}")) else {
        return Redirect::Invalid("malformed redirect".into());
    };
    if url.path() != "/" {
        return Redirect::Unrelated;
    }
    let param = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = param("error") {
        return if error == "access_denied" {
            Redirect::Denied
        } else {
            Redirect::Invalid(format!("authorization failed: {error}"))
        };
    }
    if param("state").as_deref() != Some(expected_state) {
        return Redirect::Unrelated;
    }
    match param("code") {
        Some(code) => Redirect::Code(code),
        None => Redirect::Invalid("missing authorization code".into()),
    }
}

/// First line of the request, or `None` for a connection that sent nothing.
fn read_request_line(stream: &mut TcpStream) -> Option<String> {
    stream.set_read_timeout(Some(Duration::from_secs(2))).ok()?;
    let mut buf = [0u8; 8192];
    let read = stream.read(&mut buf).ok()?;
    let request = String::from_utf8_lossy(&buf[..read]);
    request.lines().next().map(str::to_string)
}

fn respond(stream: &mut TcpStream, message: &str) {
    reply(stream, "200 OK", message);
}

fn reply(stream: &mut TcpStream, status: &str, message: &str) {
    let body = format!("<html><body><p>{message}</p></body></html>");
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()) {
        debug!(error = %e, "could not answer oauth redirect");
    }
}

impl GrantProvider for LoopbackGrant {
    fn request_grant(
        &mut self,
        authorize: &dyn Fn(&str, &str) -> String,
    ) -> Result<Option<AuthorizationGrant>> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let redirect_uri = format!("http://{}", listener.local_addr()?);
        let state = Uuid::new_v4().simple().to_string();

        self.presenter.present(&authorize(&redirect_uri, &state));

        // Browsers may preconnect or fetch a favicon before the redirect lands.
        listener.set_nonblocking(true)?;
        let deadline = Instant::now() + self.timeout;
        loop {
            let mut stream = self.wait_for_connection(&listener, deadline)?;
            let Some(request_line) = read_request_line(&mut stream) else {
                debug!("oauth listener connection closed without a request");
                continue;
            };

            match parse_redirect(&request_line, &state) {
                Redirect::Code(code) => {
                    respond(&mut stream, "Authorization complete. You can close this window.");
                    return Ok(Some(AuthorizationGrant { code, redirect_uri }));
                }
                Redirect::Denied => {
                    respond(&mut stream, "Authorization was declined.");
                    return Ok(None);
                }
                Redirect::Invalid(reason) => {
                    warn!(%reason, "rejected oauth redirect");
                    respond(&mut stream, "Authorization failed. Please retry.");
                    return Err(SyncError::backend(super::drive::DRIVE_ADAPTER, &reason));
                }
                Redirect::Unrelated => {
                    debug!(request = %request_line, "ignoring request on oauth listener");
                    reply(&mut stream, "404 Not Found", "Not found.");
                }
            }
        }
    }
}
