//! HTTP client for the remote email-analysis service.
//!
//! Every call is a single POST to `{base_url}/{endpoint}`. Only HTTP 200 counts
//! as success; nothing is retried.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::form::AnalysisRequest;
use crate::render::{Download, DownloadKind};

/// Default analysis service endpoint
pub const DEFAULT_API_URL: &str = "https://letsdoitagain.onrender.com";

/// Extensions offered by the attachment upload widget
pub const ATTACHMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "eml", "msg"];

/// Extensions offered by the metadata upload widget
pub const EMAIL_FILE_EXTENSIONS: &[&str] = &["eml", "msg"];

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service answered with a non-200 status
    #[error("Error: {message}")]
    Remote { status: u16, message: String },

    /// The request never produced a usable response
    #[error("Error during request: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Analyze,
    AnalyzeAttachment,
    ExtractMetadata,
    DownloadJson,
    DownloadPdf,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Analyze => "analyze",
            Endpoint::AnalyzeAttachment => "analyze_attachment",
            Endpoint::ExtractMetadata => "extract_metadata",
            Endpoint::DownloadJson => "download_json",
            Endpoint::DownloadPdf => "download_pdf",
        }
    }

    fn for_download(kind: DownloadKind) -> Self {
        match kind {
            DownloadKind::Json => Endpoint::DownloadJson,
            DownloadKind::Pdf => Endpoint::DownloadPdf,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A file picked by the user, ready to be sent as a multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(Path::new(&file_name)).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }
}

/// Guess a MIME type from the file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("eml") => "message/rfc822",
        Some("msg") => "application/vnd.ms-outlook",
        _ => "application/octet-stream",
    }
}

/// True if `path` has one of the `allowed` extensions (case-insensitive)
pub fn has_allowed_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Pull the service's error message out of a failed response body.
///
/// Only a JSON object may omit `error`; any other body is undecodable and
/// reported as a transport failure.
fn error_message(body: &[u8]) -> Result<String, ServiceError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(match map.get("error") {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Null) | None => UNKNOWN_ERROR.to_string(),
            Some(other) => other.to_string(),
        }),
        Ok(other) => Err(ServiceError::Transport(format!(
            "expected a JSON object in the error response, got {}",
            other
        ))),
        Err(e) => Err(ServiceError::Transport(format!("error decoding response body: {}", e))),
    }
}

/// Client for the analysis service
#[derive(Clone)]
pub struct AnalysisClient {
    base_url: String,
    http: reqwest::Client,
}

impl AnalysisClient {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Self::with_timeout(base_url, None)
    }

    /// `None` keeps reqwest's default (no overall timeout)
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, ServiceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }

    /// Run the selected analyses on the email text
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Map<String, Value>, ServiceError> {
        let response = self.post_json(Endpoint::Analyze, request).await?;
        match response.json::<Value>().await? {
            Value::Object(map) => Ok(map),
            other => Err(ServiceError::Transport(format!(
                "expected a JSON object from {}, got {}",
                Endpoint::Analyze,
                other
            ))),
        }
    }

    /// Upload an attachment and return its `attachment_analysis` payload
    pub async fn analyze_attachment(&self, file: &UploadFile) -> Result<Value, ServiceError> {
        self.upload(Endpoint::AnalyzeAttachment, "file", file, "attachment_analysis")
            .await
    }

    /// Upload an email file and return its `email_metadata` payload
    pub async fn extract_metadata(&self, file: &UploadFile) -> Result<Value, ServiceError> {
        self.upload(Endpoint::ExtractMetadata, "email_file", file, "email_metadata")
            .await
    }

    /// Ask the service to render the analysis as a downloadable file
    pub async fn download(
        &self,
        kind: DownloadKind,
        request: &AnalysisRequest,
    ) -> Result<Download, ServiceError> {
        let response = self.post_json(Endpoint::for_download(kind), request).await?;
        let bytes = response.bytes().await?;
        debug!("Received {} bytes for {}", bytes.len(), kind.file_name());
        Ok(Download::new(kind, bytes.to_vec()))
    }

    async fn post_json(
        &self,
        endpoint: Endpoint,
        request: &AnalysisRequest,
    ) -> Result<reqwest::Response, ServiceError> {
        debug!(
            "POST {} ({} chars, {} features, scenario {})",
            endpoint,
            request.email_content.chars().count(),
            request.features.enabled_count(),
            request.scenario
        );
        let builder = self.http.post(self.url(endpoint)).json(request);
        self.send(endpoint, builder).await
    }

    async fn upload(
        &self,
        endpoint: Endpoint,
        field: &'static str,
        file: &UploadFile,
        member: &str,
    ) -> Result<Value, ServiceError> {
        debug!("POST {} with {} ({} bytes)", endpoint, file.file_name, file.bytes.len());

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        let form = Form::new().part(field, part);

        let builder = self.http.post(self.url(endpoint)).multipart(form);
        let response = self.send(endpoint, builder).await?;
        match response.json::<Value>().await? {
            Value::Object(mut map) => Ok(map.remove(member).unwrap_or(Value::Null)),
            other => Err(ServiceError::Transport(format!(
                "expected a JSON object from {}, got {}",
                endpoint, other
            ))),
        }
    }

    async fn send(
        &self,
        endpoint: Endpoint,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ServiceError> {
        let response = builder.send().await.map_err(|e| {
            warn!("Request to {} failed: {}", endpoint, e);
            ServiceError::from(e)
        })?;

        let status = response.status();
        debug!("{} responded with {}", endpoint, status);

        if status != StatusCode::OK {
            let body = response.bytes().await?;
            let message = error_message(&body).map_err(|e| {
                warn!("{} returned {} with an unreadable body: {}", endpoint, status, e);
                e
            })?;
            warn!("{} returned {}: {}", endpoint, status, message);
            return Err(ServiceError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! Single-shot HTTP server that records the request it receives.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    #[derive(Debug)]
    pub struct CapturedRequest {
        pub method: String,
        pub path: String,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl CapturedRequest {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).expect("request body is JSON")
        }

        pub fn body_text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    /// Serve one response, returning the base URL and the captured request
    pub async fn serve_once(
        status: u16,
        content_type: &str,
        body: &[u8],
    ) -> (String, JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let content_type = content_type.to_string();
        let body = body.to_vec();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;

            let head = format!(
                "HTTP/1.1 {} {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                status,
                if status == 200 { "OK" } else { "Error" },
                content_type,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            let _ = socket.shutdown().await;

            request
        });

        (format!("http://{}", addr), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> CapturedRequest {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers were complete");
            buf.extend_from_slice(&chunk[..n]);
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next().unwrap_or_default().split_whitespace();
        let method = request_line.next().unwrap_or_default().to_string();
        let path = request_line.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .and_then(|(_, v)| v.parse::<usize>().ok());
        let chunked = headers
            .iter()
            .any(|(k, v)| k == "transfer-encoding" && v.eq_ignore_ascii_case("chunked"));

        let mut body = buf[header_end..].to_vec();
        if let Some(len) = content_length {
            while body.len() < len {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..n]);
            }
            body.truncate(len);
        } else if chunked {
            while find(&body, b"0\r\n\r\n").is_none() {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..n]);
            }
            body = dechunk(&body);
        }

        CapturedRequest {
            method,
            path,
            headers,
            body,
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn dechunk(mut raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(line_end) = find(raw, b"\r\n") {
            let size_str = String::from_utf8_lossy(&raw[..line_end]);
            let size = usize::from_str_radix(size_str.trim(), 16).unwrap_or(0);
            if size == 0 {
                break;
            }
            let start = line_end + 2;
            out.extend_from_slice(&raw[start..start + size]);
            raw = &raw[start + size + 2..];
        }
        out
    }
}
