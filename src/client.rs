//! Typed HTTP client for the docvault API.
//! Error bodies are decoded into `ClientError::Api` so callers can branch on the status.

use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::model::ClientRecord;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP {status}: {code}: {detail}")]
    Api { status: u16, code: String, detail: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            ClientError::Url(_) => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(rename = "clientId")]
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResponse {
    pub exists: bool,
    pub path: String,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(base: &str) -> ClientResult<Self> {
        let base = Url::parse(base).map_err(|e| ClientError::Url(format!("{base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Url(format!("{base}: cannot be a base")));
        }
        Ok(Self { base, client: reqwest::Client::new() })
    }

    /// Base URL with the given path segments appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(format!("{}: cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Resolve a server-relative path such as `/uploads/<id>/<file>` under the base,
    /// keeping any base path prefix.
    fn resolve(&self, url_path: &str) -> ClientResult<Url> {
        let segments: Vec<&str> = url_path.split('/').filter(|s| !s.is_empty()).collect();
        self.endpoint(&segments)
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> ClientResult<T> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }
        Err(Self::api_error(status, resp).await)
    }

    async fn api_error(status: StatusCode, resp: Response) -> ClientError {
        let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
        ClientError::Api {
            status: status.as_u16(),
            code: body.get("code").and_then(|v| v.as_str()).unwrap_or("http_error").to_string(),
            detail: body.get("detail").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        }
    }

    pub async fn list_clients(&self, search: Option<&str>) -> ClientResult<Vec<ClientRecord>> {
        let mut req = self.client.get(self.endpoint(&["clients"])?);
        if let Some(text) = search {
            req = req.query(&[("search", text)]);
        }
        Self::decode(req.send().await?).await
    }

    /// Create a client from an arbitrary JSON body; returns the new id.
    pub async fn create_client(&self, body: &serde_json::Value) -> ClientResult<String> {
        let resp = self.client.post(self.endpoint(&["clients"])?).json(body).send().await?;
        let created: CreateResponse = Self::decode(resp).await?;
        Ok(created.client_id)
    }

    /// Upload into a slot; returns the public URL of the stored file.
    pub async fn upload_document(&self, client_id: &str, doc_type: &str, file_name: &str, bytes: Vec<u8>) -> ClientResult<String> {
        let form = Form::new()
            .text("doc_type", doc_type.to_string())
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let resp = self
            .client
            .post(self.endpoint(&["documents", "upload", client_id])?)
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::decode(resp).await?;
        Ok(uploaded.url)
    }

    /// `Ok(None)` when the server reports the file missing.
    pub async fn verify_file(&self, client_id: &str, filename: &str) -> ClientResult<Option<VerifyResponse>> {
        let resp = self.client.get(self.endpoint(&["verify-file", client_id, filename])?).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(resp).await.map(Some)
    }

    pub async fn checkout(&self, client_id: &str, checkout_to: &str, purpose: Option<&str>, expected_return: Option<&str>) -> ClientResult<()> {
        let mut form: Vec<(&str, &str)> = vec![("checkout_to", checkout_to)];
        if let Some(p) = purpose { form.push(("purpose", p)); }
        if let Some(r) = expected_return { form.push(("expected_return", r)); }
        let resp = self
            .client
            .post(self.endpoint(&["clients", "checkout", client_id])?)
            .form(&form)
            .send()
            .await?;
        let _: serde_json::Value = Self::decode(resp).await?;
        Ok(())
    }

    pub async fn checkin(&self, client_id: &str) -> ClientResult<()> {
        let resp = self.client.post(self.endpoint(&["clients", "checkin", client_id])?).send().await?;
        let _: serde_json::Value = Self::decode(resp).await?;
        Ok(())
    }

    /// Fetch a server-relative URL such as an upload URL. `Ok(None)` on 404.
    pub async fn fetch(&self, url_path: &str) -> ClientResult<Option<Vec<u8>>> {
        let resp = self.client.get(self.resolve(url_path)?).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::api_error(status, resp).await);
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_segments() {
        let client = HttpClient::new("http://127.0.0.1:8000").unwrap();
        let url = client.endpoint(&["verify-file", "abc", "my file.pdf"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/verify-file/abc/my%20file.pdf");

        let nested = HttpClient::new("http://localhost/api/").unwrap();
        assert_eq!(nested.endpoint(&["clients"]).unwrap().as_str(), "http://localhost/api/clients");
    }

    #[test]
    fn fetch_paths_stay_under_base_prefix() {
        let nested = HttpClient::new("http://h/api/").unwrap();
        assert_eq!(nested.resolve("/uploads/abc/f.pdf").unwrap().as_str(), "http://h/api/uploads/abc/f.pdf");

        let root = HttpClient::new("http://h").unwrap();
        assert_eq!(root.resolve("/uploads/abc/f.pdf").unwrap().as_str(), "http://h/uploads/abc/f.pdf");
        assert_eq!(root.resolve("uploads/abc/f.pdf").unwrap().as_str(), "http://h/uploads/abc/f.pdf");
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(HttpClient::new("not a url").is_err());
        assert!(HttpClient::new("mailto:someone@example.com").is_err());
    }
}
