use super::{RemoteError, RemoteFile, RemoteFiles, TranslationRecord, TranslationService};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header::AUTHORIZATION, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://paratranz.cn/api";

/// Appended to upload names so the store parses the payload as a record array.
const RAW_FORMAT_EXTENSION: &str = ".json";

/// Upload status reported when a document has nothing to translate.
const STATUS_EMPTY: &str = "empty";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    file: Option<RemoteFile>,
    #[serde(default)]
    status: Option<String>,
}

/// ParaTranz REST client for a single project.
#[derive(Debug, Clone)]
pub struct ParatranzClient {
    client: reqwest::Client,
    api_url: String,
    project_id: i64,
    token: String,
}

impl ParatranzClient {
    pub fn new(api_url: &str, project_id: i64, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            project_id,
            token: token.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.paratranz_api_url, config.paratranz_project_id, &config.paratranz_token)
    }

    fn files_url(&self) -> String {
        format!("{}/projects/{}/files", self.api_url, self.project_id)
    }

    fn file_url(&self, id: i64) -> String {
        format!("{}/{}", self.files_url(), id)
    }

    fn translation_url(&self, id: i64) -> String {
        format!("{}/translation", self.file_url(id))
    }

    fn upload_name(name: &str, raw_format: bool) -> String {
        if raw_format {
            format!("{}{}", name, RAW_FORMAT_EXTENSION)
        } else {
            name.to_string()
        }
    }

    fn file_part(data: &[u8], name: String) -> Part {
        Part::bytes(data.to_vec()).file_name(name)
    }

    /// Map the response status to an error and return the body on success.
    async fn read_body(response: Response, operation: &str) -> Result<String, RemoteError> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            debug!("{}: rate limited", operation);
            return Err(RemoteError::RateLimited);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read body: {}>", e));

        if !status.is_success() {
            warn!("{} failed ({}): {}", operation, status, body);
            return Err(RemoteError::Service {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl TranslationService for ParatranzClient {
    async fn list_files(&self) -> Result<RemoteFiles, RemoteError> {
        let response = self
            .client
            .get(self.files_url())
            .header(AUTHORIZATION, &self.token)
            .send()
            .await?;

        let body = Self::read_body(response, "List files").await?;
        let files: Vec<RemoteFile> = serde_json::from_str(&body)?;

        Ok(files.into_iter().map(|f| (f.name.clone(), f)).collect())
    }

    async fn upload_file(&self, data: &[u8], folder: &str, name: &str) -> Result<RemoteFile, RemoteError> {
        let mut form = Form::new().part("file", Self::file_part(data, name.to_string()));
        if folder != "." {
            form = form.text("path", folder.to_string());
        }

        let response = self
            .client
            .post(self.files_url())
            .header(AUTHORIZATION, &self.token)
            .multipart(form)
            .send()
            .await?;

        let body = Self::read_body(response, "Upload file").await?;
        let upload: UploadResponse = serde_json::from_str(&body)?;

        if upload.status.as_deref() == Some(STATUS_EMPTY) {
            return Err(RemoteError::EmptyDocument);
        }

        upload.file.ok_or(RemoteError::Service {
            status: StatusCode::OK.as_u16(),
            body,
        })
    }

    async fn update_file(
        &self,
        id: i64,
        data: &[u8],
        _folder: &str,
        name: &str,
        raw_format: bool,
    ) -> Result<(), RemoteError> {
        let form = Form::new().part("file", Self::file_part(data, Self::upload_name(name, raw_format)));

        let response = self
            .client
            .post(self.file_url(id))
            .header(AUTHORIZATION, &self.token)
            .multipart(form)
            .send()
            .await?;

        let body = Self::read_body(response, "Update file").await?;
        let status = serde_json::from_str::<UploadResponse>(&body)
            .ok()
            .and_then(|r| r.status);
        if status.as_deref() == Some(STATUS_EMPTY) {
            return Err(RemoteError::EmptyDocument);
        }

        Ok(())
    }

    async fn delete_file(&self, id: i64) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(self.file_url(id))
            .header(AUTHORIZATION, &self.token)
            .send()
            .await?;

        Self::read_body(response, "Delete file").await?;
        Ok(())
    }

    async fn get_translations(&self, id: i64) -> Result<Vec<TranslationRecord>, RemoteError> {
        let response = self
            .client
            .get(self.translation_url(id))
            .header(AUTHORIZATION, &self.token)
            .send()
            .await?;

        let body = Self::read_body(response, "Get translations").await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn replace_translations(
        &self,
        id: i64,
        data: &[u8],
        name: &str,
        raw_format: bool,
        force: bool,
    ) -> Result<(), RemoteError> {
        let mut form = Form::new().part("file", Self::file_part(data, Self::upload_name(name, raw_format)));
        if force {
            form = form.text("force", "true");
        }

        let response = self
            .client
            .post(self.translation_url(id))
            .header(AUTHORIZATION, &self.token)
            .multipart(form)
            .send()
            .await?;

        Self::read_body(response, "Replace translations").await?;
        Ok(())
    }
}
