use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::NocoDbConfig;
use crate::error::{AppError, Result};

/// Maximum number of rows fetched by a listing; NocoDB defaults to 25.
pub const LIST_LIMIT: u32 = 1000;

/// Largest stored file the image proxy relays.
pub const MAX_FETCH_BYTES: usize = 100 * 1024 * 1024;

/// Page wrapper returned by the records API.
#[derive(Debug, Deserialize)]
pub struct RecordList<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

/// One stored attachment as returned by the storage API or an attachment column.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing)]
    pub signed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Attachment {
    /// Attachment entry pointing at an already uploaded URL.
    pub fn from_url(url: &str) -> Self {
        let title = url.rsplit('/').next().filter(|t| !t.is_empty()).unwrap_or(url);
        Self {
            url: Some(url.to_string()),
            signed_url: None,
            path: None,
            title: Some(title.to_string()),
            mimetype: Some("image/jpeg".to_string()),
            size: Some(0),
        }
    }

    /// Best link to the file: signed URL first, then URL, then relative path.
    pub fn best_link(&self) -> Option<&str> {
        self.signed_url
            .as_deref()
            .or(self.url.as_deref())
            .or(self.path.as_deref())
            .filter(|link| !link.is_empty())
    }
}

/// REST client for one NocoDB instance.
#[derive(Clone)]
pub struct NocoDb {
    client: Client,
    config: Arc<NocoDbConfig>,
    ready: Arc<OnceCell<()>>,
}

impl NocoDb {
    /// Creates a new client. No connection is opened until the first call.
    pub fn new(config: NocoDbConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("mapa360/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
            ready: Arc::new(OnceCell::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn sites_table(&self) -> &str {
        &self.config.sites_table_id
    }

    pub fn users_table(&self) -> &str {
        &self.config.users_table_id
    }

    /// Turns a relative attachment path into an absolute URL on this instance.
    pub fn absolute_url(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url,
                link.trim_start_matches('/')
            )
        }
    }

    /// Whether `url` points inside this NocoDB instance.
    pub fn owns_url(&self, url: &str) -> bool {
        !self.config.base_url.is_empty()
            && url
                .strip_prefix(self.config.base_url.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Checks once that the sites table answers.
    ///
    /// Concurrent callers share the same probe; a failed probe is retried by
    /// the next caller.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                let url = self.records_url(self.sites_table())?;
                let response = self
                    .request(Method::GET, url)
                    .query(&[("limit", "1")])
                    .send()
                    .await?;
                check_status(response, "probe").await?;
                tracing::info!("✅ NocoDB reachable at {}", self.config.base_url);
                Ok::<(), AppError>(())
            })
            .await
            .map(|_| ())
    }

    /// Lists rows of `table`, optionally filtered with a NocoDB `where` clause.
    pub async fn list_records<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: Option<&str>,
    ) -> Result<Vec<T>> {
        let url = self.records_url(table)?;
        let limit = LIST_LIMIT.to_string();
        let mut query: Vec<(&str, &str)> = vec![("limit", limit.as_str())];
        if let Some(filter) = filter {
            query.push(("where", filter));
        }

        let response = self.request(Method::GET, url).query(&query).send().await?;
        let bytes = check_status(response, "list").await?.bytes().await?;
        let page: RecordList<T> = sonic_rs::from_slice(&bytes)?;

        tracing::debug!("📋 NocoDB {} returned {} rows", table, page.list.len());
        Ok(page.list)
    }

    /// Inserts one row.
    pub async fn create_record<B: Serialize>(&self, table: &str, body: &B) -> Result<()> {
        let url = self.records_url(table)?;
        let response = self.json_request(Method::POST, url, body)?.send().await?;
        check_status(response, "create").await?;
        Ok(())
    }

    /// Updates rows in bulk. Every row must carry its integer `Id`.
    pub async fn update_records<B: Serialize>(&self, table: &str, rows: &[B]) -> Result<()> {
        let url = self.records_url(table)?;
        let response = self.json_request(Method::PATCH, url, &rows)?.send().await?;
        check_status(response, "update").await?;
        Ok(())
    }

    /// Deletes rows by integer id.
    pub async fn delete_records(&self, table: &str, ids: &[i64]) -> Result<()> {
        #[derive(Serialize)]
        struct RowId {
            #[serde(rename = "Id")]
            id: i64,
        }

        let url = self.records_url(table)?;
        let body: Vec<RowId> = ids.iter().map(|&id| RowId { id }).collect();
        let response = self.json_request(Method::DELETE, url, &body)?.send().await?;
        check_status(response, "delete").await?;
        Ok(())
    }

    /// Uploads a file to NocoDB storage and returns its absolute URL.
    pub async fn upload_file(&self, bytes: Vec<u8>, file_name: &str, mime: &str) -> Result<String> {
        let url = self.endpoint("api/v1/db/storage/upload")?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .request(Method::POST, url)
            .multipart(form)
            .timeout(self.config.upload_timeout)
            .send()
            .await?;
        let body = check_status(response, "upload").await?.bytes().await?;

        let attachment = parse_upload_response(&body)?;
        let link = attachment
            .best_link()
            .ok_or_else(|| AppError::Upstream("upload response carried no URL".to_string()))?;

        let absolute = self.absolute_url(link);
        tracing::info!("✅ Uploaded {} to NocoDB storage", file_name);
        Ok(absolute)
    }

    /// Fetches a stored file; returns its bytes and content type.
    pub async fn fetch_file(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let url = Url::parse(url).map_err(|_| AppError::Validation("URL de imagen no válida".to_string()))?;
        let response = self
            .request(Method::GET, url)
            .timeout(self.config.upload_timeout)
            .send()
            .await?;
        let mut response = check_status(response, "fetch").await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        if response
            .content_length()
            .is_some_and(|len| len > MAX_FETCH_BYTES as u64)
        {
            return Err(AppError::Upstream("stored file is too large".to_string()));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > MAX_FETCH_BYTES {
                return Err(AppError::Upstream("stored file is too large".to_string()));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok((bytes, content_type))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.config.base_url, path))
            .map_err(|e| AppError::Internal(format!("Invalid NocoDB URL: {}", e)))
    }

    fn records_url(&self, table: &str) -> Result<Url> {
        self.endpoint(&format!("api/v2/tables/{}/records", table))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("xc-token", self.config.api_token.as_str())
    }

    fn json_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<RequestBuilder> {
        let body = sonic_rs::to_vec(body)?;
        Ok(self
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body))
    }
}

async fn check_status(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    tracing::error!("❌ NocoDB {} failed: {} {}", action, status, text);
    Err(AppError::Upstream(format!("{} returned {}", action, status)))
}

/// The storage API answers with either one attachment or a list of them.
fn parse_upload_response(body: &[u8]) -> Result<Attachment> {
    if let Ok(list) = sonic_rs::from_slice::<Vec<Attachment>>(body) {
        return list
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Upstream("empty upload response".to_string()));
    }
    Ok(sonic_rs::from_slice::<Attachment>(body)?)
}
