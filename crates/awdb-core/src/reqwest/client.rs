//! Reqwest-based REST client for the database endpoints.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use url::Url;

use super::{Error, ReqwestConfig, Result, TRACING_TARGET};
use crate::{
    AttributeModel, CollectionModel, ConnectionSettings, DatabaseApi, DatabaseModel, Document,
    IndexModel, ListPage, Query,
};

/// Body of a listing response: a total plus a list named after the resource.
#[derive(Deserialize)]
struct ListResponse<T> {
    total: u64,
    #[serde(
        alias = "databases",
        alias = "collections",
        alias = "attributes",
        alias = "indexes",
        alias = "documents"
    )]
    items: Vec<T>,
}

/// Body of an error response.
#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Inner client that holds the HTTP client and connection settings.
struct AppwriteClientInner {
    http: Client,
    settings: ConnectionSettings,
    config: ReqwestConfig,
}

/// REST client for the Appwrite database API.
///
/// Authentication headers are derived once from the [`ConnectionSettings`]
/// and sent with every request. Cloning is cheap.
#[derive(Clone)]
pub struct AppwriteClient {
    inner: Arc<AppwriteClientInner>,
}

impl std::fmt::Debug for AppwriteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppwriteClient")
            .field("settings", &self.inner.settings)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

fn header(headers: &mut HeaderMap, name: &'static str, value: Option<&str>) -> Result<()> {
    if let Some(value) = value {
        let mut value = HeaderValue::from_str(value)?;
        value.set_sensitive(name != "x-appwrite-project" && name != "x-appwrite-locale");
        headers.insert(HeaderName::from_static(name), value);
    }

    Ok(())
}

fn default_headers(settings: &ConnectionSettings) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    header(&mut headers, "x-appwrite-project", Some(&settings.project_id))?;
    header(&mut headers, "x-appwrite-key", settings.api_key.as_deref())?;
    header(&mut headers, "x-appwrite-jwt", settings.jwt.as_deref())?;
    header(&mut headers, "x-appwrite-session", settings.session_id.as_deref())?;
    header(&mut headers, "x-appwrite-locale", settings.locale.as_deref())?;
    header(
        &mut headers,
        "x-forwarded-user-agent",
        settings.forwarded_user_agent.as_deref(),
    )?;
    Ok(headers)
}

/// Builds the error of a rejected request from its status and body.
///
/// Falls back to the status reason when the body is missing or is not an
/// Appwrite error document.
fn api_error(status: StatusCode, body: Option<&str>) -> Error {
    let parsed = body.and_then(|body| serde_json::from_str::<ErrorResponse>(body).ok());
    let (message, kind) = match parsed {
        Some(error) => (error.message, error.kind),
        None => (status.canonical_reason().unwrap_or("Unknown error").to_owned(), None),
    };

    Error::Api {
        status: status.as_u16(),
        kind,
        message,
    }
}

fn query_params(queries: &[Query]) -> Result<Vec<(&'static str, String)>> {
    queries
        .iter()
        .map(|query| Ok(("queries[]", serde_json::to_string(query)?)))
        .collect()
}

impl AppwriteClient {
    /// Creates a client for the given connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a setting cannot be sent as a header or the HTTP
    /// client cannot be created.
    pub fn new(settings: ConnectionSettings, config: ReqwestConfig) -> crate::Result<Self> {
        let timeout = config.effective_timeout();

        tracing::debug!(
            target: TRACING_TARGET,
            endpoint = %settings.endpoint,
            project_id = %settings.project_id,
            timeout_ms = timeout.as_millis(),
            "Creating Appwrite client"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(config.effective_user_agent())
            .default_headers(default_headers(&settings)?)
            .danger_accept_invalid_certs(settings.self_signed)
            .build()
            .map_err(Error::from)?;

        let inner = AppwriteClientInner {
            http,
            settings,
            config,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the connection settings.
    pub fn settings(&self) -> &ConnectionSettings {
        &self.inner.settings
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }

    /// Builds `{endpoint}/databases/{segments...}`.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.settings.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Endpoint)?
            .pop_if_empty()
            .push("databases")
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => Some(body),
            Err(error) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    status = status.as_u16(),
                    error = %error,
                    "Failed to read error response body"
                );
                None
            }
        };

        let error = api_error(status, body.as_deref());
        if let Error::Api { kind, message, .. } = &error {
            tracing::debug!(
                target: TRACING_TARGET,
                status = status.as_u16(),
                kind = kind.as_deref(),
                message = %message,
                "Request rejected"
            );
        }

        Err(error)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        queries: &[Query],
    ) -> Result<ListPage<T>> {
        let url = self.url(segments)?;

        tracing::trace!(
            target: TRACING_TARGET,
            url = %url,
            queries = queries.len(),
            "Listing"
        );

        let request = self.inner.http.get(url).query(&query_params(queries)?);
        let response: ListResponse<T> = self.fetch(request).await?;
        Ok(ListPage::new(response.total, response.items))
    }
}

#[async_trait::async_trait]
impl DatabaseApi for AppwriteClient {
    async fn list_databases(&self, queries: Vec<Query>) -> crate::Result<ListPage<DatabaseModel>> {
        Ok(self.list(&[], &queries).await?)
    }

    async fn list_collections(
        &self,
        database_id: &str,
        queries: Vec<Query>,
    ) -> crate::Result<ListPage<CollectionModel>> {
        Ok(self.list(&[database_id, "collections"], &queries).await?)
    }

    async fn list_attributes(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> crate::Result<ListPage<AttributeModel>> {
        let segments = [database_id, "collections", collection_id, "attributes"];
        Ok(self.list(&segments, &queries).await?)
    }

    async fn list_indexes(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> crate::Result<ListPage<IndexModel>> {
        let segments = [database_id, "collections", collection_id, "indexes"];
        Ok(self.list(&segments, &queries).await?)
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> crate::Result<ListPage<Document>> {
        let segments = [database_id, "collections", collection_id, "documents"];
        Ok(self.list(&segments, &queries).await?)
    }

    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> crate::Result<Document> {
        let url = self.url(&[database_id, "collections", collection_id, "documents"])?;
        let body = json!({ "documentId": document_id, "data": data });

        tracing::debug!(
            target: TRACING_TARGET,
            collection_id,
            document_id,
            "Creating document"
        );

        Ok(self.fetch(self.inner.http.post(url).json(&body)).await?)
    }

    async fn update_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Option<Map<String, Value>>,
    ) -> crate::Result<Document> {
        let segments = [database_id, "collections", collection_id, "documents", document_id];
        let url = self.url(&segments)?;
        let body = match data {
            Some(data) => json!({ "data": data }),
            None => json!({}),
        };

        tracing::debug!(
            target: TRACING_TARGET,
            collection_id,
            document_id,
            "Updating document"
        );

        Ok(self.fetch(self.inner.http.patch(url).json(&body)).await?)
    }

    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> crate::Result<()> {
        let segments = [database_id, "collections", collection_id, "documents", document_id];
        let url = self.url(&segments)?;

        tracing::debug!(
            target: TRACING_TARGET,
            collection_id,
            document_id,
            "Deleting document"
        );

        self.send(self.inner.http.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectOptions;

    fn client(options: ProjectOptions) -> AppwriteClient {
        let settings = options.resolve_with(|_| None).unwrap();
        AppwriteClient::new(settings, ReqwestConfig::default()).unwrap()
    }

    #[test]
    fn urls_escape_segments() {
        let client = client(ProjectOptions::new("p").with_endpoint("https://example.com/v1/"));

        let url = client.url(&["main", "collections", "a b", "documents"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/v1/databases/main/collections/a%20b/documents"
        );
        assert_eq!(client.url(&[]).unwrap().as_str(), "https://example.com/v1/databases");
    }

    #[test]
    fn headers_from_settings() {
        let settings = ProjectOptions::new("p")
            .with_api_key("key")
            .with_locale("de")
            .resolve_with(|_| None)
            .unwrap();

        let headers = default_headers(&settings).unwrap();
        assert_eq!(headers["x-appwrite-project"], "p");
        assert_eq!(headers["x-appwrite-key"], "key");
        assert!(headers["x-appwrite-key"].is_sensitive());
        assert_eq!(headers["x-appwrite-locale"], "de");
        assert!(!headers.contains_key("x-appwrite-jwt"));
    }

    #[test]
    fn invalid_header_value_is_rejected() {
        let settings = ProjectOptions::new("p")
            .with_api_key("bad\nkey")
            .resolve_with(|_| None)
            .unwrap();

        let error = AppwriteClient::new(settings, ReqwestConfig::default()).unwrap_err();
        assert_eq!(error.kind, crate::ErrorKind::Configuration);
    }

    #[test]
    fn queries_become_repeated_params() {
        let params = query_params(&[Query::cursor_after("x"), Query::limit(25)]).unwrap();
        assert_eq!(
            params,
            [
                ("queries[]", r#"{"method":"cursorAfter","values":["x"]}"#.to_owned()),
                ("queries[]", r#"{"method":"limit","values":[25]}"#.to_owned()),
            ]
        );
    }

    #[test]
    fn rejected_request_uses_error_document() {
        let body = r#"{"message":"Document not found","code":404,"type":"document_not_found"}"#;
        let Error::Api { status, kind, message } = api_error(StatusCode::NOT_FOUND, Some(body))
        else {
            panic!("expected an API error");
        };
        assert_eq!(status, 404);
        assert_eq!(kind.as_deref(), Some("document_not_found"));
        assert_eq!(message, "Document not found");
    }

    #[test]
    fn unreadable_error_body_falls_back_to_reason() {
        for body in [None, Some("<html>bad gateway</html>")] {
            let Error::Api { status, kind, message } = api_error(StatusCode::BAD_GATEWAY, body)
            else {
                panic!("expected an API error");
            };
            assert_eq!(status, 502);
            assert!(kind.is_none());
            assert_eq!(message, "Bad Gateway");
        }
    }

    #[test]
    fn list_response_accepts_resource_names() {
        let page: ListResponse<CollectionModel> = serde_json::from_str(
            r#"{"total":1,"collections":[{"$id":"users","name":"Users","databaseId":"main"}]}"#,
        )
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, "users");

        let page: ListResponse<Document> =
            serde_json::from_str(r#"{"total":0,"documents":[]}"#).unwrap();
        assert!(page.items.is_empty());
    }
}
