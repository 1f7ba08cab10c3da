//! Project root: connection options and the databases registry.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Databases, Error, Result, SharedApi, TRACING_TARGET_TREE};

/// Endpoint used when [`ProjectOptions::endpoint`] is not set.
pub const DEFAULT_ENDPOINT: &str = "https://cloud.appwrite.io/v1";

/// Environment variable holding the project ID.
pub const PROJECT_ID_ENV: &str = "APPWRITE_PROJECT_ID";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "APPWRITE_API_KEY";

/// Connection options of a project.
///
/// String values are trimmed and blank values count as unset. The project ID
/// and the API key fall back to [`PROJECT_ID_ENV`] and [`API_KEY_ENV`].
#[derive(Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ProjectOptions {
    /// Project ID
    #[cfg_attr(
        feature = "config",
        arg(long = "appwrite-project-id", env = "APPWRITE_PROJECT_ID")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// API key of the project
    #[cfg_attr(
        feature = "config",
        arg(long = "appwrite-api-key", env = "APPWRITE_API_KEY")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API endpoint (defaults to Appwrite Cloud)
    #[cfg_attr(
        feature = "config",
        arg(long = "appwrite-endpoint", env = "APPWRITE_ENDPOINT")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// JSON Web Token of a user session
    #[cfg_attr(feature = "config", arg(long = "appwrite-jwt", env = "APPWRITE_JWT"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,

    /// Session ID of a user session
    #[cfg_attr(
        feature = "config",
        arg(long = "appwrite-session-id", env = "APPWRITE_SESSION_ID")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Locale sent with every request
    #[cfg_attr(
        feature = "config",
        arg(long = "appwrite-locale", env = "APPWRITE_LOCALE")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// User agent of the end user on whose behalf requests are sent
    #[cfg_attr(
        feature = "config",
        arg(
            long = "appwrite-forwarded-user-agent",
            env = "APPWRITE_FORWARDED_USER_AGENT"
        )
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_user_agent: Option<String>,

    /// Accept self-signed TLS certificates
    #[cfg_attr(
        feature = "config",
        arg(long = "appwrite-self-signed", env = "APPWRITE_SELF_SIGNED")
    )]
    #[serde(default)]
    pub self_signed: bool,
}

impl fmt::Debug for ProjectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectOptions")
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .field("jwt", &self.jwt.as_ref().map(|_| "***"))
            .field("session_id", &self.session_id.as_ref().map(|_| "***"))
            .field("locale", &self.locale)
            .field("forwarded_user_agent", &self.forwarded_user_agent)
            .field("self_signed", &self.self_signed)
            .finish()
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

impl ProjectOptions {
    /// Creates options for the given project ID.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    /// Sets the API key sent as `X-Appwrite-Key`.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the JWT of a user session.
    #[must_use]
    pub fn with_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.jwt = Some(jwt.into());
        self
    }

    /// Sets the session ID of a user session.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the locale sent with every request.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Sets the end-user agent forwarded with every request.
    #[must_use]
    pub fn with_forwarded_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.forwarded_user_agent = Some(user_agent.into());
        self
    }

    /// Accepts or rejects self-signed TLS certificates.
    #[must_use]
    pub fn with_self_signed(mut self, self_signed: bool) -> Self {
        self.self_signed = self_signed;
        self
    }

    /// Resolves the options against the process environment.
    pub fn resolve(&self) -> Result<ConnectionSettings> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolves the options, reading fallbacks through `env`.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<ConnectionSettings> {
        let project_id = normalize(self.project_id.as_deref())
            .or_else(|| normalize(env(PROJECT_ID_ENV).as_deref()))
            .ok_or_else(|| {
                Error::configuration().with_message(format!(
                    "No project ID given and {PROJECT_ID_ENV} is not set"
                ))
            })?;

        let api_key = normalize(self.api_key.as_deref())
            .or_else(|| normalize(env(API_KEY_ENV).as_deref()));

        let endpoint = normalize(self.endpoint.as_deref())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
        let endpoint = Url::parse(&endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::configuration()
                .with_message(format!("Endpoint '{endpoint}' is not a base URL")));
        }

        Ok(ConnectionSettings {
            project_id,
            endpoint,
            api_key,
            jwt: normalize(self.jwt.as_deref()),
            session_id: normalize(self.session_id.as_deref()),
            locale: normalize(self.locale.as_deref()),
            forwarded_user_agent: normalize(self.forwarded_user_agent.as_deref()),
            self_signed: self.self_signed,
        })
    }
}

/// Validated connection settings, produced by [`ProjectOptions::resolve`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub project_id: String,
    pub endpoint: Url,
    pub api_key: Option<String>,
    pub jwt: Option<String>,
    pub session_id: Option<String>,
    pub locale: Option<String>,
    pub forwarded_user_agent: Option<String>,
    pub self_signed: bool,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("project_id", &self.project_id)
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("locale", &self.locale)
            .field("self_signed", &self.self_signed)
            .finish_non_exhaustive()
    }
}

/// Options of [`Project::init`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitProjectOptions {
    /// Also build the databases registry and the tree below it.
    pub with_databases: bool,
}

impl InitProjectOptions {
    /// Options that build the whole resource tree.
    pub fn with_databases() -> Self {
        Self {
            with_databases: true,
        }
    }
}

struct Connection {
    project_id: String,
    api: SharedApi,
}

/// Root of the resource tree.
///
/// `Project::new` → [`init`](Self::init) connects →
/// [`init_databases`](Self::init_databases) builds the tree.
pub struct Project {
    options: ProjectOptions,
    connection: Option<Connection>,
    databases: Option<Databases>,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("options", &self.options)
            .field("connected", &self.connection.is_some())
            .field("databases", &self.databases)
            .finish()
    }
}

impl Project {
    /// Creates an unconnected project.
    pub fn new(options: ProjectOptions) -> Self {
        Self {
            options,
            connection: None,
            databases: None,
        }
    }

    /// Creates an unconnected project with default options for the given ID.
    pub fn from_id(project_id: impl Into<String>) -> Self {
        Self::new(ProjectOptions::new(project_id))
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    /// Connects through the REST client.
    #[cfg(feature = "reqwest")]
    pub async fn init(&mut self, init: InitProjectOptions) -> Result<()> {
        self.ensure_disconnected()?;
        let settings = self.options.resolve()?;
        let client = crate::reqwest::AppwriteClient::new(
            settings,
            crate::reqwest::ReqwestConfig::default(),
        )?;

        self.init_with_api(Arc::new(client), init).await
    }

    /// Fails: without the `reqwest` feature there is no built-in transport.
    #[cfg(not(feature = "reqwest"))]
    pub async fn init(&mut self, _init: InitProjectOptions) -> Result<()> {
        self.ensure_disconnected()?;
        Err(Error::configuration()
            .with_message("no built-in transport, use init_with_api() or enable `reqwest`"))
    }

    /// Connects through the given API implementation.
    ///
    /// Only the project ID of the options is used.
    pub async fn init_with_api(&mut self, api: SharedApi, init: InitProjectOptions) -> Result<()> {
        self.ensure_disconnected()?;
        let settings = self.options.resolve()?;

        tracing::debug!(
            target: TRACING_TARGET_TREE,
            project_id = %settings.project_id,
            endpoint = %settings.endpoint,
            "Project connected"
        );

        self.connection = Some(Connection {
            project_id: settings.project_id,
            api,
        });

        if init.with_databases {
            self.init_databases().await?;
        }

        Ok(())
    }

    fn ensure_disconnected(&self) -> Result<()> {
        match self.connection {
            Some(_) => Err(Error::misuse().with_message("project is already initialized")),
            None => Ok(()),
        }
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or_else(|| {
            Error::misuse().with_message("project is not initialized, call init() first")
        })
    }

    /// Builds the databases registry and the whole tree below it.
    pub async fn init_databases(&mut self) -> Result<&Databases> {
        if self.databases.is_some() {
            return Err(Error::misuse().with_message("databases are already initialized"));
        }

        let connection = self.connection()?;
        let mut databases = Databases::new(connection.project_id.clone(), Arc::clone(&connection.api));
        databases.init().await?;

        Ok(self.databases.insert(databases))
    }

    /// Returns the resolved project ID.
    pub fn id(&self) -> Result<&str> {
        Ok(&self.connection()?.project_id)
    }

    /// Returns the API handle shared by the whole tree.
    pub fn api(&self) -> Result<&SharedApi> {
        Ok(&self.connection()?.api)
    }

    /// Returns the databases registry.
    pub fn databases(&self) -> Result<&Databases> {
        self.databases.as_ref().ok_or_else(|| {
            Error::misuse().with_message("databases are not initialized, call init_databases() first")
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::ErrorKind;
    use crate::mock::MemoryApi;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn resolve_trims_and_defaults() {
        let options = ProjectOptions::new("  my-project ")
            .with_api_key(" secret ")
            .with_locale("   ");

        let settings = options.resolve_with(env(&[])).unwrap();
        assert_eq!(settings.project_id, "my-project");
        assert_eq!(settings.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.locale, None);
        assert_eq!(settings.endpoint.as_str(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn resolve_falls_back_to_environment() {
        let options = ProjectOptions::default().with_api_key("  ");
        let settings = options
            .resolve_with(env(&[(PROJECT_ID_ENV, "from-env"), (API_KEY_ENV, "key")]))
            .unwrap();

        assert_eq!(settings.project_id, "from-env");
        assert_eq!(settings.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn explicit_values_win_over_environment() {
        let settings = ProjectOptions::new("explicit")
            .resolve_with(env(&[(PROJECT_ID_ENV, "from-env")]))
            .unwrap();
        assert_eq!(settings.project_id, "explicit");
    }

    #[test]
    fn resolve_requires_project_id() {
        let error = ProjectOptions::default().resolve_with(env(&[])).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
    }

    #[test]
    fn resolve_rejects_invalid_endpoint() {
        let error = ProjectOptions::new("p")
            .with_endpoint("not a url")
            .resolve_with(env(&[]))
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
    }

    #[test]
    fn debug_hides_secrets() {
        let options = ProjectOptions::new("p").with_api_key("top-secret");
        assert!(!format!("{options:?}").contains("top-secret"));
    }

    #[tokio::test]
    async fn init_with_databases_builds_the_tree() {
        let api = Arc::new(MemoryApi::new());
        api.add_database("db1", "empty")
            .add_database("db2", "main")
            .add_collection("db2", "users", "Users");

        let mut project = Project::from_id("p");
        project
            .init_with_api(api, InitProjectOptions::with_databases())
            .await
            .unwrap();

        assert_eq!(project.id().unwrap(), "p");
        let databases = project.databases().unwrap();
        assert_eq!(databases.database_list().unwrap().len(), 2);
        assert_eq!(databases.project_id(), "p");
    }

    #[tokio::test]
    async fn lifecycle_misuse() {
        let api = Arc::new(MemoryApi::new());
        let mut project = Project::from_id("p");

        assert_eq!(project.id().unwrap_err().kind, ErrorKind::Misuse);
        assert_eq!(project.init_databases().await.unwrap_err().kind, ErrorKind::Misuse);

        project
            .init_with_api(api.clone(), InitProjectOptions::default())
            .await
            .unwrap();
        assert_eq!(project.databases().unwrap_err().kind, ErrorKind::Misuse);

        let error = project
            .init_with_api(api, InitProjectOptions::default())
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Misuse);

        project.init_databases().await.unwrap();
        assert_eq!(project.init_databases().await.unwrap_err().kind, ErrorKind::Misuse);
    }
}
