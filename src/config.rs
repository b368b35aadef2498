//! Configuration for talking to a DeepDoc conversion service.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The config is an explicit value handed to
//! [`crate::controller::SessionController`] at construction; the library
//! never reads the process environment itself (the CLI maps `DEEPDOC_*`
//! variables onto the builder).

use crate::error::DeepDocError;
use crate::progress::ProgressCallback;
use reqwest::Url;
use std::fmt;
use std::time::Duration;

/// Default upper bound on one upload request, end to end.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default size of the pieces the file body is streamed in.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Configuration for a [`crate::controller::SessionController`].
///
/// # Example
/// ```rust
/// use deepdoc_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .host("converter.internal")
///     .port(8080)
///     .timeout_secs(45)
///     .build()
///     .unwrap();
/// assert_eq!(config.upload_url().unwrap().as_str(), "http://converter.internal:8080/upload");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// URL scheme of the service. Default: `http`.
    pub scheme: String,

    /// Host name or address of the service. Default: `localhost`.
    pub host: String,

    /// TCP port of the service. Default: `8000`.
    pub port: u16,

    /// Upper bound on the whole upload request (connect, send, read the
    /// response). Default: 30 s.
    ///
    /// Exceeding it is reported as a network timeout, never as a server
    /// error.
    pub timeout: Duration,

    /// Size of each body chunk handed to the connection. Default: 64 KiB.
    ///
    /// Progress is reported once per chunk, so smaller chunks give a
    /// smoother bar at the cost of more wake-ups.
    pub chunk_size: usize,

    /// Observer for upload lifecycle events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "http".into(),
            host: "localhost".into(),
            port: 8000,
            timeout: DEFAULT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("chunk_size", &self.chunk_size)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn UploadProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Root of the service, e.g. `http://localhost:8000/`.
    pub fn base_url(&self) -> Result<Url, DeepDocError> {
        let raw = format!("{}://{}:{}/", self.scheme, self.host, self.port);
        Url::parse(&raw)
            .map_err(|e| DeepDocError::InvalidConfig(format!("'{}' is not a usable host: {e}", self.host)))
    }

    /// Endpoint the document is posted to.
    pub fn upload_url(&self) -> Result<Url, DeepDocError> {
        let mut url = self.base_url()?;
        url.set_path("/upload");
        Ok(url)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout = Duration::from_secs(secs);
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Point the config at a full base URL such as `http://127.0.0.1:5123`
    /// (handy for mock servers). Scheme, host and port are taken from it.
    pub fn base_url(mut self, url: &str) -> Result<Self, DeepDocError> {
        let parsed = Url::parse(url)
            .map_err(|e| DeepDocError::InvalidConfig(format!("Invalid base URL '{url}': {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| DeepDocError::InvalidConfig(format!("Base URL '{url}' has no host")))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| DeepDocError::InvalidConfig(format!("Base URL '{url}' has no port")))?;
        self.config.scheme = parsed.scheme().to_string();
        self.config.host = host.to_string();
        self.config.port = port;
        Ok(self)
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, DeepDocError> {
        let c = &self.config;
        if c.scheme != "http" && c.scheme != "https" {
            return Err(DeepDocError::InvalidConfig(format!(
                "Scheme must be http or https, got '{}'",
                c.scheme
            )));
        }
        if c.host.trim().is_empty() {
            return Err(DeepDocError::InvalidConfig("Host must not be empty".into()));
        }
        if c.port == 0 {
            return Err(DeepDocError::InvalidConfig("Port must be ≥ 1".into()));
        }
        if c.timeout.is_zero() {
            return Err(DeepDocError::InvalidConfig("Timeout must be > 0".into()));
        }
        c.base_url()?;
        Ok(self.config)
    }
}
