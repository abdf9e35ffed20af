use std::fmt;

use anyhow::Context;
use async_trait::async_trait;
use errors::{
    ErrorCode,
    ErrorMetadata,
    ErrorMetadataAnyhowExt,
};
use url::Url;

use super::{
    DdlDiffService,
    DiffMetadataRequest,
    DiffMetadataResponse,
};
use crate::knobs::{
    DDL_DIFF_SERVICE_TOKEN,
    DDL_DIFF_SERVICE_URL,
};

const DIFF_METADATA_ENDPOINT: &str = "v1/schemaDesigns:diffMetadata";

/// Where the DDL diff service lives and how to authenticate to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DdlDiffServiceConfig {
    /// Root URL of the service (e.g. "https://bytebase.example.com/").
    pub base_url: Url,
    /// Sent as a bearer token. Empty sends no authorization header.
    pub token: String,
}

impl DdlDiffServiceConfig {
    /// Validates a user-supplied service URL.
    pub fn from_parameters(url: &str, token: &str) -> anyhow::Result<Self> {
        let invalid = |msg: &str| {
            ErrorMetadata::bad_request("InvalidDdlDiffServiceUrl", format!("{url:?}: {msg}"))
        };
        let base_url = Url::parse(url).with_context(|| invalid("must be a URL"))?;
        if base_url.host_str().is_none() {
            anyhow::bail!(invalid("must contain a host"));
        }
        if base_url.path() != "/"
            || base_url.query().is_some()
            || !base_url.username().is_empty()
            || base_url.password().is_some()
            || base_url.fragment().is_some()
            || (base_url.scheme() != "http" && base_url.scheme() != "https")
        {
            anyhow::bail!(invalid("must be a root http(s) URL"));
        }
        Ok(Self {
            base_url,
            token: token.to_owned(),
        })
    }

    /// Reads `DDL_DIFF_SERVICE_URL` and `DDL_DIFF_SERVICE_TOKEN`. Returns
    /// `None` when no URL is configured.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        if DDL_DIFF_SERVICE_URL.is_empty() {
            return Ok(None);
        }
        Self::from_parameters(&DDL_DIFF_SERVICE_URL, &DDL_DIFF_SERVICE_TOKEN)
            .map(Some)
            .map_err(|e| e.wrap_error_message(|msg| format!("DDL_DIFF_SERVICE_URL {msg}")))
    }
}

/// [`DdlDiffService`] that talks to a real service over HTTP.
pub struct HttpDdlDiffService {
    config: DdlDiffServiceConfig,
    client: reqwest::Client,
}

impl HttpDdlDiffService {
    pub fn new(config: DdlDiffServiceConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

impl fmt::Display for HttpDdlDiffService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config.base_url)
    }
}

/// Classifies an unsuccessful response by its status code.
pub(super) fn error_for_status(status: http::StatusCode, body: &str) -> ErrorMetadata {
    let msg = if body.trim().is_empty() {
        format!("DDL diff service returned {status}")
    } else {
        format!("DDL diff service returned {status}: {}", body.trim())
    };
    let short_msg = "DdlDiffFailed";
    match ErrorCode::from_http_status_code(status) {
        Some(ErrorCode::BadRequest) => ErrorMetadata::bad_request(short_msg, msg),
        Some(ErrorCode::Unauthenticated) => ErrorMetadata::unauthenticated(short_msg, msg),
        Some(ErrorCode::Forbidden) => ErrorMetadata::forbidden(short_msg, msg),
        Some(ErrorCode::NotFound) => ErrorMetadata::not_found(short_msg, msg),
        Some(ErrorCode::Overloaded) => ErrorMetadata::overloaded(short_msg, msg),
        Some(ErrorCode::OperationalInternalServerError) | None => ErrorMetadata {
            code: ErrorCode::OperationalInternalServerError,
            short_msg: short_msg.into(),
            msg: msg.into(),
        },
    }
}

#[async_trait]
impl DdlDiffService for HttpDdlDiffService {
    async fn diff_metadata(
        &self,
        request: DiffMetadataRequest,
    ) -> anyhow::Result<DiffMetadataResponse> {
        let url = self
            .config
            .base_url
            .join(DIFF_METADATA_ENDPOINT)
            .context("Invalid DDL diff endpoint")?;
        let mut builder = self.client.post(url).json(&request);
        if !self.config.token.is_empty() {
            builder = builder.bearer_auth(&self.config.token);
        }
        let response = builder.send().await.with_context(|| {
            ErrorMetadata::overloaded(
                "DdlDiffUnavailable",
                format!("Could not reach the DDL diff service at {self}"),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(error_for_status(status, &body));
        }
        response
            .json::<DiffMetadataResponse>()
            .await
            .context("Failed to deserialize DDL diff response")
    }
}
