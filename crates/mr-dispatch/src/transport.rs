//! HTTP transport to the mail providers
//!
//! Redirects are never followed by the client itself. `send_with_redirect`
//! follows a single 301/302 hop by re-sending to the `Location` target,
//! tracked on the per-dispatch [`DispatchTarget`] rather than on the
//! shared provider configuration.

use mr_common::{ProviderKind, ProviderSlot};
use mr_config::ProviderConfig;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{Method, StatusCode, Url};
use tracing::{debug, warn};

use crate::error::{DispatchError, Result};
use crate::wire::WireRequest;

/// Header SendGrid uses to return the accepted message id
pub const MESSAGE_ID_HEADER: &str = "X-Message-ID";

/// The provider chosen for one dispatch and the URL it is currently sent to
#[derive(Debug, Clone)]
pub struct DispatchTarget<'a> {
    pub slot: ProviderSlot,
    pub config: &'a ProviderConfig,
    pub url: Url,
}

impl<'a> DispatchTarget<'a> {
    pub fn new(slot: ProviderSlot, config: &'a ProviderConfig) -> Result<Self> {
        let url = Url::parse(&config.url).map_err(|e| DispatchError::InvalidUrl {
            url: config.url.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { slot, config, url })
    }

    pub fn kind(&self) -> ProviderKind {
        self.config.kind
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

/// Which body a response was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStream {
    /// Status below 400
    Normal,
    /// Status 400 and above
    Error,
}

impl ResponseStream {
    pub fn for_status(status: StatusCode) -> Self {
        if status.as_u16() >= 400 {
            ResponseStream::Error
        } else {
            ResponseStream::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub message_id: Option<String>,
    pub location: Option<String>,
    pub body: String,
    pub stream: ResponseStream,
}

impl RawResponse {
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND)
    }
}

pub struct TransportClient {
    client: reqwest::Client,
}

impl TransportClient {
    /// Build a client whose connect timeout is the largest of the configured
    /// providers. Request timeouts are applied per request.
    pub fn new<'a>(providers: impl IntoIterator<Item = &'a ProviderConfig>) -> Result<Self> {
        let connect_timeout = providers
            .into_iter()
            .map(ProviderConfig::connect_timeout)
            .max()
            .unwrap_or_else(|| std::time::Duration::from_millis(3_000));

        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }

    /// Send `request` once to the target's current URL
    pub async fn send(&self, target: &DispatchTarget<'_>, request: &WireRequest) -> Result<RawResponse> {
        let config = target.config;
        let method = Method::from_bytes(config.request_method.as_bytes())
            .map_err(|e| DispatchError::Encoding(format!("invalid request method: {}", e)))?;
        let content_type = config.content_type.as_deref().unwrap_or(request.content_type);

        debug!(
            provider = %config.name,
            url = %target.url,
            method = %method,
            "Sending message to provider"
        );

        let mut builder = self
            .client
            .request(method, target.url.clone())
            .timeout(config.request_timeout())
            .header(CONTENT_TYPE, content_type)
            .body(request.body.clone());

        if let Some(accept) = config.accept_type.as_deref() {
            builder = builder.header(ACCEPT, accept);
        }

        builder = match config.kind {
            ProviderKind::SendGrid => builder.header(AUTHORIZATION, format!("Bearer {}", config.api_key)),
            ProviderKind::MailGun => builder.basic_auth("api", Some(&config.api_key)),
        };

        let response = builder.send().await.map_err(|source| DispatchError::Transport {
            provider: config.name.clone(),
            source,
        })?;

        let status = response.status();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let message_id = header(MESSAGE_ID_HEADER);
        let location = header(LOCATION.as_str());
        let body = response.text().await.map_err(|source| DispatchError::Transport {
            provider: config.name.clone(),
            source,
        })?;

        Ok(RawResponse {
            status,
            message_id,
            location,
            body,
            stream: ResponseStream::for_status(status),
        })
    }

    /// Send, following at most one 301/302 redirect. The target URL is
    /// updated in place so the caller can see where the message went.
    pub async fn send_with_redirect(
        &self,
        target: &mut DispatchTarget<'_>,
        request: &WireRequest,
    ) -> Result<RawResponse> {
        let response = self.send(target, request).await?;
        if !response.is_redirect() {
            return Ok(response);
        }

        let Some(location) = response.location.as_deref() else {
            warn!(
                provider = %target.name(),
                status = response.status.as_u16(),
                "Redirect without Location header"
            );
            return Ok(response);
        };

        let next = target.url.join(location).map_err(|e| DispatchError::InvalidUrl {
            url: location.to_string(),
            message: e.to_string(),
        })?;

        warn!(
            provider = %target.name(),
            from = %target.url,
            to = %next,
            "Provider redirected, update the configured url; resending once"
        );
        metrics::counter!("mailrelay_redirects_total", "provider" => target.name().to_string()).increment(1);

        target.url = next;
        self.send(target, request).await
    }
}
