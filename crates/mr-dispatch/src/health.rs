//! Provider liveness probe
//!
//! A provider is reachable when an `OPTIONS` request to its send URL answers
//! with exactly `200 OK` inside the probe timeouts. Anything else, including
//! redirects and connection failures, counts as unreachable.

use mr_config::HealthCheckConfig;
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use crate::error::Result;

pub struct ProviderHealthChecker {
    client: reqwest::Client,
}

impl ProviderHealthChecker {
    pub fn new(config: &HealthCheckConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }

    /// Probe `url`, returning whether the provider answered 200
    pub async fn probe(&self, provider: &str, url: &str) -> bool {
        match self.client.request(Method::OPTIONS, url).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!(provider, url, "Provider is reachable");
                true
            }
            Ok(response) => {
                warn!(
                    provider,
                    url,
                    status = response.status().as_u16(),
                    "Provider probe returned unexpected status"
                );
                metrics::counter!("mailrelay_probe_failures_total", "provider" => provider.to_string())
                    .increment(1);
                false
            }
            Err(e) => {
                warn!(provider, url, error = %e, "Provider probe failed");
                metrics::counter!("mailrelay_probe_failures_total", "provider" => provider.to_string())
                    .increment(1);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn checker() -> ProviderHealthChecker {
        ProviderHealthChecker::new(&HealthCheckConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_probe_ok() {
        let server = MockServer::start().await;
        Mock::given(method("OPTIONS"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(checker().probe("SendGrid", &server.uri()).await);
    }

    #[tokio::test]
    async fn test_probe_requires_exact_200() {
        let server = MockServer::start().await;
        Mock::given(method("OPTIONS"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        assert!(!checker().probe("SendGrid", &server.uri()).await);
    }

    #[tokio::test]
    async fn test_probe_does_not_follow_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("OPTIONS"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/elsewhere"))
            .mount(&server)
            .await;

        assert!(!checker().probe("MailGun", &server.uri()).await);
    }

    #[tokio::test]
    async fn test_probe_connection_refused() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        assert!(!checker().probe("MailGun", &uri).await);
    }
}
