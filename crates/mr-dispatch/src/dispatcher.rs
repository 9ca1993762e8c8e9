//! Failover dispatch
//!
//! One dispatch moves through `Validating -> SelectingProvider -> Sending ->
//! InterpretingResponse` and ends `Succeeded` or `Queued`. The chosen
//! provider and its effective URL live in a [`DispatchTarget`] owned by the
//! dispatch, so concurrent dispatches never observe each other's redirects.

use async_trait::async_trait;
use mr_common::{
    DispatchOutcome, HistoryRecord, MailMessage, ProviderSlot, QueueRecord, UNREACHABLE_REASON,
};
use mr_config::{HealthCheckConfig, ProviderConfig, RelayConfig};
use tracing::{debug, info, instrument, warn};

use crate::error::{DispatchError, Result};
use crate::health::ProviderHealthChecker;
use crate::interpreter::{self, Interpretation};
use crate::recorder::MailRecorder;
use crate::transport::{DispatchTarget, TransportClient};
use crate::{validator, wire};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Validating,
    SelectingProvider,
    Sending,
    InterpretingResponse,
    Succeeded,
    Queued,
}

/// Anything that can accept a mail message for delivery
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<DispatchOutcome>;
}

pub struct Dispatcher {
    primary: ProviderConfig,
    secondary: ProviderConfig,
    health: ProviderHealthChecker,
    transport: TransportClient,
    recorder: MailRecorder,
}

impl Dispatcher {
    pub fn new(config: &RelayConfig, recorder: MailRecorder) -> Result<Self> {
        Self::with_providers(
            config.primary.clone(),
            config.secondary.clone(),
            &config.health_check,
            recorder,
        )
    }

    pub fn with_providers(
        primary: ProviderConfig,
        secondary: ProviderConfig,
        health_check: &HealthCheckConfig,
        recorder: MailRecorder,
    ) -> Result<Self> {
        let health = ProviderHealthChecker::new(health_check)?;
        let transport = TransportClient::new([&primary, &secondary])?;

        Ok(Self {
            primary,
            secondary,
            health,
            transport,
            recorder,
        })
    }

    /// Probe the primary, then the secondary. `None` when neither answers.
    async fn select_provider(&self) -> Result<Option<DispatchTarget<'_>>> {
        for (slot, config) in [
            (ProviderSlot::Primary, &self.primary),
            (ProviderSlot::Secondary, &self.secondary),
        ] {
            if self.health.probe(&config.name, &config.url).await {
                debug!(%slot, provider = %config.name, "Selected provider");
                return DispatchTarget::new(slot, config).map(Some);
            }
        }
        Ok(None)
    }

    #[instrument(skip_all, fields(sender = %message.sender, recipients = message.to.len() + message.cc.len() + message.bcc.len()))]
    pub async fn dispatch(&self, message: &MailMessage) -> Result<DispatchOutcome> {
        let result = self.run(message).await;

        let outcome = match &result {
            Ok(DispatchOutcome::Sent { .. }) => "sent",
            Ok(DispatchOutcome::Queued { .. }) => "queued",
            Err(DispatchError::Validation(_)) => "rejected",
            Err(_) => "failed",
        };
        metrics::counter!("mailrelay_dispatch_total", "outcome" => outcome).increment(1);

        result
    }

    async fn run(&self, message: &MailMessage) -> Result<DispatchOutcome> {
        debug!(stage = ?DispatchStage::Validating);
        let errors = validator::validate(message);
        if !errors.is_empty() {
            info!(errors = ?errors, "Message rejected by validation");
            return Err(DispatchError::Validation(errors));
        }

        debug!(stage = ?DispatchStage::SelectingProvider);
        let Some(mut target) = self.select_provider().await? else {
            warn!(stage = ?DispatchStage::Queued, "{}", UNREACHABLE_REASON);
            return Ok(self.queue(message, UNREACHABLE_REASON.to_string()));
        };

        debug!(stage = ?DispatchStage::Sending, provider = %target.name(), slot = %target.slot);
        let request = wire::build_request(target.kind(), message)?;
        let response = self.transport.send_with_redirect(&mut target, &request).await?;

        debug!(
            stage = ?DispatchStage::InterpretingResponse,
            status = response.status.as_u16(),
            stream = ?response.stream
        );
        match interpreter::interpret(target.kind(), &response)? {
            Interpretation::Rejected { message: reason } => {
                warn!(
                    stage = ?DispatchStage::Queued,
                    provider = %target.name(),
                    status = response.status.as_u16(),
                    reason = %reason,
                    "Provider rejected message"
                );
                Ok(self.queue(message, reason))
            }
            Interpretation::Delivered {
                external_id,
                external_message,
            } => {
                info!(
                    stage = ?DispatchStage::Succeeded,
                    provider = %target.name(),
                    external_id = external_id.as_deref().unwrap_or(""),
                    "Message sent"
                );
                self.recorder.record_history(HistoryRecord::new(
                    message,
                    target.name(),
                    external_id.clone(),
                    external_message.clone(),
                ));
                Ok(DispatchOutcome::Sent {
                    provider_name: target.name().to_string(),
                    external_id,
                    external_message,
                })
            }
        }
    }

    fn queue(&self, message: &MailMessage, reason: String) -> DispatchOutcome {
        self.recorder.record_queue(QueueRecord::new(message, reason.clone()));
        DispatchOutcome::Queued { reason }
    }
}

#[async_trait]
impl MailSender for Dispatcher {
    async fn send(&self, message: MailMessage) -> Result<DispatchOutcome> {
        self.dispatch(&message).await
    }
}
