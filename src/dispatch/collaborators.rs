use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::DispatchError;
use super::email::OutgoingEmail;
use crate::types::Customer;

/// Runs the organization's automation rules for a lead that reached `status`.
#[async_trait]
pub trait AutomationEvaluator: Send + Sync {
    async fn evaluate(&self, lead_id: &str, status: &str) -> Result<(), DispatchError>;
}

/// Delivers a rendered email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DispatchError>;
}

/// Publishes a realtime event to subscribers of `channel`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &str, payload: &Value)
    -> Result<(), DispatchError>;
}

/// Pushes a newly created customer to the third-party organization service.
#[async_trait]
pub trait OrganizationSync: Send + Sync {
    async fn sync_customer(
        &self,
        customer: &Customer,
        organization_id: &str,
    ) -> Result<(), DispatchError>;
}

/// The external services side effects are delivered to, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub automations: Arc<dyn AutomationEvaluator>,
    pub email: Arc<dyn EmailSender>,
    pub events: Arc<dyn EventPublisher>,
    pub org_sync: Arc<dyn OrganizationSync>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            automations: Arc::new(LogAutomationEvaluator),
            email: Arc::new(LogEmailSender),
            events: Arc::new(LogPublisher),
            org_sync: Arc::new(LogOrganizationSync),
        }
    }
}

/// Stand-in used when no automation engine is wired up.
pub struct LogAutomationEvaluator;

#[async_trait]
impl AutomationEvaluator for LogAutomationEvaluator {
    async fn evaluate(&self, lead_id: &str, status: &str) -> Result<(), DispatchError> {
        info!(lead_id, status, "automation evaluation requested");
        Ok(())
    }
}

pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DispatchError> {
        info!(to = %email.to, subject = %email.subject, "email queued for delivery");
        Ok(())
    }
}

pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        _payload: &Value,
    ) -> Result<(), DispatchError> {
        info!(channel, event, "realtime event published");
        Ok(())
    }
}

pub struct LogOrganizationSync;

#[async_trait]
impl OrganizationSync for LogOrganizationSync {
    async fn sync_customer(
        &self,
        customer: &Customer,
        organization_id: &str,
    ) -> Result<(), DispatchError> {
        info!(customer_id = %customer.id, organization_id, "customer sync requested");
        Ok(())
    }
}
