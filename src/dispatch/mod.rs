//! Fire-and-forget side effects.
//!
//! Lead operations enqueue effects onto a bounded channel and return immediately. A
//! worker task runs each effect on its own task, bounded by a semaphore; failures and
//! panics are logged and never reach the caller or roll back committed data.

mod collaborators;
mod email;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

pub use collaborators::{
    AutomationEvaluator, Collaborators, EmailSender, EventPublisher, LogAutomationEvaluator,
    LogEmailSender, LogOrganizationSync, LogPublisher, OrganizationSync,
};
pub use email::{EmailTemplate, OutgoingEmail};

use crate::config::DispatchConfig;
use crate::store::Store;
use crate::types::{Customer, Notification};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("store error: {0}")]
    Store(#[from] crate::error::Error),

    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },
}

/// Realtime channel shared by everyone in an organization.
pub fn org_channel(organization_id: &str) -> String {
    format!("org_{organization_id}")
}

/// Realtime channel private to one user.
pub fn user_channel(user_id: &str) -> String {
    format!("user_{user_id}")
}

#[derive(Debug)]
enum SideEffect {
    Notify(Notification),
    SendEmail(OutgoingEmail),
    EvaluateAutomations { lead_id: String, status: String },
    Broadcast {
        channel: String,
        event: String,
        payload: Value,
    },
    SyncExternal {
        customer: Customer,
        organization_id: String,
    },
}

impl SideEffect {
    fn kind(&self) -> &'static str {
        match self {
            SideEffect::Notify(_) => "notify",
            SideEffect::SendEmail(_) => "send_email",
            SideEffect::EvaluateAutomations { .. } => "evaluate_automations",
            SideEffect::Broadcast { .. } => "broadcast",
            SideEffect::SyncExternal { .. } => "sync_external",
        }
    }
}

/// Handle used by lead operations to hand off side effects. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<SideEffect>,
}

struct Executor {
    store: Arc<dyn Store>,
    collaborators: Collaborators,
}

impl Dispatcher {
    /// Starts the worker on the current tokio runtime. The worker exits once every
    /// `Dispatcher` clone is dropped, the queue has drained and in-flight effects
    /// have finished.
    pub fn spawn(
        store: Arc<dyn Store>,
        collaborators: Collaborators,
        config: &DispatchConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let executor = Arc::new(Executor {
            store,
            collaborators,
        });
        let permits = u32::try_from(config.max_in_flight.max(1)).unwrap_or(u32::MAX);
        let limit = Arc::new(Semaphore::new(permits as usize));

        let worker = tokio::spawn(run_worker(rx, executor, limit, permits));

        (Self { tx }, worker)
    }

    /// Persists an in-app notification for `user_id`.
    pub fn notify(
        &self,
        user_id: &str,
        organization_id: &str,
        kind: &str,
        title: impl Into<String>,
        body: impl Into<String>,
        data: Value,
    ) {
        self.enqueue(SideEffect::Notify(Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            organization_id: organization_id.to_string(),
            kind: kind.to_string(),
            title: title.into(),
            body: body.into(),
            data,
            read: false,
            created_at: Utc::now(),
        }));
    }

    pub fn send_email(&self, to: &str, template: EmailTemplate, vars: &HashMap<String, String>) {
        self.enqueue(SideEffect::SendEmail(template.render(to, vars)));
    }

    pub fn evaluate_automations(&self, lead_id: &str, status: &str) {
        self.enqueue(SideEffect::EvaluateAutomations {
            lead_id: lead_id.to_string(),
            status: status.to_string(),
        });
    }

    pub fn broadcast(&self, channel: String, event: &str, payload: Value) {
        self.enqueue(SideEffect::Broadcast {
            channel,
            event: event.to_string(),
            payload,
        });
    }

    pub fn sync_external(&self, customer: Customer, organization_id: &str) {
        self.enqueue(SideEffect::SyncExternal {
            customer,
            organization_id: organization_id.to_string(),
        });
    }

    fn enqueue(&self, effect: SideEffect) {
        match self.tx.try_send(effect) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(effect)) => {
                error!("Side-effect queue full, dropping {}: {:?}", effect.kind(), effect);
            }
            Err(mpsc::error::TrySendError::Closed(effect)) => {
                error!("Side-effect worker stopped, dropping {}: {:?}", effect.kind(), effect);
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<SideEffect>,
    executor: Arc<Executor>,
    limit: Arc<Semaphore>,
    permits: u32,
) {
    while let Some(effect) = rx.recv().await {
        let Ok(permit) = limit.clone().acquire_owned().await else {
            break;
        };
        let executor = executor.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let kind = effect.kind();
            let task = tokio::spawn(async move { executor.execute(effect).await });

            match task.await {
                Ok(Ok(())) => debug!("Side effect {kind} completed"),
                Ok(Err(e)) => error!("Side effect {kind} failed: {e}"),
                Err(e) => error!("Side effect {kind} panicked: {e}"),
            }
        });
    }

    // Holding every permit means no effect is still running.
    let _ = limit.acquire_many(permits).await;
    debug!("Side-effect worker stopped");
}

impl Executor {
    async fn execute(&self, effect: SideEffect) -> Result<(), DispatchError> {
        let c = &self.collaborators;
        match effect {
            SideEffect::Notify(notification) => {
                self.store.create_notification(&notification)?;
                Ok(())
            }
            SideEffect::SendEmail(email) => c.email.send(&email).await,
            SideEffect::EvaluateAutomations { lead_id, status } => {
                c.automations.evaluate(&lead_id, &status).await
            }
            SideEffect::Broadcast {
                channel,
                event,
                payload,
            } => c.events.publish(&channel, &event, &payload).await,
            SideEffect::SyncExternal {
                customer,
                organization_id,
            } => c.org_sync.sync_customer(&customer, &organization_id).await,
        }
    }
}
