//! NATS subscriber for run triggers and health checks

use crate::config::NatsConfig;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Receives invocation events. With a queue group configured, replicas
/// share the trigger subject and each trigger is delivered to one of them.
pub struct TriggerConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl TriggerConsumer {
    pub fn new(client: Client, nats: &NatsConfig) -> Self {
        Self {
            client,
            subject: nats.trigger_subject.clone(),
            queue_group: nats.queue_group().map(str::to_string),
        }
    }

    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => {
                let subscriber = self
                    .client
                    .queue_subscribe(self.subject.clone(), group.clone())
                    .await?;
                info!(subject = %self.subject, queue_group = %group, "Joined trigger queue group");
                subscriber
            }
            None => {
                let subscriber = self.client.subscribe(self.subject.clone()).await?;
                info!(subject = %self.subject, "Subscribed to trigger subject");
                subscriber
            }
        };
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
