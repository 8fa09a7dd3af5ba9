//! NATS publisher for run results and health reports

use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::debug;

/// Publishes invocation responses
#[derive(Clone)]
pub struct ResultProducer {
    client: Client,
    subject: String,
}

impl ResultProducer {
    /// Create a new result producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a response on the result subject, and on `reply` when the
    /// triggering message asked for one
    pub async fn publish<T: Serialize>(&self, response: &T, reply: Option<Subject>) -> Result<()> {
        let payload = serde_json::to_vec(response)?;

        self.client
            .publish(self.subject.clone(), payload.clone().into())
            .await?;

        if let Some(reply) = reply {
            self.client.publish(reply.clone(), payload.into()).await?;
            debug!(reply = %reply, "Published reply");
        }

        self.client.flush().await?;
        debug!(subject = %self.subject, "Published invocation response");
        Ok(())
    }

    /// Reply to a request without touching the result subject
    pub async fn reply<T: Serialize>(&self, response: &T, reply: Subject) -> Result<()> {
        let payload = serde_json::to_vec(response)?;
        self.client.publish(reply, payload.into()).await?;
        self.client.flush().await?;
        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
