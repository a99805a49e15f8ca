//! Notifier collaborator - templated outbound messages (password reset mail).

use crate::errors::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, instrument};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Renders `template` with `vars` and delivers it to `recipient`.
    async fn send_templated(
        &self,
        subject: &str,
        template: &str,
        recipient: &str,
        vars: &HashMap<String, String>,
    ) -> Result<()>;
}

/// Replaces every `{{key}}` in `template` with its value. Unknown placeholders
/// are left as they are.
#[must_use]
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{key}}}}}"), value)
    })
}

/// Delivers messages to the log. Keeps the last rendered body per recipient so
/// callers can inspect what would have been sent.
#[derive(Debug)]
pub struct LogNotifier {
    timeout: Duration,
    outbox: Mutex<HashMap<String, String>>,
}

impl LogNotifier {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            outbox: Mutex::new(HashMap::new()),
        }
    }

    /// Last message body rendered for `recipient`.
    #[must_use]
    pub fn last_message(&self, recipient: &str) -> Option<String> {
        self.outbox
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(recipient)
            .cloned()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    #[instrument(skip(self, template, vars))]
    async fn send_templated(
        &self,
        subject: &str,
        template: &str,
        recipient: &str,
        vars: &HashMap<String, String>,
    ) -> Result<()> {
        if recipient.trim().is_empty() {
            return Err(Error::Internal {
                message: "Notifier recipient is empty".to_string(),
            });
        }
        let body = render_template(template, vars);
        super::with_deadline("notifier.send_templated", self.timeout, async {
            info!(subject, recipient, "outbound message:\n{body}");
            Ok(())
        })
        .await?;
        self.outbox
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(recipient.to_string(), body);
        Ok(())
    }
}
