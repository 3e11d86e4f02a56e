//! Transient user-facing notifications.
//!
//! These are the only feedback a reviewer gets that an asynchronous action
//! landed, so they are part of the engine's observable contract rather than
//! decoration. Consumers plug in their own [`Notifier`]; the default one just
//! logs through `tracing`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotifyLevel,
    pub title: String,
    pub body: Option<String>,
}

impl Notification {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            level: NotifyLevel::Success,
            title: title.into(),
            body: None,
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self {
            level: NotifyLevel::Info,
            title: title.into(),
            body: None,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self {
            level: NotifyLevel::Error,
            title: title.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Default notifier that forwards notifications to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let body = notification.body.as_deref().unwrap_or("");
        match notification.level {
            NotifyLevel::Error => {
                tracing::warn!(title = %notification.title, %body, "notification")
            }
            _ => tracing::info!(title = %notification.title, %body, "notification"),
        }
    }
}
