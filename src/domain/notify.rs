use serde::{Deserialize, Serialize};

/// Severity of a ledger notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Warning,
    Success,
}

impl NotifyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyLevel::Info => "info",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Success => "success",
        }
    }
}

impl std::fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub level: NotifyLevel,
}

/// Event sink for approval, rejection, late-payment and payoff messages.
/// The simulation UI is the real consumer; the CLI prints them.
pub trait Notifier {
    fn notify(&mut self, message: String, level: NotifyLevel);
}

/// Collects notifications so callers can display them after an operation.
#[derive(Debug, Default)]
pub struct VecNotifier {
    pub notifications: Vec<Notification>,
}

impl VecNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<Notification> {
        self.notifications
    }
}

impl Notifier for VecNotifier {
    fn notify(&mut self, message: String, level: NotifyLevel) {
        self.notifications.push(Notification { message, level });
    }
}
