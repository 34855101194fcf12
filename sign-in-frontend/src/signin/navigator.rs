use std::sync::Mutex;

/// Where the flow sends the user next: an app route or an external URL.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// Records the last navigation so a request handler can answer with a redirect.
#[derive(Debug, Default)]
pub struct PendingNavigation {
    target: Mutex<Option<String>>,
}

impl PendingNavigation {
    pub fn take(&self) -> Option<String> {
        match self.target.lock() {
            Ok(mut target) => target.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Navigator for PendingNavigation {
    fn navigate(&self, target: &str) {
        match self.target.lock() {
            Ok(mut current) => *current = Some(target.to_string()),
            Err(poisoned) => *poisoned.into_inner() = Some(target.to_string()),
        }
    }
}
