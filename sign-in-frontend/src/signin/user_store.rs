use crate::models::User;
use std::sync::RwLock;

/// Application-wide current-user cell.
///
/// The sign-in orchestrator is its only writer; everything else reads.
pub trait UserStore: Send + Sync {
    fn current(&self) -> Option<User>;
    fn set(&self, user: User);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct CurrentUser {
    cell: RwLock<Option<User>>,
}

impl UserStore for CurrentUser {
    fn current(&self) -> Option<User> {
        match self.cell.read() {
            Ok(user) => user.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set(&self, user: User) {
        match self.cell.write() {
            Ok(mut cell) => *cell = Some(user),
            Err(poisoned) => *poisoned.into_inner() = Some(user),
        }
    }

    fn clear(&self) {
        match self.cell.write() {
            Ok(mut cell) => *cell = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}
