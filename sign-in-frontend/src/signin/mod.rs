//! Sign-in orchestration: environment detection, host single sign-on with a
//! single fallback to the standalone identity client, and the current-user
//! cell it writes.

mod navigator;
mod orchestrator;
mod user_store;

pub use navigator::{Navigator, PendingNavigation};
pub use orchestrator::{SignInError, SignInOrchestrator, SignInOutcome, SignInPhase};
pub use user_store::{CurrentUser, UserStore};
