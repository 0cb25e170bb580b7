pub mod flags;
pub mod router;
pub mod wizard;

use thiserror::Error;

use crate::client::ClientError;

pub use flags::{FileFlagStore, FlagStore, FlagStoreError, MemoryFlagStore};
pub use router::{PendingCheck, RouteState, ScreenGroup, SessionRouter};
pub use wizard::OnboardingWizard;

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("onboarding step incomplete: {0}")]
    Incomplete(&'static str),

    #[error("onboarding is on step {actual}, expected step {expected}")]
    WrongStep { expected: u8, actual: u8 },

    #[error("failed to save profile: {0}")]
    Save(#[source] ClientError),

    #[error("no active session")]
    NoSession,
}

impl OnboardingError {
    /// Save failures are shown as "please try again"; the wizard keeps its data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OnboardingError::Save(_))
    }
}
