pub mod identity;
pub mod session;

use thiserror::Error;

pub use identity::{LocalIdentityProvider, SignedIn, OWNER_IDENTITY};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Owner sign-in is not configured")]
    OwnerSignInDisabled,
}
