use super::{session, AuthError};
use crate::config::AuthConfig;
use crate::db::DbPool;
use crate::session::Session;

pub const OWNER_IDENTITY: &str = "owner";

/// Local stand-in for the hosted identity service: anonymous sign-in for
/// visitors and password sign-in for the site owner.
#[derive(Clone)]
pub struct LocalIdentityProvider {
    pool: DbPool,
    owner_password_hash: Option<String>,
    session_hours: u64,
}

/// A signed-in session and the token that carries it.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub token: String,
    pub session: Session,
}

impl LocalIdentityProvider {
    pub fn new(pool: DbPool, auth: &AuthConfig) -> Self {
        Self {
            pool,
            owner_password_hash: auth.owner_password_hash.clone(),
            session_hours: auth.session_hours,
        }
    }

    pub fn sign_in_anonymously(&self) -> Result<SignedIn, AuthError> {
        let identity = format!("anon-{}", uuid::Uuid::now_v7());
        let token = session::create_session(&self.pool, &identity, true, self.session_hours)?;
        tracing::debug!("Anonymous sign-in as {}", identity);
        Ok(SignedIn {
            token,
            session: Session::anonymous(identity),
        })
    }

    pub fn sign_in_with_password(&self, password: &str) -> Result<SignedIn, AuthError> {
        let hash = self
            .owner_password_hash
            .as_deref()
            .ok_or(AuthError::OwnerSignInDisabled)?;

        if !bcrypt::verify(password, hash).unwrap_or(false) {
            tracing::warn!("Owner sign-in failed: bad password");
            return Err(AuthError::InvalidCredentials);
        }

        let token =
            session::create_session(&self.pool, OWNER_IDENTITY, false, self.session_hours)?;
        tracing::info!("Owner signed in");
        Ok(SignedIn {
            token,
            session: Session::credentialed(OWNER_IDENTITY),
        })
    }

    /// The session behind a token; unknown tokens read as signed out.
    pub fn session_for(&self, token: &str) -> Result<Session, AuthError> {
        Ok(session::resolve_session(&self.pool, token)?.unwrap_or_default())
    }

    pub fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        session::delete_session(&self.pool, token)
    }

    pub fn purge_expired(&self) -> Result<usize, AuthError> {
        session::purge_expired(&self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;

    fn provider(password: Option<&str>) -> LocalIdentityProvider {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .unwrap();
        db::run_migrations(&pool).unwrap();
        let auth = AuthConfig {
            owner_password_hash: password.map(|p| bcrypt::hash(p, 4).unwrap()),
            ..AuthConfig::default()
        };
        LocalIdentityProvider::new(pool, &auth)
    }

    #[test]
    fn anonymous_sessions_cannot_edit() {
        let idp = provider(None);
        let signed_in = idp.sign_in_anonymously().unwrap();
        assert!(signed_in.session.is_anonymous);

        let resolved = idp.session_for(&signed_in.token).unwrap();
        assert_eq!(resolved, signed_in.session);
        assert!(!resolved.can_edit());
    }

    #[test]
    fn owner_password_grants_edit() {
        let idp = provider(Some("hunter2"));
        let signed_in = idp.sign_in_with_password("hunter2").unwrap();
        assert!(idp.session_for(&signed_in.token).unwrap().can_edit());

        idp.sign_out(&signed_in.token).unwrap();
        assert_eq!(
            idp.session_for(&signed_in.token).unwrap(),
            Session::signed_out()
        );
    }

    #[test]
    fn wrong_password_is_refused() {
        let idp = provider(Some("hunter2"));
        assert!(matches!(
            idp.sign_in_with_password("nope"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn password_sign_in_needs_configured_hash() {
        let idp = provider(None);
        assert!(matches!(
            idp.sign_in_with_password("anything"),
            Err(AuthError::OwnerSignInDisabled)
        ));
    }
}
