// frostgate-server/src/auth.rs
// ============================================================================
// Module: Auth Boundary
// Description: Tenant-path, global-key, and scoped-key authorization (C2).
// Purpose: Gate every non-health route per the specification's §4.2
//          algorithm, emitting an audit event for every decision.
// Dependencies: frostgate-config, frostgate-core, frostgate-store, sha2
// ============================================================================

//! ## Overview
//! Three credential paths are tried in order: a tenant-scoped `X-Tenant-Id`
//! + `X-API-Key` pair, the global key from [`FrostgateConfig`], and a scoped
//! `api_keys` row matched by the sha256 hash of its secret segment. Every
//! outcome — allow or deny — is handed to an [`crate::audit::AuditSink`] by
//! the caller; this module only decides.

// ============================================================================
// SECTION: Imports
// ============================================================================

use frostgate_config::FrostgateConfig;
use frostgate_core::hashing::HashAlgorithm;
use frostgate_core::hashing::hash_bytes;
use frostgate_store::DecisionStore;
use thiserror::Error;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Credentials presented by an inbound request, read from headers.
#[derive(Debug, Clone, Default)]
pub struct PresentedCredentials {
    /// `X-Tenant-Id` header value, when present.
    pub tenant_id: Option<String>,
    /// `X-API-Key` header value, when present.
    pub api_key: Option<String>,
}

/// Outcome of a successful authorization.
#[derive(Debug, Clone)]
pub struct AuthDecision {
    /// Tenant the request authenticated as, when tenant-scoped.
    pub tenant_id: Option<String>,
    /// sha256 fingerprint of the presented credential, for audit logging.
    pub credential_fingerprint: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authorization failure kinds, matching the specification's §4.2 list.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was presented at all.
    #[error("missing credentials")]
    AuthMissing,
    /// A credential was presented but did not match.
    #[error("invalid credentials")]
    AuthInvalid,
    /// The tenant exists but is not active.
    #[error("tenant revoked or suspended")]
    TenantRevoked,
    /// The credential is valid but lacks the required scope.
    #[error("insufficient scope")]
    ScopeForbidden,
}

impl AuthError {
    /// Returns the minimal detail string surfaced in the HTTP body.
    #[must_use]
    pub const fn detail(self) -> &'static str {
        match self {
            Self::AuthMissing | Self::AuthInvalid => "Invalid or missing API key",
            Self::TenantRevoked => "Tenant is not active",
            Self::ScopeForbidden => "Insufficient scope for this route",
        }
    }
}

// ============================================================================
// SECTION: Authorization
// ============================================================================

/// Authorizes a request per §4.2: tenant path first, then global key, then a
/// scoped key match requiring `required_scope`.
///
/// # Errors
///
/// Returns [`AuthError`] for every failure kind the specification names.
pub fn authorize(
    credentials: &PresentedCredentials,
    config: &FrostgateConfig,
    store: &DecisionStore,
    required_scope: &str,
) -> Result<AuthDecision, AuthError> {
    if let Some(tenant_id) = &credentials.tenant_id {
        return authorize_tenant_path(tenant_id, credentials.api_key.as_deref(), store);
    }

    if !config.auth_enabled {
        return Ok(AuthDecision { tenant_id: None, credential_fingerprint: None });
    }

    let Some(presented) = credentials.api_key.as_deref() else {
        return Err(AuthError::AuthMissing);
    };

    if presented == config.api_key {
        return Ok(AuthDecision {
            tenant_id: None,
            credential_fingerprint: Some(fingerprint(presented)),
        });
    }

    authorize_scoped_key(presented, store, required_scope)
}

fn authorize_tenant_path(
    tenant_id: &str,
    api_key: Option<&str>,
    store: &DecisionStore,
) -> Result<AuthDecision, AuthError> {
    let tenant = store
        .find_tenant(tenant_id)
        .ok()
        .flatten()
        .ok_or(AuthError::AuthInvalid)?;
    if !tenant.is_active() {
        return Err(AuthError::TenantRevoked);
    }
    let presented = api_key.ok_or(AuthError::AuthMissing)?;
    if presented != tenant.api_key {
        return Err(AuthError::AuthInvalid);
    }
    Ok(AuthDecision {
        tenant_id: Some(tenant.id),
        credential_fingerprint: Some(fingerprint(presented)),
    })
}

fn authorize_scoped_key(
    presented: &str,
    store: &DecisionStore,
    required_scope: &str,
) -> Result<AuthDecision, AuthError> {
    let secret = scoped_key_secret(presented).ok_or(AuthError::AuthInvalid)?;
    let key_hash = fingerprint(secret);
    let record = store.find_api_key_by_hash(&key_hash).ok().flatten().ok_or(AuthError::AuthInvalid)?;
    if !record.is_active() {
        return Err(AuthError::AuthInvalid);
    }
    // An empty `required_scope` means the route only requires a valid
    // credential (e.g. /status), not a specific grant.
    if !required_scope.is_empty() && !record.has_scope(required_scope) {
        return Err(AuthError::ScopeForbidden);
    }
    Ok(AuthDecision { tenant_id: record.tenant_id, credential_fingerprint: Some(key_hash) })
}

/// Scoped keys have the form `<prefix>.<token>.<secret>`; only the final
/// segment is hashed and matched.
fn scoped_key_secret(key: &str) -> Option<&str> {
    key.rsplit_once('.').map(|(_, secret)| secret).filter(|secret| !secret.is_empty())
}

fn fingerprint(secret: &str) -> String {
    hash_bytes(HashAlgorithm::Sha256, secret.as_bytes()).value
}

#[cfg(test)]
mod tests {
    use super::*;
    use frostgate_store::SqliteStoreConfig;
    use frostgate_store::TenantRecord;

    fn test_config(auth_enabled: bool) -> FrostgateConfig {
        frostgate_config::resolve_from(|_| None, frostgate_config::ConfigOverrides {
            auth_enabled: Some(auth_enabled),
        })
        .expect("config resolves")
        .0
    }

    fn test_store() -> (tempfile::TempDir, DecisionStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store =
            DecisionStore::open(&SqliteStoreConfig::new(dir.path().join("frostgate.db")))
                .expect("open store");
        (dir, store)
    }

    #[test]
    fn auth_disabled_passes_without_credentials() {
        let config = test_config(false);
        let (_dir, store) = test_store();
        let decision =
            authorize(&PresentedCredentials::default(), &config, &store, "defend:write")
                .expect("passes");
        assert!(decision.tenant_id.is_none());
    }

    #[test]
    fn global_key_bypasses_scope_check() {
        let config = test_config(true);
        let (_dir, store) = test_store();
        let credentials =
            PresentedCredentials { tenant_id: None, api_key: Some(config.api_key.clone()) };
        authorize(&credentials, &config, &store, "anything:unscoped").expect("global key passes");
    }

    #[test]
    fn missing_credentials_when_auth_enabled_is_rejected() {
        let config = test_config(true);
        let (_dir, store) = test_store();
        let err = authorize(&PresentedCredentials::default(), &config, &store, "defend:write")
            .expect_err("must fail");
        assert_eq!(err, AuthError::AuthMissing);
    }

    #[test]
    fn tenant_path_requires_active_status_and_matching_key() {
        let config = test_config(false);
        let (_dir, store) = test_store();
        store
            .upsert_tenant(&TenantRecord {
                id: "acme".to_string(),
                name: "Acme".to_string(),
                api_key: "tenant-secret".to_string(),
                status: "suspended".to_string(),
                created_at_ms: 0,
            })
            .expect("seed tenant");
        let credentials = PresentedCredentials {
            tenant_id: Some("acme".to_string()),
            api_key: Some("tenant-secret".to_string()),
        };
        let err = authorize(&credentials, &config, &store, "defend:write").expect_err("suspended");
        assert_eq!(err, AuthError::TenantRevoked);
    }

    #[test]
    fn scoped_key_enforces_required_scope() {
        let config = test_config(true);
        let (_dir, store) = test_store();
        let secret = "topsecret";
        let hash = fingerprint(secret);
        store
            .insert_api_key("ci", &hash, &["defend:read".to_string()], None)
            .expect("seed key");
        let credentials = PresentedCredentials {
            tenant_id: None,
            api_key: Some(format!("fg.key1.{secret}")),
        };
        let err =
            authorize(&credentials, &config, &store, "defend:write").expect_err("wrong scope");
        assert_eq!(err, AuthError::ScopeForbidden);

        let ok = authorize(&credentials, &config, &store, "defend:read").expect("correct scope");
        assert!(ok.tenant_id.is_none());
    }
}
