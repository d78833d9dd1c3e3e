// frostgate-server/src/routes/mod.rs
// ============================================================================
// Module: Routes
// Description: HTTP handler modules and shared header-extraction helpers.
// Purpose: Wire C2 (auth) into every route's entry point consistently.
// Dependencies: axum
// ============================================================================

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod decisions;
pub mod defend;
pub mod dev_seed;
pub mod feed;
pub mod health;

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;

use crate::auth::PresentedCredentials;

// ============================================================================
// SECTION: Header Extraction
// ============================================================================

/// Extracts `X-Tenant-Id`/`X-API-Key` header values into credentials for the
/// auth boundary; header names are matched case-insensitively by axum's
/// `HeaderMap` itself.
#[must_use]
pub fn credentials_from_headers(headers: &HeaderMap) -> PresentedCredentials {
    PresentedCredentials {
        tenant_id: header_str(headers, "x-tenant-id"),
        api_key: header_str(headers, "x-api-key"),
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_string)
}
