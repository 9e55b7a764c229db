//! Scope-based bidirectional authorization.
//!
//! Both checks are mandatory before forwarding and both fail closed. The
//! caller check runs before path resolution, the target check after, and the
//! two report different failure classes on purpose: an unknown caller is
//! `Forbidden` (the response must not disclose which caller ids are
//! registered), while an unresolvable target path is `NotFound` because the
//! resolver itself already failed to produce a match.

use crate::error::GatewayError;
use crate::registry::{SCOPE_RECEIVE, SCOPE_REQUEST, ServiceRecord, ServiceStore};

/// Verify the caller identity may issue requests through the gateway.
///
/// `caller` is the value of the identity header, or `None` when the header
/// was absent at the transport boundary. Unknown callers and callers without
/// the `request` scope are rejected with the same message.
pub async fn authorize_caller(
    store: &dyn ServiceStore,
    caller: Option<&str>,
    identity_header: &str,
) -> Result<ServiceRecord, GatewayError> {
    let caller_id = caller.ok_or_else(|| {
        GatewayError::Unauthenticated(identity_header.to_string())
    })?;

    let record = store
        .get(caller_id)
        .await?
        .filter(|record| record.has_scope(SCOPE_REQUEST))
        .ok_or_else(|| {
            GatewayError::Forbidden(format!(
                "caller '{caller_id}' is not permitted to issue requests through the gateway"
            ))
        })?;

    Ok(record)
}

/// Verify the resolved target accepts proxied requests.
pub fn authorize_target(record: &ServiceRecord) -> Result<(), GatewayError> {
    if !record.has_scope(SCOPE_RECEIVE) {
        return Err(GatewayError::Forbidden(format!(
            "service '{}' does not accept proxied requests",
            record.id
        )));
    }
    Ok(())
}
