//! Per-tenant access gate.
//!
//! Every knowledge-base operation except creation resolves the caller and the
//! knowledge base owner before any ingestion or query logic runs. A knowledge
//! base that exists but belongs to someone else yields `Forbidden` (403), not
//! `NotFound`.

use tracing::debug;

use crate::error::{KbError, Result};
use crate::models::{KbId, UserId};
use crate::store::Store;

/// Decide access from an optional caller and an optional owner.
///
/// | caller | owner | result |
/// |--------|-------|--------|
/// | `None` | any | `Unauthenticated` |
/// | `Some` | `None` | `NotFound` |
/// | `Some(a)` | `Some(b)`, `a != b` | `Forbidden` |
/// | `Some(a)` | `Some(a)` | `Ok(a)` |
pub fn authorize(caller: Option<UserId>, owner: Option<UserId>, kb_id: KbId) -> Result<UserId> {
    let caller = caller.ok_or(KbError::Unauthenticated)?;
    match owner {
        None => Err(KbError::NotFound(format!("knowledge base {}", kb_id))),
        Some(owner) if owner == caller => Ok(caller),
        Some(_) => Err(KbError::Forbidden),
    }
}

/// Require that `caller` owns `kb_id`.
///
/// An anonymous caller is rejected before the store is consulted.
pub async fn require_owner(store: &dyn Store, caller: Option<UserId>, kb_id: KbId) -> Result<UserId> {
    let caller = caller.ok_or(KbError::Unauthenticated)?;
    let owner = store.kb_owner(kb_id).await?;
    let result = authorize(Some(caller), owner, kb_id);
    if let Err(e) = &result {
        debug!(kb_id, caller, error = %e, "access denied");
    }
    result
}
