//! Tenant context for a single unit of work.
//!
//! The context lives in a tokio task-local slot. It is established with
//! [`scope`] for exactly one future and disappears when that future finishes;
//! concurrently running tasks never observe each other's tenant. Work spawned
//! onto another task does not inherit the context and must open its own scope.

use std::future::Future;

use tracing::Instrument;

use crate::core::DispatchError;
use crate::util::ids::TenantId;

tokio::task_local! {
    static CURRENT_TENANT: TenantContext;
}

/// The tenant a unit of work is authorized for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    /// Build a context for `tenant_id`. Blank ids are rejected.
    pub fn begin(tenant_id: impl Into<TenantId>) -> Result<Self, DispatchError> {
        let tenant_id = tenant_id.into();
        if tenant_id.as_str().trim().is_empty() {
            return Err(DispatchError::IsolationViolation(
                "tenant id must not be blank".into(),
            ));
        }
        Ok(Self { tenant_id })
    }

    /// Tenant this context scopes to.
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// The context of the running unit of work.
    ///
    /// Fails closed with `IsolationViolation` when no context is established.
    pub fn current() -> Result<Self, DispatchError> {
        CURRENT_TENANT.try_with(Clone::clone).map_err(|_| {
            DispatchError::IsolationViolation("no tenant context established".into())
        })
    }

    /// Whether the running task has a tenant context.
    pub fn is_established() -> bool {
        CURRENT_TENANT.try_with(|_| ()).is_ok()
    }
}

/// Run `fut` as a unit of work scoped to `ctx`.
///
/// Re-entering with the same tenant is allowed. Opening a scope for a
/// different tenant inside an existing one is rejected.
pub async fn scope<F>(ctx: TenantContext, fut: F) -> Result<F::Output, DispatchError>
where
    F: Future,
{
    if let Ok(outer) = TenantContext::current() {
        if outer != ctx {
            tracing::warn!(
                outer = %outer.tenant_id,
                inner = %ctx.tenant_id,
                "rejected nested tenant scope"
            );
            return Err(DispatchError::IsolationViolation(format!(
                "tenant scope for {} opened inside scope for {}",
                ctx.tenant_id, outer.tenant_id
            )));
        }
    }
    let span = tracing::info_span!("tenant", tenant = %ctx.tenant_id);
    Ok(CURRENT_TENANT.scope(ctx, fut).instrument(span).await)
}
