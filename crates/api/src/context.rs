use stockledger_core::{TenantId, UserId};

/// Tenant and acting user of a request.
///
/// Inserted by [`crate::middleware::tenant_middleware`]; every domain route requires it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    actor: Option<UserId>,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, actor: Option<UserId>) -> Self {
        Self { tenant_id, actor }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }
}
