use model_vault::{Page, UserContext};

use crate::domain::{
    error::{Result, VaultError},
    models::{AuditLog, AuditQuery},
    ports::AuditLogRepository,
};

/// Records and queries the audit log
#[derive(Debug, Clone)]
pub struct AuditService<S> {
    storage: S,
}

impl<S: AuditLogRepository> AuditService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Stores the entry. A failure is logged and otherwise ignored so the audited action still
    /// succeeds.
    pub async fn record(&self, log: AuditLog) {
        if let Err(e) = self.storage.insert_audit_log(&log).await {
            tracing::error!(
                error=?e,
                action=%log.action,
                entity_id=?log.entity_id,
                "unable to record audit log"
            );
        }
    }

    /// Admin only, newest first
    #[tracing::instrument(skip(self, user), fields(user_id=%user.user_id), err)]
    pub async fn query(&self, user: &UserContext, query: AuditQuery) -> Result<Page<AuditLog>> {
        if !user.is_admin() {
            return Err(VaultError::forbidden("only admins may read the audit log"));
        }
        if let (Some(from), Some(to)) = (query.from, query.to)
            && from >= to
        {
            return Err(VaultError::validation("from must be before to"));
        }

        let pagination = query.pagination();
        let (items, total) = self
            .storage
            .query_audit_logs(user.organization_id, &query)
            .await?;
        Ok(Page::new(items, total, &pagination))
    }
}
