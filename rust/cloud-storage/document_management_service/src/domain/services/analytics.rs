use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use file_conversion::{FileCategory, file_type::category_for_mime};
use model_vault::UserContext;
use strum::IntoEnumIterator;

use crate::domain::{
    error::{Result, VaultError},
    models::{CategoryCount, DEFAULT_USAGE_DAYS, MAX_USAGE_DAYS, MimeTypeCount, UsageQuery, UsageSummary},
    ports::AnalyticsRepository,
};

const TOP_UPLOADERS: i64 = 5;

/// Usage figures for managers and admins
#[derive(Debug, Clone)]
pub struct AnalyticsService<S> {
    storage: S,
}

impl<S: AnalyticsRepository> AnalyticsService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    #[tracing::instrument(skip(self, user), fields(user_id=%user.user_id), err)]
    pub async fn usage_summary(&self, user: &UserContext, query: UsageQuery) -> Result<UsageSummary> {
        if !user.is_manager_or_admin() {
            return Err(VaultError::forbidden("manager role required"));
        }
        let days = query.days.unwrap_or(DEFAULT_USAGE_DAYS);
        if !(1..=MAX_USAGE_DAYS).contains(&days) {
            return Err(VaultError::validation(format!(
                "days must be between 1 and {MAX_USAGE_DAYS}"
            )));
        }

        let since = Utc::now() - Duration::days(days);
        let facts = self
            .storage
            .usage_facts(user.organization_id, since, TOP_UPLOADERS)
            .await?;

        Ok(UsageSummary {
            days,
            document_count: facts.document_count,
            total_bytes: facts.total_bytes,
            trashed_count: facts.trashed_count,
            by_category: count_by_category(&facts.mime_types),
            uploads_per_day: facts.uploads_per_day,
            active_users: facts.active_users,
            top_uploaders: facts.top_uploaders,
            storage_by_department: facts.storage_by_department,
            folder_count: facts.folder_count,
            active_share_codes: facts.active_share_codes,
        })
    }
}

/// Folds mime type counts into every [FileCategory], empty ones included
fn count_by_category(mime_types: &[MimeTypeCount]) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<FileCategory, i64> =
        FileCategory::iter().map(|category| (category, 0)).collect();
    for mime_type in mime_types {
        *counts.entry(category_for_mime(&mime_type.mime_type)).or_default() += mime_type.count;
    }

    counts
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_is_reported() {
        let mime_types = vec![
            MimeTypeCount {
                mime_type: "application/pdf".to_string(),
                count: 3,
            },
            MimeTypeCount {
                mime_type: "image/png".to_string(),
                count: 2,
            },
            MimeTypeCount {
                mime_type: "image/jpeg".to_string(),
                count: 1,
            },
        ];

        let counts = count_by_category(&mime_types);
        assert_eq!(counts.len(), FileCategory::iter().count());

        let get = |category| {
            counts
                .iter()
                .find(|c| c.category == category)
                .map(|c| c.count)
        };
        assert_eq!(get(FileCategory::Pdf), Some(3));
        assert_eq!(get(FileCategory::Image), Some(3));
        assert_eq!(get(FileCategory::Archive), Some(0));
    }
}
