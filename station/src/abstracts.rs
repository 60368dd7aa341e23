//! Abstract submissions: status rules, category resolution and a cached
//! read service.

use crate::api::{ApiResult, AtlasApi};
use crate::cache::TtlCache;
use crate::error::AbstractError;
use crate::types::{EventId, Registration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Review status of an abstract
///
/// Moves `submitted → under-review → approved | rejected`; every change is
/// made by reviewers on the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbstractStatus {
    /// Waiting for review
    #[default]
    Submitted,
    /// Assigned to reviewers
    UnderReview,
    /// Accepted
    Approved,
    /// Declined
    Rejected,
}

impl AbstractStatus {
    /// Every status, in workflow order
    pub const ALL: [Self; 4] = [Self::Submitted, Self::UnderReview, Self::Approved, Self::Rejected];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderReview => "under-review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether review has concluded
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Whether the workflow allows moving to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Submitted, Self::UnderReview)
                | (Self::UnderReview, Self::Approved | Self::Rejected)
        )
    }

    /// Move to `next`
    ///
    /// # Errors
    ///
    /// Returns [`AbstractError::InvalidTransition`] if the workflow forbids it.
    pub fn transition(self, next: Self) -> Result<Self, AbstractError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AbstractError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for AbstractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Submitter reference, either a bare id or the populated registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmitterRef {
    /// Populated registration
    Populated(Box<Registration>),
    /// Registration id only
    Id(String),
}

/// A submitted abstract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Abstract {
    /// Database id
    #[serde(rename = "_id")]
    pub id: String,
    /// Submitter
    #[serde(default)]
    pub registration: Option<SubmitterRef>,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Author line as entered
    #[serde(default)]
    pub authors: String,
    /// Body text
    #[serde(default)]
    pub content: String,
    /// Category id or name
    #[serde(default)]
    pub category: Option<String>,
    /// Sub-topic within the category
    #[serde(default)]
    pub sub_topic: Option<String>,
    /// Uploaded file
    #[serde(default)]
    pub file_url: Option<String>,
    /// Review status
    #[serde(default)]
    pub status: AbstractStatus,
    /// Submission time
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Abstract {
    /// Whether the submitter may still change the abstract
    ///
    /// Editable while review has not concluded, submissions are open and the
    /// deadline has not passed.
    #[must_use]
    pub fn is_editable(&self, settings: &AbstractSettings, now: DateTime<Utc>) -> bool {
        self.ensure_editable(settings, now).is_ok()
    }

    /// Like [`Abstract::is_editable`], naming the rule that blocks editing
    ///
    /// # Errors
    ///
    /// The first rule that forbids editing.
    pub fn ensure_editable(&self, settings: &AbstractSettings, now: DateTime<Utc>) -> Result<(), AbstractError> {
        if self.status.is_terminal() {
            return Err(AbstractError::Locked(self.status.to_string()));
        }
        settings.accepting_submissions(now)
    }

    /// Display name of the abstract's category
    #[must_use]
    pub fn category_name(&self, settings: &AbstractSettings) -> Option<String> {
        let category = self.category.as_deref()?;
        Some(
            settings
                .resolve_category(category)
                .map_or_else(|_| category.to_string(), |c| c.name.clone()),
        )
    }
}

/// A category abstracts can be filed under
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbstractCategory {
    /// Database id
    #[serde(rename = "_id")]
    pub id: Option<String>,
    /// Display name
    pub name: String,
    /// Allowed sub-topics; empty means any
    pub sub_topics: Vec<String>,
}

/// Abstract submission rules of an event
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbstractSettings {
    /// Submissions switched on
    pub enabled: bool,
    /// Last moment submissions and edits are accepted
    pub deadline: Option<DateTime<Utc>>,
    /// Configured categories
    pub categories: Vec<AbstractCategory>,
    /// Upload limit in megabytes
    pub max_file_size: Option<u64>,
    /// Accepted file extensions (`pdf`, `.docx`, ...); empty means any
    pub allowed_file_types: Vec<String>,
}

impl AbstractSettings {
    /// Check that submissions are open at `now`
    ///
    /// # Errors
    ///
    /// [`AbstractError::SubmissionsDisabled`] or [`AbstractError::DeadlinePassed`].
    pub fn accepting_submissions(&self, now: DateTime<Utc>) -> Result<(), AbstractError> {
        if !self.enabled {
            return Err(AbstractError::SubmissionsDisabled);
        }
        if self.deadline.is_some_and(|deadline| now > deadline) {
            return Err(AbstractError::DeadlinePassed);
        }
        Ok(())
    }

    /// Find a category by id or (case-insensitive) name
    ///
    /// # Errors
    ///
    /// [`AbstractError::UnknownCategory`] if nothing matches.
    pub fn resolve_category(&self, category: &str) -> Result<&AbstractCategory, AbstractError> {
        let wanted = category.trim();
        self.categories
            .iter()
            .find(|c| c.id.as_deref() == Some(wanted))
            .or_else(|| self.categories.iter().find(|c| c.name.eq_ignore_ascii_case(wanted)))
            .ok_or_else(|| AbstractError::UnknownCategory(wanted.to_string()))
    }

    /// Resolve a category and check the sub-topic belongs to it
    ///
    /// Returns the canonical spelling of the sub-topic, or `None` when no
    /// sub-topic was given.
    ///
    /// # Errors
    ///
    /// [`AbstractError::UnknownCategory`] or [`AbstractError::UnknownSubTopic`].
    pub fn resolve_sub_topic(
        &self,
        category: &str,
        sub_topic: Option<&str>,
    ) -> Result<Option<String>, AbstractError> {
        let category = self.resolve_category(category)?;
        let Some(sub_topic) = sub_topic.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        if category.sub_topics.is_empty() {
            return Ok(Some(sub_topic.to_string()));
        }
        category
            .sub_topics
            .iter()
            .find(|s| s.eq_ignore_ascii_case(sub_topic))
            .cloned()
            .map(Some)
            .ok_or_else(|| AbstractError::UnknownSubTopic {
                category: category.name.clone(),
                sub_topic: sub_topic.to_string(),
            })
    }

    /// Check an upload against the file rules
    ///
    /// # Errors
    ///
    /// [`AbstractError::FileRejected`] naming the broken rule.
    pub fn check_file(&self, file_name: &str, size_bytes: u64) -> Result<(), AbstractError> {
        if let Some(max_mb) = self.max_file_size {
            if size_bytes > max_mb.saturating_mul(1024 * 1024) {
                return Err(AbstractError::FileRejected(format!(
                    "{file_name} is larger than {max_mb} MB"
                )));
            }
        }

        if self.allowed_file_types.is_empty() {
            return Ok(());
        }
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let allowed = self
            .allowed_file_types
            .iter()
            .any(|t| t.trim_start_matches('.').eq_ignore_ascii_case(&extension));
        if allowed {
            Ok(())
        } else {
            Err(AbstractError::FileRejected(format!(
                "{file_name} must be one of: {}",
                self.allowed_file_types.join(", ")
            )))
        }
    }
}

/// Count of abstracts per status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AbstractSummary {
    /// Awaiting review
    pub submitted: usize,
    /// In review
    pub under_review: usize,
    /// Accepted
    pub approved: usize,
    /// Declined
    pub rejected: usize,
}

impl AbstractSummary {
    /// Tally a list of abstracts
    #[must_use]
    pub fn of(abstracts: &[Abstract]) -> Self {
        abstracts.iter().fold(Self::default(), |mut summary, a| {
            match a.status {
                AbstractStatus::Submitted => summary.submitted += 1,
                AbstractStatus::UnderReview => summary.under_review += 1,
                AbstractStatus::Approved => summary.approved += 1,
                AbstractStatus::Rejected => summary.rejected += 1,
            }
            summary
        })
    }

    /// Total number of abstracts
    #[must_use]
    pub const fn total(&self) -> usize {
        self.submitted + self.under_review + self.approved + self.rejected
    }
}

/// Reads abstracts through a shared TTL cache
#[derive(Clone)]
pub struct AbstractService {
    api: Arc<dyn AtlasApi>,
    abstracts: Arc<TtlCache<EventId, Arc<Vec<Abstract>>>>,
    settings: Arc<TtlCache<EventId, AbstractSettings>>,
}

impl AbstractService {
    /// Service reading through the given caches
    #[must_use]
    pub fn new(
        api: Arc<dyn AtlasApi>,
        abstracts: Arc<TtlCache<EventId, Arc<Vec<Abstract>>>>,
        settings: Arc<TtlCache<EventId, AbstractSettings>>,
    ) -> Self {
        Self {
            api,
            abstracts,
            settings,
        }
    }

    /// Abstracts of an event, cached
    ///
    /// # Errors
    ///
    /// Returns the backend error on a cache miss that fails to load.
    #[tracing::instrument(skip(self), fields(%event))]
    pub async fn list(&self, event: &EventId) -> ApiResult<Arc<Vec<Abstract>>> {
        if let Some(cached) = self.abstracts.get(event) {
            tracing::debug!("Abstracts served from cache");
            return Ok(cached);
        }
        let fetched = Arc::new(self.api.abstracts(event.clone()).await?);
        self.abstracts.set(event.clone(), Arc::clone(&fetched));
        Ok(fetched)
    }

    /// Abstract rules of an event, cached
    ///
    /// # Errors
    ///
    /// Returns the backend error on a cache miss that fails to load.
    pub async fn settings(&self, event: &EventId) -> ApiResult<AbstractSettings> {
        if let Some(cached) = self.settings.get(event) {
            return Ok(cached);
        }
        let fetched = self.api.abstract_settings(event.clone()).await?;
        self.settings.set(event.clone(), fetched.clone());
        Ok(fetched)
    }

    /// Abstracts of an event with the given status
    ///
    /// # Errors
    ///
    /// Returns the backend error if the list cannot be loaded.
    pub async fn by_status(&self, event: &EventId, status: AbstractStatus) -> ApiResult<Vec<Abstract>> {
        Ok(self
            .list(event)
            .await?
            .iter()
            .filter(|a| a.status == status)
            .cloned()
            .collect())
    }

    /// Drop cached data of an event so the next read refetches
    pub fn invalidate(&self, event: &EventId) {
        self.abstracts.invalidate(event);
        self.settings.invalidate(event);
    }
}

impl fmt::Debug for AbstractService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbstractService")
            .field("abstracts", &self.abstracts)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn settings() -> AbstractSettings {
        serde_json::from_str(
            r#"{
                "enabled": true,
                "deadline": "2025-03-01T00:00:00Z",
                "categories": [
                    {"_id": "c1", "name": "Cardiology", "subTopics": ["Heart Failure", "Arrhythmia"]},
                    {"_id": "c2", "name": "Open Topics"}
                ],
                "maxFileSize": 5,
                "allowedFileTypes": [".pdf", "docx"]
            }"#,
        )
        .unwrap()
    }

    fn abstract_with(status: AbstractStatus) -> Abstract {
        serde_json::from_value(serde_json::json!({
            "_id": "a1",
            "registration": "r1",
            "title": "Outcomes",
            "category": "c1",
            "status": status.as_str(),
        }))
        .unwrap()
    }

    fn before_deadline() -> DateTime<Utc> {
        settings().deadline.unwrap() - Duration::days(1)
    }

    #[test]
    fn status_workflow() {
        use AbstractStatus::{Approved, Rejected, Submitted, UnderReview};
        assert_eq!(Submitted.transition(UnderReview), Ok(UnderReview));
        assert_eq!(UnderReview.transition(Approved), Ok(Approved));
        assert_eq!(UnderReview.transition(Rejected), Ok(Rejected));
        assert!(Submitted.transition(Approved).is_err());
        assert!(Approved.transition(UnderReview).is_err());
        assert!(Rejected.transition(Rejected).is_err());
    }

    #[test]
    fn status_wire_names() {
        let status: AbstractStatus = serde_json::from_str("\"under-review\"").unwrap();
        assert_eq!(status, AbstractStatus::UnderReview);
    }

    #[test]
    fn editable_until_review_concludes_or_deadline() {
        let settings = settings();

        assert!(abstract_with(AbstractStatus::Submitted).is_editable(&settings, before_deadline()));
        assert!(abstract_with(AbstractStatus::UnderReview).is_editable(&settings, before_deadline()));
        assert_eq!(
            abstract_with(AbstractStatus::Approved).ensure_editable(&settings, before_deadline()),
            Err(AbstractError::Locked("approved".to_string()))
        );

        let after = settings.deadline.unwrap() + Duration::seconds(1);
        assert_eq!(
            abstract_with(AbstractStatus::Submitted).ensure_editable(&settings, after),
            Err(AbstractError::DeadlinePassed)
        );

        let closed = AbstractSettings {
            enabled: false,
            ..settings
        };
        assert!(!abstract_with(AbstractStatus::Submitted).is_editable(&closed, before_deadline()));
    }

    #[test]
    fn categories_resolve_by_id_or_name() {
        let settings = settings();
        assert_eq!(settings.resolve_category("c1").unwrap().name, "Cardiology");
        assert_eq!(settings.resolve_category("open topics").unwrap().name, "Open Topics");
        assert!(matches!(
            settings.resolve_category("Neurology"),
            Err(AbstractError::UnknownCategory(_))
        ));
        assert_eq!(
            abstract_with(AbstractStatus::Submitted).category_name(&settings),
            Some("Cardiology".to_string())
        );
    }

    #[test]
    fn sub_topics_must_belong_to_category() {
        let settings = settings();
        assert_eq!(
            settings.resolve_sub_topic("c1", Some("heart failure")).unwrap(),
            Some("Heart Failure".to_string())
        );
        assert_eq!(settings.resolve_sub_topic("c1", None).unwrap(), None);
        assert_eq!(
            settings.resolve_sub_topic("Open Topics", Some("Anything")).unwrap(),
            Some("Anything".to_string())
        );
        assert!(matches!(
            settings.resolve_sub_topic("c1", Some("Oncology")),
            Err(AbstractError::UnknownSubTopic { .. })
        ));
    }

    #[test]
    fn file_rules() {
        let settings = settings();
        assert!(settings.check_file("paper.PDF", 1024).is_ok());
        assert!(settings.check_file("paper.docx", 1024).is_ok());
        assert!(settings.check_file("paper.exe", 1024).is_err());
        assert!(settings.check_file("paper.pdf", 6 * 1024 * 1024).is_err());
        assert!(AbstractSettings::default().check_file("anything", u64::MAX).is_ok());
    }

    #[test]
    fn summary_counts_statuses() {
        let abstracts = vec![
            abstract_with(AbstractStatus::Submitted),
            abstract_with(AbstractStatus::Submitted),
            abstract_with(AbstractStatus::Approved),
        ];
        let summary = AbstractSummary::of(&abstracts);
        assert_eq!(summary.submitted, 2);
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.total(), 3);
    }
}
