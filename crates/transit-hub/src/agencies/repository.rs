use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Agency, AgencyId, DocumentId, Station, StationId, VerificationDocument};

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Agencies own their stations and verification documents, so all three live behind one trait.
/// Every station or document write also bumps the owning agency's `version` atomically with the
/// write, so a publication decision evaluated against an older set fails its compare-and-swap.
pub trait AgencyRepository: Send + Sync {
    fn insert_agency(&self, agency: Agency) -> Result<Agency, RepositoryError>;
    fn fetch_agency(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError>;
    fn list_agencies(&self) -> Result<Vec<Agency>, RepositoryError>;
    /// Compare-and-swap write. Succeeds only when the stored version still equals
    /// `agency.version`; the stored copy is returned with its version bumped.
    fn update_agency(&self, agency: Agency) -> Result<Agency, RepositoryError>;

    fn insert_station(&self, station: Station) -> Result<Station, RepositoryError>;
    fn fetch_station(&self, id: &StationId) -> Result<Option<Station>, RepositoryError>;
    fn delete_station(&self, id: &StationId) -> Result<Station, RepositoryError>;
    fn list_stations(&self, agency_id: &AgencyId) -> Result<Vec<Station>, RepositoryError>;
    fn count_stations(&self, agency_id: &AgencyId) -> Result<usize, RepositoryError>;

    fn insert_document(
        &self,
        document: VerificationDocument,
    ) -> Result<VerificationDocument, RepositoryError>;
    fn update_document(&self, document: VerificationDocument) -> Result<(), RepositoryError>;
    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<VerificationDocument>, RepositoryError>;
    fn delete_document(&self, id: &DocumentId) -> Result<VerificationDocument, RepositoryError>;
    /// Documents of one agency in upload order, oldest first.
    fn list_documents(
        &self,
        agency_id: &AgencyId,
    ) -> Result<Vec<VerificationDocument>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("agency was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (e-mail adapter or similar).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notice: ReviewNotice) -> Result<(), NotificationError>;
}

/// Notification payload so routes and tests can assert integration boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewNotice {
    pub template: String,
    pub agency_id: AgencyId,
    pub details: BTreeMap<String, String>,
}

impl ReviewNotice {
    pub fn new(template: &str, agency_id: AgencyId) -> Self {
        Self {
            template: template.to_string(),
            agency_id,
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
