use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    Agency, AgencyId, DocumentId, DocumentStatus, NewAgency, NewDocument, NewStation,
    ReviewDecision, Station, StationId, ValidationError, VerificationDocument,
};
use super::eligibility::{evaluate_publication, Eligibility, IneligibilityReason};
use super::profile::AgencyProfileView;
use super::repository::{
    AgencyRepository, NotificationError, NotificationPublisher, RepositoryError, ReviewNotice,
};
use crate::config::PublishingConfig;

/// Service composing the agency repository, the eligibility rules, and outbound notices.
///
/// Publication state is only ever written here. Every document save is followed by an explicit
/// [`AgencyRegistryService::update_publishing_status`] call; station changes and document
/// deletions are not, so `is_published` can lag behind until the next document save.
pub struct AgencyRegistryService<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
    config: PublishingConfig,
}

/// Result of a document review, including the publication flag after the recompute.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReviewOutcome {
    pub document: VerificationDocument,
    pub is_published: bool,
}

impl<R, N> AgencyRegistryService<R, N>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(repository: Arc<R>, notifications: Arc<N>, config: PublishingConfig) -> Self {
        Self {
            repository,
            notifications,
            config,
        }
    }

    pub fn config(&self) -> &PublishingConfig {
        &self.config
    }

    /// Register a new agency. Agencies start unpublished and unverified.
    pub fn create_agency(&self, input: NewAgency) -> Result<Agency, AgencyServiceError> {
        input.validate()?;
        let now = Utc::now();
        let agency = Agency {
            id: AgencyId::new(),
            name: input.name.trim().to_string(),
            contact_email: input.contact_email.trim().to_string(),
            is_published: false,
            is_verified: false,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert_agency(agency)?;
        info!(agency_id = %stored.id, name = %stored.name, "agency registered");
        Ok(stored)
    }

    pub fn agency(&self, agency_id: &AgencyId) -> Result<Agency, AgencyServiceError> {
        let agency = self
            .repository
            .fetch_agency(agency_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(agency)
    }

    pub fn list_agencies(&self, published_only: bool) -> Result<Vec<Agency>, AgencyServiceError> {
        let agencies = self.repository.list_agencies()?;
        Ok(agencies
            .into_iter()
            .filter(|agency| !published_only || agency.is_published)
            .collect())
    }

    /// Set the administrative verification flag. Independent of publication.
    pub fn set_verified(
        &self,
        agency_id: &AgencyId,
        verified: bool,
    ) -> Result<Agency, AgencyServiceError> {
        self.update_with_retry(agency_id, |agency| {
            if agency.is_verified == verified {
                return Ok(false);
            }
            agency.is_verified = verified;
            Ok(true)
        })
    }

    pub fn add_station(
        &self,
        agency_id: &AgencyId,
        input: NewStation,
    ) -> Result<Station, AgencyServiceError> {
        input.validate()?;
        self.agency(agency_id)?;

        let station = Station {
            id: StationId::new(),
            agency_id: *agency_id,
            name: input.name.trim().to_string(),
            city: input.city.trim().to_string(),
            address: input.address.trim().to_string(),
            created_at: Utc::now(),
        };
        let stored = self.repository.insert_station(station)?;
        debug!(%agency_id, station_id = %stored.id, "station added; publication flag not recomputed");
        Ok(stored)
    }

    pub fn remove_station(
        &self,
        agency_id: &AgencyId,
        station_id: &StationId,
    ) -> Result<Station, AgencyServiceError> {
        let station = self
            .repository
            .fetch_station(station_id)?
            .ok_or(RepositoryError::NotFound)?;
        if station.agency_id != *agency_id {
            return Err(ValidationError::ForeignStation(*agency_id).into());
        }

        let removed = self.repository.delete_station(station_id)?;
        debug!(%agency_id, %station_id, "station removed; publication flag not recomputed");
        Ok(removed)
    }

    pub fn stations(&self, agency_id: &AgencyId) -> Result<Vec<Station>, AgencyServiceError> {
        self.agency(agency_id)?;
        Ok(self.repository.list_stations(agency_id)?)
    }

    /// Upload a verification document (status `pending`) and recompute publication.
    pub fn submit_document(
        &self,
        agency_id: &AgencyId,
        input: NewDocument,
    ) -> Result<VerificationDocument, AgencyServiceError> {
        let document_type = input.validate()?;
        self.agency(agency_id)?;

        let document = VerificationDocument {
            id: DocumentId::new(),
            agency_id: *agency_id,
            document_type,
            status: DocumentStatus::Pending,
            remarks: None,
            file_url: input.file_url.trim().to_string(),
            uploaded_at: Utc::now(),
            reviewed_at: None,
        };
        let stored = self.repository.insert_document(document)?;
        info!(%agency_id, document_id = %stored.id, document_type = %document_type, "verification document submitted");

        self.update_publishing_status(agency_id)?;
        Ok(stored)
    }

    /// Apply an administrator review, recompute publication, and notify the agency.
    pub fn review_document(
        &self,
        document_id: &DocumentId,
        decision: ReviewDecision,
    ) -> Result<DocumentReviewOutcome, AgencyServiceError> {
        let mut document = self
            .repository
            .fetch_document(document_id)?
            .ok_or(RepositoryError::NotFound)?;

        let template = match &decision {
            ReviewDecision::Approve => {
                document.status = DocumentStatus::Approved;
                "document_approved"
            }
            ReviewDecision::Reject { remarks } => {
                document.status = DocumentStatus::Rejected;
                document.remarks = Some(required_remarks(remarks)?);
                "document_rejected"
            }
            ReviewDecision::Remark { remarks } => {
                document.remarks = Some(required_remarks(remarks)?);
                "document_remarked"
            }
        };
        document.reviewed_at = Some(Utc::now());
        self.repository.update_document(document.clone())?;
        info!(
            agency_id = %document.agency_id,
            %document_id,
            action = decision.label(),
            status = %document.status,
            "verification document reviewed"
        );

        let is_published = self.update_publishing_status(&document.agency_id)?;

        let mut notice = ReviewNotice::new(template, document.agency_id)
            .with_detail("document_id", document.id.to_string())
            .with_detail("document_type", document.document_type.label())
            .with_detail("status", document.status.label());
        if let Some(remarks) = &document.remarks {
            notice = notice.with_detail("remarks", remarks.clone());
        }
        self.notifications.publish(notice)?;

        Ok(DocumentReviewOutcome {
            document,
            is_published,
        })
    }

    /// Delete a document. Deletion is not a save and does not recompute publication.
    pub fn remove_document(
        &self,
        agency_id: &AgencyId,
        document_id: &DocumentId,
    ) -> Result<VerificationDocument, AgencyServiceError> {
        let document = self
            .repository
            .fetch_document(document_id)?
            .ok_or(RepositoryError::NotFound)?;
        if document.agency_id != *agency_id {
            return Err(ValidationError::ForeignDocument(*agency_id).into());
        }

        let removed = self.repository.delete_document(document_id)?;
        debug!(%agency_id, %document_id, "document removed; publication flag not recomputed");
        Ok(removed)
    }

    pub fn documents(
        &self,
        agency_id: &AgencyId,
    ) -> Result<Vec<VerificationDocument>, AgencyServiceError> {
        self.agency(agency_id)?;
        Ok(self.repository.list_documents(agency_id)?)
    }

    /// Evaluate the publish gate. Storage failures are returned as errors, never as
    /// `Ineligible`.
    pub fn can_be_published(
        &self,
        agency_id: &AgencyId,
    ) -> Result<Eligibility, AgencyServiceError> {
        self.agency(agency_id)?;
        self.evaluate(agency_id)
    }

    /// Recompute eligibility and persist the publication flag when it changed.
    ///
    /// Without `auto_publish` the recompute only ever lowers the flag; raising it is left to
    /// [`AgencyRegistryService::publish`]. Returns the stored flag after the recompute.
    pub fn update_publishing_status(
        &self,
        agency_id: &AgencyId,
    ) -> Result<bool, AgencyServiceError> {
        let auto_publish = self.config.auto_publish;
        let mut previous = None;

        let agency = self.update_with_retry(agency_id, |agency| {
            previous = None;
            let eligible = self.evaluate(agency_id)?.is_eligible();
            let target = if auto_publish {
                eligible
            } else {
                agency.is_published && eligible
            };
            if agency.is_published == target {
                return Ok(false);
            }
            previous = Some(agency.is_published);
            agency.is_published = target;
            Ok(true)
        })?;

        match previous {
            Some(true) => {
                info!(%agency_id, "agency no longer meets publishing requirements; unpublished");
                self.notifications
                    .publish(ReviewNotice::new("agency_unpublished", *agency_id))?;
            }
            Some(false) => {
                info!(%agency_id, "agency published by recompute");
                self.notifications
                    .publish(ReviewNotice::new("agency_published", *agency_id))?;
            }
            None => debug!(%agency_id, is_published = agency.is_published, "publication flag unchanged"),
        }

        Ok(agency.is_published)
    }

    /// Explicit publish transition. Fails with `PreconditionFailed` unless the agency is
    /// currently eligible; publishing an already published agency is a no-op.
    pub fn publish(&self, agency_id: &AgencyId) -> Result<Agency, AgencyServiceError> {
        let mut transitioned = false;

        let agency = self.update_with_retry(agency_id, |agency| {
            transitioned = false;
            if let Eligibility::Ineligible(reason) = self.evaluate(agency_id)? {
                return Err(AgencyServiceError::PreconditionFailed(reason));
            }
            if agency.is_published {
                return Ok(false);
            }
            agency.is_published = true;
            transitioned = true;
            Ok(true)
        })?;

        if transitioned {
            info!(%agency_id, "agency published");
            self.notifications
                .publish(ReviewNotice::new("agency_published", *agency_id))?;
        }
        Ok(agency)
    }

    /// Dashboard view of an agency: both completion steps plus the publish gate.
    pub fn profile(&self, agency_id: &AgencyId) -> Result<AgencyProfileView, AgencyServiceError> {
        let agency = self.agency(agency_id)?;
        let stations_count = self.repository.count_stations(agency_id)?;
        let documents = self.repository.list_documents(agency_id)?;
        let eligibility = evaluate_publication(stations_count, &documents);
        Ok(AgencyProfileView::build(
            agency,
            stations_count,
            &documents,
            &eligibility,
        ))
    }

    fn evaluate(&self, agency_id: &AgencyId) -> Result<Eligibility, AgencyServiceError> {
        let stations_count = self.repository.count_stations(agency_id)?;
        if stations_count == 0 {
            return Ok(Eligibility::Ineligible(IneligibilityReason::NoStations));
        }
        let documents = self.repository.list_documents(agency_id)?;
        Ok(evaluate_publication(stations_count, &documents))
    }

    /// Read, modify, and compare-and-swap an agency, re-reading on version conflicts.
    ///
    /// `change` returns `false` when no write is needed; the freshly read agency is returned
    /// as is in that case.
    fn update_with_retry<F>(
        &self,
        agency_id: &AgencyId,
        mut change: F,
    ) -> Result<Agency, AgencyServiceError>
    where
        F: FnMut(&mut Agency) -> Result<bool, AgencyServiceError>,
    {
        let mut attempt = 1;
        loop {
            let mut agency = self.agency(agency_id)?;
            if !change(&mut agency)? {
                return Ok(agency);
            }
            agency.updated_at = Utc::now();

            match self.repository.update_agency(agency) {
                Ok(stored) => return Ok(stored),
                Err(RepositoryError::VersionConflict { expected, found })
                    if attempt < self.config.max_recompute_attempts =>
                {
                    warn!(%agency_id, attempt, expected, found, "agency changed during write; retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn required_remarks(remarks: &str) -> Result<String, ValidationError> {
    let trimmed = remarks.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyField("remarks"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Error raised by the agency service.
#[derive(Debug, thiserror::Error)]
pub enum AgencyServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error("agency does not meet publishing requirements: {}", .0.summary())]
    PreconditionFailed(IneligibilityReason),
}
