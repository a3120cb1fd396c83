//! Agency onboarding: stations, verification documents, and the publication gate.

pub mod domain;
pub mod eligibility;
pub mod memory;
pub mod profile;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Agency, AgencyId, DocumentId, DocumentStatus, DocumentType, NewAgency, NewDocument,
    NewStation, ReviewDecision, Station, StationId, ValidationError, VerificationDocument,
};
pub use eligibility::{
    evaluate_publication, station_status, verification_status, CompletionStatus, Eligibility,
    IneligibilityReason,
};
pub use memory::{InMemoryAgencyRepository, InMemoryNotifications};
pub use profile::{AgencyProfileView, CompletionSteps, StationStep, VerificationStep};
pub use repository::{
    AgencyRepository, NotificationError, NotificationPublisher, RepositoryError, ReviewNotice,
};
pub use router::{agency_router, AgencyApiState, ApiError};
pub use service::{AgencyRegistryService, AgencyServiceError, DocumentReviewOutcome};
