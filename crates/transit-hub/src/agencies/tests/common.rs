use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::agencies::domain::{
    Agency, AgencyId, DocumentId, DocumentStatus, DocumentType, NewAgency, NewDocument,
    NewStation, ReviewDecision, Station, StationId, VerificationDocument,
};
use crate::agencies::memory::{InMemoryAgencyRepository, InMemoryNotifications};
use crate::agencies::repository::{
    AgencyRepository, NotificationError, NotificationPublisher, RepositoryError, ReviewNotice,
};
use crate::agencies::service::AgencyRegistryService;
use crate::agencies::agency_router;
use crate::auth::{JwtService, Role};
use crate::config::PublishingConfig;

pub(super) type MemoryService = AgencyRegistryService<InMemoryAgencyRepository, InMemoryNotifications>;

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryAgencyRepository>,
    Arc<InMemoryNotifications>,
) {
    build_service_with(PublishingConfig::default())
}

pub(super) fn build_service_with(
    config: PublishingConfig,
) -> (
    MemoryService,
    Arc<InMemoryAgencyRepository>,
    Arc<InMemoryNotifications>,
) {
    let repository = Arc::new(InMemoryAgencyRepository::default());
    let notifications = Arc::new(InMemoryNotifications::default());
    let service = AgencyRegistryService::new(repository.clone(), notifications.clone(), config);
    (service, repository, notifications)
}

pub(super) fn new_agency() -> NewAgency {
    NewAgency {
        name: "Volcano Express".to_string(),
        contact_email: "ops@volcano-express.rw".to_string(),
    }
}

pub(super) fn new_station(name: &str) -> NewStation {
    NewStation {
        name: name.to_string(),
        city: "Kigali".to_string(),
        address: "KN 2 Ave".to_string(),
    }
}

pub(super) fn new_document(document_type: DocumentType) -> NewDocument {
    NewDocument {
        document_type: document_type.label().to_string(),
        file_url: format!("https://files.example/{}.pdf", document_type.label()),
    }
}

/// Raw document for exercising the evaluators without a repository.
pub(super) fn document(document_type: DocumentType, status: DocumentStatus) -> VerificationDocument {
    VerificationDocument {
        id: DocumentId::new(),
        agency_id: AgencyId::new(),
        document_type,
        status,
        remarks: None,
        file_url: "https://files.example/doc.pdf".to_string(),
        uploaded_at: Utc::now(),
        reviewed_at: None,
    }
}

pub(super) fn required_documents(status: DocumentStatus) -> Vec<VerificationDocument> {
    DocumentType::REQUIRED
        .into_iter()
        .map(|document_type| document(document_type, status))
        .collect()
}

/// Upload and approve every required document, returning the documents keyed by upload order.
pub(super) fn approve_required<R, N>(
    service: &AgencyRegistryService<R, N>,
    agency_id: &AgencyId,
) -> Vec<VerificationDocument>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    DocumentType::REQUIRED
        .into_iter()
        .map(|document_type| {
            let uploaded = service
                .submit_document(agency_id, new_document(document_type))
                .expect("document uploads");
            service
                .review_document(&uploaded.id, ReviewDecision::Approve)
                .expect("document approves")
                .document
        })
        .collect()
}

/// Agency with one station and all required documents approved, not yet published.
pub(super) fn eligible_agency<R, N>(service: &AgencyRegistryService<R, N>) -> (Agency, Station)
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency = service.create_agency(new_agency()).expect("agency registers");
    let station = service
        .add_station(&agency.id, new_station("Nyabugogo"))
        .expect("station adds");
    approve_required(service, &agency.id);
    (agency, station)
}

/// Repository that simulates a concurrent writer touching the agency right before the
/// service's compare-and-swap, `interference` times.
pub(super) struct RacingRepository {
    pub(super) inner: InMemoryAgencyRepository,
    interference: AtomicUsize,
}

impl RacingRepository {
    pub(super) fn new(interference: usize) -> Self {
        Self {
            inner: InMemoryAgencyRepository::default(),
            interference: AtomicUsize::new(interference),
        }
    }

    pub(super) fn arm(&self, interference: usize) {
        self.interference.store(interference, Ordering::SeqCst);
    }
}

impl AgencyRepository for RacingRepository {
    fn insert_agency(&self, agency: Agency) -> Result<Agency, RepositoryError> {
        self.inner.insert_agency(agency)
    }

    fn fetch_agency(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError> {
        self.inner.fetch_agency(id)
    }

    fn list_agencies(&self) -> Result<Vec<Agency>, RepositoryError> {
        self.inner.list_agencies()
    }

    fn update_agency(&self, agency: Agency) -> Result<Agency, RepositoryError> {
        let remaining = self.interference.load(Ordering::SeqCst);
        if remaining > 0 {
            self.interference.store(remaining - 1, Ordering::SeqCst);
            let current = self
                .inner
                .fetch_agency(&agency.id)?
                .ok_or(RepositoryError::NotFound)?;
            self.inner.update_agency(current)?;
        }
        self.inner.update_agency(agency)
    }

    fn insert_station(&self, station: Station) -> Result<Station, RepositoryError> {
        self.inner.insert_station(station)
    }

    fn fetch_station(&self, id: &StationId) -> Result<Option<Station>, RepositoryError> {
        self.inner.fetch_station(id)
    }

    fn delete_station(&self, id: &StationId) -> Result<Station, RepositoryError> {
        self.inner.delete_station(id)
    }

    fn list_stations(&self, agency_id: &AgencyId) -> Result<Vec<Station>, RepositoryError> {
        self.inner.list_stations(agency_id)
    }

    fn count_stations(&self, agency_id: &AgencyId) -> Result<usize, RepositoryError> {
        self.inner.count_stations(agency_id)
    }

    fn insert_document(
        &self,
        document: VerificationDocument,
    ) -> Result<VerificationDocument, RepositoryError> {
        self.inner.insert_document(document)
    }

    fn update_document(&self, document: VerificationDocument) -> Result<(), RepositoryError> {
        self.inner.update_document(document)
    }

    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<VerificationDocument>, RepositoryError> {
        self.inner.fetch_document(id)
    }

    fn delete_document(&self, id: &DocumentId) -> Result<VerificationDocument, RepositoryError> {
        self.inner.delete_document(id)
    }

    fn list_documents(
        &self,
        agency_id: &AgencyId,
    ) -> Result<Vec<VerificationDocument>, RepositoryError> {
        self.inner.list_documents(agency_id)
    }
}

/// Repository whose station and document reads fail while agency reads succeed.
pub(super) struct FlakyRepository {
    pub(super) inner: InMemoryAgencyRepository,
}

impl AgencyRepository for FlakyRepository {
    fn insert_agency(&self, agency: Agency) -> Result<Agency, RepositoryError> {
        self.inner.insert_agency(agency)
    }

    fn fetch_agency(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError> {
        self.inner.fetch_agency(id)
    }

    fn list_agencies(&self) -> Result<Vec<Agency>, RepositoryError> {
        self.inner.list_agencies()
    }

    fn update_agency(&self, agency: Agency) -> Result<Agency, RepositoryError> {
        self.inner.update_agency(agency)
    }

    fn insert_station(&self, station: Station) -> Result<Station, RepositoryError> {
        self.inner.insert_station(station)
    }

    fn fetch_station(&self, id: &StationId) -> Result<Option<Station>, RepositoryError> {
        self.inner.fetch_station(id)
    }

    fn delete_station(&self, id: &StationId) -> Result<Station, RepositoryError> {
        self.inner.delete_station(id)
    }

    fn list_stations(&self, _agency_id: &AgencyId) -> Result<Vec<Station>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count_stations(&self, _agency_id: &AgencyId) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_document(
        &self,
        document: VerificationDocument,
    ) -> Result<VerificationDocument, RepositoryError> {
        self.inner.insert_document(document)
    }

    fn update_document(&self, document: VerificationDocument) -> Result<(), RepositoryError> {
        self.inner.update_document(document)
    }

    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<VerificationDocument>, RepositoryError> {
        self.inner.fetch_document(id)
    }

    fn delete_document(&self, id: &DocumentId) -> Result<VerificationDocument, RepositoryError> {
        self.inner.delete_document(id)
    }

    fn list_documents(
        &self,
        _agency_id: &AgencyId,
    ) -> Result<Vec<VerificationDocument>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Repository that lands a pending document write right after the service snapshots the
/// documents, the way a reviewer acting between evaluation and write would.
pub(super) struct InterleavingRepository {
    pub(super) inner: InMemoryAgencyRepository,
    pending: Mutex<Option<VerificationDocument>>,
}

impl InterleavingRepository {
    pub(super) fn new() -> Self {
        Self {
            inner: InMemoryAgencyRepository::default(),
            pending: Mutex::new(None),
        }
    }

    /// Queue `document` to be written after the next document snapshot.
    pub(super) fn interleave(&self, document: VerificationDocument) {
        *self.pending.lock().expect("pending mutex") = Some(document);
    }
}

impl AgencyRepository for InterleavingRepository {
    fn insert_agency(&self, agency: Agency) -> Result<Agency, RepositoryError> {
        self.inner.insert_agency(agency)
    }

    fn fetch_agency(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError> {
        self.inner.fetch_agency(id)
    }

    fn list_agencies(&self) -> Result<Vec<Agency>, RepositoryError> {
        self.inner.list_agencies()
    }

    fn update_agency(&self, agency: Agency) -> Result<Agency, RepositoryError> {
        self.inner.update_agency(agency)
    }

    fn insert_station(&self, station: Station) -> Result<Station, RepositoryError> {
        self.inner.insert_station(station)
    }

    fn fetch_station(&self, id: &StationId) -> Result<Option<Station>, RepositoryError> {
        self.inner.fetch_station(id)
    }

    fn delete_station(&self, id: &StationId) -> Result<Station, RepositoryError> {
        self.inner.delete_station(id)
    }

    fn list_stations(&self, agency_id: &AgencyId) -> Result<Vec<Station>, RepositoryError> {
        self.inner.list_stations(agency_id)
    }

    fn count_stations(&self, agency_id: &AgencyId) -> Result<usize, RepositoryError> {
        self.inner.count_stations(agency_id)
    }

    fn insert_document(
        &self,
        document: VerificationDocument,
    ) -> Result<VerificationDocument, RepositoryError> {
        self.inner.insert_document(document)
    }

    fn update_document(&self, document: VerificationDocument) -> Result<(), RepositoryError> {
        self.inner.update_document(document)
    }

    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<VerificationDocument>, RepositoryError> {
        self.inner.fetch_document(id)
    }

    fn delete_document(&self, id: &DocumentId) -> Result<VerificationDocument, RepositoryError> {
        self.inner.delete_document(id)
    }

    fn list_documents(
        &self,
        agency_id: &AgencyId,
    ) -> Result<Vec<VerificationDocument>, RepositoryError> {
        let snapshot = self.inner.list_documents(agency_id)?;
        let pending = self.pending.lock().expect("pending mutex").take();
        if let Some(document) = pending {
            self.inner.update_document(document)?;
        }
        Ok(snapshot)
    }
}

pub(super) struct OfflineNotifications;

impl NotificationPublisher for OfflineNotifications {
    fn publish(&self, _notice: ReviewNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp offline".to_string()))
    }
}

pub(super) fn tokens() -> JwtService {
    JwtService::new("routing-test-secret", "transit-hub", 1)
}

pub(super) fn bearer(role: Role, agency_id: Option<AgencyId>) -> String {
    let token = tokens()
        .create_token("tester", role, agency_id)
        .expect("token signs");
    format!("Bearer {token}")
}

/// Router over a shared service, verifying tokens minted by [`tokens`].
pub(super) fn router_with_service(service: Arc<MemoryService>) -> axum::Router {
    agency_router(service, Arc::new(tokens()))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn template_names(notices: &[ReviewNotice]) -> Vec<&str> {
    notices.iter().map(|notice| notice.template.as_str()).collect()
}
