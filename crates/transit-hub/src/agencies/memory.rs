use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{Agency, AgencyId, DocumentId, Station, StationId, VerificationDocument};
use super::repository::{
    AgencyRepository, NotificationError, NotificationPublisher, RepositoryError, ReviewNotice,
};

#[derive(Debug, Default)]
struct Store {
    agencies: HashMap<AgencyId, Agency>,
    stations: Vec<Station>,
    // Insertion order is the upload order the eligibility rules rely on.
    documents: Vec<VerificationDocument>,
}

impl Store {
    /// Bump the owning agency's version so in-flight compare-and-swap writes that evaluated
    /// the old station or document set are rejected.
    fn touch(&mut self, agency_id: &AgencyId) -> Result<(), RepositoryError> {
        let agency = self
            .agencies
            .get_mut(agency_id)
            .ok_or(RepositoryError::NotFound)?;
        agency.version += 1;
        Ok(())
    }
}

/// Process-local repository used by the API binary, the CLI demo, and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAgencyRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryAgencyRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Store>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl AgencyRepository for InMemoryAgencyRepository {
    fn insert_agency(&self, agency: Agency) -> Result<Agency, RepositoryError> {
        let mut store = self.lock()?;
        if store.agencies.contains_key(&agency.id) {
            return Err(RepositoryError::Conflict);
        }
        store.agencies.insert(agency.id, agency.clone());
        Ok(agency)
    }

    fn fetch_agency(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError> {
        Ok(self.lock()?.agencies.get(id).cloned())
    }

    fn list_agencies(&self) -> Result<Vec<Agency>, RepositoryError> {
        let store = self.lock()?;
        let mut agencies: Vec<Agency> = store.agencies.values().cloned().collect();
        agencies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(agencies)
    }

    fn update_agency(&self, mut agency: Agency) -> Result<Agency, RepositoryError> {
        let mut store = self.lock()?;
        let stored = store
            .agencies
            .get_mut(&agency.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != agency.version {
            return Err(RepositoryError::VersionConflict {
                expected: agency.version,
                found: stored.version,
            });
        }
        agency.version += 1;
        *stored = agency.clone();
        Ok(agency)
    }

    fn insert_station(&self, station: Station) -> Result<Station, RepositoryError> {
        let mut store = self.lock()?;
        if !store.agencies.contains_key(&station.agency_id) {
            return Err(RepositoryError::NotFound);
        }
        if store.stations.iter().any(|existing| existing.id == station.id) {
            return Err(RepositoryError::Conflict);
        }
        store.touch(&station.agency_id)?;
        store.stations.push(station.clone());
        Ok(station)
    }

    fn fetch_station(&self, id: &StationId) -> Result<Option<Station>, RepositoryError> {
        let store = self.lock()?;
        Ok(store.stations.iter().find(|station| station.id == *id).cloned())
    }

    fn delete_station(&self, id: &StationId) -> Result<Station, RepositoryError> {
        let mut store = self.lock()?;
        let index = store
            .stations
            .iter()
            .position(|station| station.id == *id)
            .ok_or(RepositoryError::NotFound)?;
        let removed = store.stations.remove(index);
        store.touch(&removed.agency_id)?;
        Ok(removed)
    }

    fn list_stations(&self, agency_id: &AgencyId) -> Result<Vec<Station>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .stations
            .iter()
            .filter(|station| station.agency_id == *agency_id)
            .cloned()
            .collect())
    }

    fn count_stations(&self, agency_id: &AgencyId) -> Result<usize, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .stations
            .iter()
            .filter(|station| station.agency_id == *agency_id)
            .count())
    }

    fn insert_document(
        &self,
        document: VerificationDocument,
    ) -> Result<VerificationDocument, RepositoryError> {
        let mut store = self.lock()?;
        if !store.agencies.contains_key(&document.agency_id) {
            return Err(RepositoryError::NotFound);
        }
        if store.documents.iter().any(|existing| existing.id == document.id) {
            return Err(RepositoryError::Conflict);
        }
        store.touch(&document.agency_id)?;
        store.documents.push(document.clone());
        Ok(document)
    }

    fn update_document(&self, document: VerificationDocument) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        let stored = store
            .documents
            .iter_mut()
            .find(|existing| existing.id == document.id)
            .ok_or(RepositoryError::NotFound)?;
        let agency_id = stored.agency_id;
        *stored = document;
        store.touch(&agency_id)
    }

    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<VerificationDocument>, RepositoryError> {
        let store = self.lock()?;
        Ok(store.documents.iter().find(|doc| doc.id == *id).cloned())
    }

    fn delete_document(&self, id: &DocumentId) -> Result<VerificationDocument, RepositoryError> {
        let mut store = self.lock()?;
        let index = store
            .documents
            .iter()
            .position(|doc| doc.id == *id)
            .ok_or(RepositoryError::NotFound)?;
        let removed = store.documents.remove(index);
        store.touch(&removed.agency_id)?;
        Ok(removed)
    }

    fn list_documents(
        &self,
        agency_id: &AgencyId,
    ) -> Result<Vec<VerificationDocument>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .documents
            .iter()
            .filter(|doc| doc.agency_id == *agency_id)
            .cloned()
            .collect())
    }
}

/// Notification sink that keeps every notice in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNotifications {
    notices: Arc<Mutex<Vec<ReviewNotice>>>,
}

impl InMemoryNotifications {
    pub fn notices(&self) -> Vec<ReviewNotice> {
        match self.notices.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationPublisher for InMemoryNotifications {
    fn publish(&self, notice: ReviewNotice) -> Result<(), NotificationError> {
        self.notices
            .lock()
            .map_err(|_| NotificationError::Transport("notification mutex poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn agency() -> Agency {
        let now = Utc::now();
        Agency {
            id: AgencyId::new(),
            name: "Kigali Coach".to_string(),
            contact_email: "ops@kigalicoach.rw".to_string(),
            is_published: false,
            is_verified: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn update_agency_bumps_version_and_rejects_stale_writes() {
        let repository = InMemoryAgencyRepository::default();
        let stored = repository.insert_agency(agency()).expect("insert");

        let mut first = stored.clone();
        first.is_published = true;
        let updated = repository.update_agency(first).expect("first write wins");
        assert_eq!(updated.version, 1);

        let mut stale = stored;
        stale.is_verified = true;
        assert_eq!(
            repository.update_agency(stale),
            Err(RepositoryError::VersionConflict {
                expected: 0,
                found: 1
            })
        );
    }

    #[test]
    fn document_writes_invalidate_pending_agency_writes() {
        let repository = InMemoryAgencyRepository::default();
        let stored = repository.insert_agency(agency()).expect("insert");
        let mut document = VerificationDocument {
            id: DocumentId::new(),
            agency_id: stored.id,
            document_type: super::super::domain::DocumentType::TaxClearance,
            status: super::super::domain::DocumentStatus::Approved,
            remarks: None,
            file_url: "https://files.example/tax.pdf".to_string(),
            uploaded_at: Utc::now(),
            reviewed_at: None,
        };
        repository
            .insert_document(document.clone())
            .expect("document inserts");
        document.status = super::super::domain::DocumentStatus::Rejected;
        repository.update_document(document).expect("document updates");

        let current = repository
            .fetch_agency(&stored.id)
            .expect("fetch")
            .expect("agency");
        assert_eq!(current.version, 2);

        let mut stale = stored;
        stale.is_published = true;
        assert_eq!(
            repository.update_agency(stale),
            Err(RepositoryError::VersionConflict {
                expected: 0,
                found: 2
            })
        );
    }

    #[test]
    fn documents_for_unknown_agency_are_rejected() {
        let repository = InMemoryAgencyRepository::default();
        let now = Utc::now();
        let document = VerificationDocument {
            id: DocumentId::new(),
            agency_id: AgencyId::new(),
            document_type: super::super::domain::DocumentType::TaxClearance,
            status: super::super::domain::DocumentStatus::Pending,
            remarks: None,
            file_url: "https://files.example/tax.pdf".to_string(),
            uploaded_at: now,
            reviewed_at: None,
        };
        assert_eq!(
            repository.insert_document(document),
            Err(RepositoryError::NotFound)
        );
    }
}
