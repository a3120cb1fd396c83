use serde::Serialize;

use super::domain::{Agency, VerificationDocument};
use super::eligibility::{station_status, verification_status, CompletionStatus, Eligibility};

/// Dashboard projection of an agency and its onboarding progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyProfileView {
    pub agency: Agency,
    pub is_publishable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_reason: Option<String>,
    pub completion_steps: CompletionSteps,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSteps {
    pub verification: VerificationStep,
    pub stations: StationStep,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStep {
    pub status: CompletionStatus,
    pub completed: bool,
    pub documents_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStep {
    pub status: CompletionStatus,
    pub completed: bool,
    pub stations_count: usize,
}

impl AgencyProfileView {
    pub fn build(
        agency: Agency,
        stations_count: usize,
        documents: &[VerificationDocument],
        eligibility: &Eligibility,
    ) -> Self {
        let verification = verification_status(documents);
        let stations = station_status(stations_count);

        Self {
            agency,
            is_publishable: eligibility.is_eligible(),
            blocking_reason: eligibility.reason().map(|reason| reason.summary()),
            completion_steps: CompletionSteps {
                verification: VerificationStep {
                    status: verification,
                    completed: verification.is_completed(),
                    documents_count: documents.len(),
                },
                stations: StationStep {
                    status: stations,
                    completed: stations.is_completed(),
                    stations_count,
                },
            },
        }
    }
}
