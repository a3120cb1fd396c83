//! Publication eligibility rules for agencies.
//!
//! Two different questions are answered here and they must not be merged:
//!
//! * [`verification_status`] summarises document review across *every* uploaded document and
//!   backs the status badge shown to agency administrators.
//! * [`evaluate_publication`] is the actual publish gate. It only looks at the required document
//!   types and needs at least one station.
//!
//! An agency whose required documents are approved while an optional upload is still pending is
//! publishable even though its verification badge reads `pending_processing`.

use serde::{Deserialize, Serialize};

use super::domain::{DocumentStatus, DocumentType, VerificationDocument};

/// Coarse lifecycle status shown for a completion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Required,
    Completed,
    Rejected,
    PendingProcessing,
}

impl CompletionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CompletionStatus::Required => "required",
            CompletionStatus::Completed => "completed",
            CompletionStatus::Rejected => "rejected",
            CompletionStatus::PendingProcessing => "pending_processing",
        }
    }

    pub const fn is_completed(self) -> bool {
        matches!(self, CompletionStatus::Completed)
    }
}

/// Reduce the full document collection of an agency to a single status.
pub fn verification_status(documents: &[VerificationDocument]) -> CompletionStatus {
    if documents.is_empty() {
        return CompletionStatus::Required;
    }

    let all_with = |status: DocumentStatus| documents.iter().all(|doc| doc.status == status);

    if all_with(DocumentStatus::Approved) {
        CompletionStatus::Completed
    } else if all_with(DocumentStatus::Rejected) {
        CompletionStatus::Rejected
    } else {
        CompletionStatus::PendingProcessing
    }
}

/// Stations only need to exist; there is no partial state.
pub const fn station_status(station_count: usize) -> CompletionStatus {
    if station_count == 0 {
        CompletionStatus::Required
    } else {
        CompletionStatus::Completed
    }
}

/// Why an agency cannot be published right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IneligibilityReason {
    NoStations,
    MissingDocument {
        document_type: DocumentType,
    },
    DocumentNotApproved {
        document_type: DocumentType,
        status: DocumentStatus,
    },
}

impl IneligibilityReason {
    pub fn summary(&self) -> String {
        match self {
            IneligibilityReason::NoStations => "agency has no registered stations".to_string(),
            IneligibilityReason::MissingDocument { document_type } => {
                format!("required document '{document_type}' has not been uploaded")
            }
            IneligibilityReason::DocumentNotApproved {
                document_type,
                status,
            } => format!("required document '{document_type}' is {status}"),
        }
    }
}

/// Outcome of the publish gate. Infrastructure failures are never folded into `Ineligible`;
/// callers receive those as errors from the service layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    Ineligible(IneligibilityReason),
}

impl Eligibility {
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }

    pub fn reason(&self) -> Option<&IneligibilityReason> {
        match self {
            Eligibility::Eligible => None,
            Eligibility::Ineligible(reason) => Some(reason),
        }
    }
}

/// Decide whether an agency may be published.
///
/// Documents are matched per required type using the first entry in the slice, so callers pass
/// them in upload order.
pub fn evaluate_publication(
    station_count: usize,
    documents: &[VerificationDocument],
) -> Eligibility {
    if station_count == 0 {
        return Eligibility::Ineligible(IneligibilityReason::NoStations);
    }

    for document_type in DocumentType::REQUIRED {
        let Some(document) = documents
            .iter()
            .find(|doc| doc.document_type == document_type)
        else {
            return Eligibility::Ineligible(IneligibilityReason::MissingDocument { document_type });
        };

        if document.status != DocumentStatus::Approved {
            return Eligibility::Ineligible(IneligibilityReason::DocumentNotApproved {
                document_type,
                status: document.status,
            });
        }
    }

    Eligibility::Eligible
}
