use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::from_str(s.trim())?))
            }
        }
    };
}

uuid_identifier!(
    /// Identifier wrapper for transport agencies (tenants).
    AgencyId
);
uuid_identifier!(
    /// Identifier wrapper for stations operated by an agency.
    StationId
);
uuid_identifier!(
    /// Identifier wrapper for uploaded verification documents.
    DocumentId
);

/// Tenant organization operating bus routes and stations.
///
/// `is_published` is a cached projection of the eligibility engine and is only written by the
/// agency service. `is_verified` is an independent flag set by system administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    pub id: AgencyId,
    pub name: String,
    pub contact_email: String,
    pub is_published: bool,
    pub is_verified: bool,
    /// Optimistic-lock counter, bumped on every persisted agency write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: StationId,
    pub agency_id: AgencyId,
    pub name: String,
    pub city: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// Compliance document uploaded by an agency and reviewed by a system administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDocument {
    pub id: DocumentId,
    pub agency_id: AgencyId,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BusinessRegistration,
    TaxClearance,
    OperatingLicense,
    InsuranceCertificate,
    Other,
}

impl DocumentType {
    /// Document types that must each be approved before an agency may publish.
    pub const REQUIRED: [DocumentType; 3] = [
        DocumentType::BusinessRegistration,
        DocumentType::TaxClearance,
        DocumentType::OperatingLicense,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::BusinessRegistration => "business_registration",
            DocumentType::TaxClearance => "tax_clearance",
            DocumentType::OperatingLicense => "operating_license",
            DocumentType::InsuranceCertificate => "insurance_certificate",
            DocumentType::Other => "other",
        }
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "business_registration" => Ok(Self::BusinessRegistration),
            "tax_clearance" => Ok(Self::TaxClearance),
            "operating_license" => Ok(Self::OperatingLicense),
            "insurance_certificate" => Ok(Self::InsuranceCertificate),
            "other" => Ok(Self::Other),
            _ => Err(ValidationError::UnknownDocumentType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ValidationError::UnknownDocumentStatus(value.to_string())),
        }
    }
}

/// Payload used to register a new agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgency {
    pub name: String,
    pub contact_email: String,
}

impl NewAgency {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        let email = self.contact_email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(ValidationError::InvalidEmail(self.contact_email.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStation {
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub address: String,
}

impl NewStation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("city", &self.city)
    }
}

/// Upload metadata; the file itself lives in external storage and is referenced by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    #[serde(rename = "type")]
    pub document_type: String,
    pub file_url: String,
}

impl NewDocument {
    /// Validate the payload and resolve the declared document type.
    pub fn validate(&self) -> Result<DocumentType, ValidationError> {
        require_text("fileUrl", &self.file_url)?;
        self.document_type.parse()
    }
}

/// Review action taken by a system administrator on a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject { remarks: String },
    Remark { remarks: String },
}

impl ReviewDecision {
    pub const fn label(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approve",
            ReviewDecision::Reject { .. } => "reject",
            ReviewDecision::Remark { .. } => "remark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown document type '{0}'")]
    UnknownDocumentType(String),
    #[error("unknown document status '{0}'")]
    UnknownDocumentStatus(String),
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),
    #[error("'{0}' is not a valid contact email")]
    InvalidEmail(String),
    #[error("station does not belong to agency {0}")]
    ForeignStation(AgencyId),
    #[error("document does not belong to agency {0}")]
    ForeignDocument(AgencyId),
}

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(())
    }
}
