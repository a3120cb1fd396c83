use clap::Args;
use std::sync::Arc;
use transit_hub::agencies::{
    Agency, AgencyRegistryService, AgencyServiceError, DocumentType, InMemoryAgencyRepository,
    InMemoryNotifications, NewAgency, NewDocument, NewStation, ReviewDecision,
};
use transit_hub::config::PublishingConfig;
use transit_hub::error::AppError;

type DemoService = AgencyRegistryService<InMemoryAgencyRepository, InMemoryNotifications>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Let document-triggered recomputes raise the publication flag as well as lower it.
    #[arg(long)]
    pub(crate) auto_publish: bool,
    /// Print every notification emitted during the walkthrough.
    #[arg(long)]
    pub(crate) show_notifications: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let notifications = Arc::new(InMemoryNotifications::default());
    let service = AgencyRegistryService::new(
        Arc::new(InMemoryAgencyRepository::default()),
        Arc::clone(&notifications),
        PublishingConfig {
            auto_publish: args.auto_publish,
            ..PublishingConfig::default()
        },
    );

    println!("Transit hub onboarding demo");
    println!("auto publish: {}", args.auto_publish);

    walkthrough(&service)?;

    if args.show_notifications {
        println!("\nNotifications");
        for notice in notifications.notices() {
            let details = notice
                .details
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("- {} [{}] {}", notice.template, notice.agency_id, details);
        }
    }

    Ok(())
}

fn walkthrough(service: &DemoService) -> Result<(), AgencyServiceError> {
    let agency = service.create_agency(NewAgency {
        name: "Volcano Express".to_string(),
        contact_email: "ops@volcano-express.rw".to_string(),
    })?;

    println!("\n1. Freshly registered agency");
    print_profile(service, &agency)?;

    println!("\n2. Publish attempt with one station and no documents");
    service.add_station(
        &agency.id,
        NewStation {
            name: "Nyabugogo".to_string(),
            city: "Kigali".to_string(),
            address: "KN 1 Rd".to_string(),
        },
    )?;
    match service.publish(&agency.id) {
        Err(AgencyServiceError::PreconditionFailed(reason)) => {
            println!("   refused: {}", reason.summary())
        }
        Err(err) => return Err(err),
        Ok(_) => println!("   unexpectedly published"),
    }

    println!("\n3. Required documents approved, optional upload still pending");
    let mut tax_clearance = None;
    for document_type in DocumentType::REQUIRED {
        let uploaded = service.submit_document(&agency.id, upload(document_type))?;
        service.review_document(&uploaded.id, ReviewDecision::Approve)?;
        if document_type == DocumentType::TaxClearance {
            tax_clearance = Some(uploaded.id);
        }
    }
    service.submit_document(&agency.id, upload(DocumentType::InsuranceCertificate))?;
    print_profile(service, &agency)?;

    let published = service.publish(&agency.id)?;
    println!("   published: {}", published.is_published);

    if let Some(document_id) = tax_clearance {
        println!("\n4. Tax clearance rejected after publication");
        let outcome = service.review_document(
            &document_id,
            ReviewDecision::Reject {
                remarks: "clearance certificate expired".to_string(),
            },
        )?;
        println!(
            "   document status: {}, agency published: {}",
            outcome.document.status, outcome.is_published
        );
        print_profile(service, &agency)?;
    }

    Ok(())
}

fn upload(document_type: DocumentType) -> NewDocument {
    NewDocument {
        document_type: document_type.label().to_string(),
        file_url: format!("https://files.example/demo/{}.pdf", document_type.label()),
    }
}

fn print_profile(service: &DemoService, agency: &Agency) -> Result<(), AgencyServiceError> {
    let profile = service.profile(&agency.id)?;
    let steps = &profile.completion_steps;
    println!(
        "   verification: {} ({} documents)",
        steps.verification.status.label(),
        steps.verification.documents_count
    );
    println!(
        "   stations: {} ({} registered)",
        steps.stations.status.label(),
        steps.stations.stations_count
    );
    println!(
        "   publishable: {}, published: {}",
        profile.is_publishable, profile.agency.is_published
    );
    if let Some(reason) = &profile.blocking_reason {
        println!("   blocked by: {reason}");
    }
    Ok(())
}
