use clap::Args;
use rebate_match::config::AppConfig;
use rebate_match::error::AppError;
use rebate_match::workflows::contractor::onboarding::{
    ContractorIntake, ContractorRef, ContractorState,
};
use rebate_match::workflows::lifecycle::{Actor, AuditEntry, LifecycleId, LifecycleState};
use rebate_match::workflows::rebate::applications::{
    ApplicationIntake, ApplicationState, CustomerRef, EvidenceKind, EvidenceSubmission,
    VerificationState,
};

use crate::infra::{build_marketplace, Marketplace};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Include the rendered notification feed in the output
    #[arg(long)]
    pub(crate) show_notifications: bool,
}

fn operator() -> Actor {
    Actor::Operator("demo-operator".to_string())
}

/// Walk both lifecycles end to end against in-memory stores and print the
/// audit timelines, mirroring what the HTTP surface exposes.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let marketplace = build_marketplace(config.onboarding);

    println!("Rebate marketplace demo");

    let standard_id = run_standard_onboarding(&marketplace)?;
    let fast_id = run_fast_track_onboarding(&marketplace)?;
    let application_id = run_rebate_application(&marketplace)?;

    println!("\nContractor timeline (standard path)");
    render_history(&marketplace.contractors.get_history(&standard_id)?);

    println!("\nContractor timeline (fast track)");
    render_history(&marketplace.contractors.get_history(&fast_id)?);

    println!("\nApplication timeline");
    render_history(&marketplace.applications.get_history(&application_id)?);

    if args.show_notifications {
        println!("\nNotification feed");
        for recipient in ["ctr-summit", "ctr-volt", "cust-demo"] {
            for notification in marketplace.applications.notifications(recipient)? {
                let delivery = if notification.dispatched {
                    "delivered"
                } else {
                    "retained"
                };
                println!(
                    "- [{delivery}] {} -> {}: {}",
                    notification.lifecycle_id.0, notification.recipient, notification.subject
                );
            }
        }
    }

    Ok(())
}

fn run_standard_onboarding(marketplace: &Marketplace) -> Result<LifecycleId, AppError> {
    let record = marketplace.contractors.register(ContractorIntake {
        contractor: ContractorRef("ctr-summit".to_string()),
        company: "Summit Heating & Cooling".to_string(),
        contact_name: "Priya Raman".to_string(),
        service_areas: vec!["50309".to_string(), "50310".to_string()],
    })?;
    println!("Registered {} as {}", record.company, record.id.0);

    for to in [
        ContractorState::DetailsRequested,
        ContractorState::AwaitingStateApproval,
    ] {
        marketplace
            .contractors
            .request_transition(&record.id, to, operator(), None)?;
    }
    marketplace
        .contractors
        .record_state_approval(&record.id, operator())?;
    for to in [
        ContractorState::InvoiceSent,
        ContractorState::PaymentPending,
        ContractorState::Approved,
    ] {
        marketplace
            .contractors
            .request_transition(&record.id, to, operator(), None)?;
    }

    let record = marketplace.contractors.get(&record.id)?;
    let fee = record.fee.map(|fee| fee.amount_cents).unwrap_or_default();
    println!(
        "Standard path complete: state={}, fee_paid={}, invoiced_cents={}",
        record.state.label(),
        record.fee_paid,
        fee
    );
    Ok(record.id)
}

fn run_fast_track_onboarding(marketplace: &Marketplace) -> Result<LifecycleId, AppError> {
    let record = marketplace.contractors.register(ContractorIntake {
        contractor: ContractorRef("ctr-volt".to_string()),
        company: "Volt Services".to_string(),
        contact_name: "Dana Whitfield".to_string(),
        service_areas: vec!["50311".to_string()],
    })?;
    let record = marketplace.contractors.fast_track_approval(
        &record.id,
        operator(),
        Some("state roster shows active approval".to_string()),
    )?;
    println!(
        "Fast track complete: {} state={}, fee waived={}",
        record.company,
        record.state.label(),
        record.fee_paid
    );
    Ok(record.id)
}

fn run_rebate_application(marketplace: &Marketplace) -> Result<LifecycleId, AppError> {
    let record = marketplace.applications.submit(ApplicationIntake {
        customer: CustomerRef("cust-demo".to_string()),
        customer_name: "Jordan Meyer".to_string(),
        program: "Heat Pump Rebate".to_string(),
        requested_amount_cents: 240_000,
        property_address: "118 Grand Ave".to_string(),
    })?;
    println!("\nSubmitted application {}", record.id.0);

    marketplace.applications.request_transition(
        &record.id,
        ApplicationState::DocumentsRequested,
        operator(),
        None,
    )?;

    let first = marketplace.applications.on_evidence_submitted(
        &record.id,
        EvidenceSubmission {
            kind: EvidenceKind::IncomeProof,
            storage_key: "s3://rebate-match/demo/income.pdf".to_string(),
        },
    )?;
    println!(
        "Income proof stored ({}); auto-advanced: {}",
        first.item.id.0, first.auto_advanced
    );

    let second = marketplace.applications.on_evidence_submitted(
        &record.id,
        EvidenceSubmission {
            kind: EvidenceKind::OwnershipProof,
            storage_key: "s3://rebate-match/demo/deed.pdf".to_string(),
        },
    )?;
    println!(
        "Ownership proof stored ({}); auto-advanced: {}",
        second.item.id.0, second.auto_advanced
    );

    for item in marketplace.applications.evidence(&record.id)? {
        if item.verification == VerificationState::Submitted {
            marketplace
                .applications
                .verify_evidence(&item.id, operator())?;
        }
    }

    for to in [
        ApplicationState::SubmittedToProgram,
        ApplicationState::Approved,
    ] {
        marketplace
            .applications
            .request_transition(&record.id, to, operator(), None)?;
    }
    marketplace.applications.record_contractor_match(
        &record.id,
        "Summit Heating & Cooling",
        operator(),
    )?;
    for to in [
        ApplicationState::InstallationInProgress,
        ApplicationState::Completed,
    ] {
        marketplace
            .applications
            .request_transition(&record.id, to, operator(), None)?;
    }

    let state = marketplace.applications.get_state(&record.id)?;
    println!("Application finished in state {}", state.label());
    Ok(record.id)
}

fn render_history<S: LifecycleState>(entries: &[AuditEntry<S>]) {
    for entry in entries {
        let reason = entry
            .reason
            .as_deref()
            .map(|reason| format!(" ({reason})"))
            .unwrap_or_default();
        println!(
            "- {} -> {} by {} at {}{}",
            entry.from.label(),
            entry.to.label(),
            entry.actor.label(),
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            reason
        );
    }
}
