use std::collections::BTreeMap;

use serde::Serialize;

use crate::workflows::lifecycle::{LifecycleKind, PathTag};

/// Template vocabulary across both lifecycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    DocumentsRequested,
    DocumentsReceived,
    ProgramSubmission,
    ApplicationApproved,
    ContractorMatched,
    InstallationStarted,
    InstallationCompleted,
    ApplicationRejected,
    OnboardingDetailsRequested,
    StateApprovalPending,
    OnboardingInvoice,
    PaymentProcessing,
    ContractorApproved,
    ContractorWelcome,
    ContractorSuspended,
    ContractorReactivated,
    ContractorDeactivated,
    StatusUpdate,
}

/// Subject/body pair with `{field}` placeholders filled from the dispatch
/// context at render time.
#[derive(Debug)]
pub struct MessageTemplate {
    pub kind: TemplateKind,
    pub subject: &'static str,
    pub body: &'static str,
}

const DOCUMENTS_REQUESTED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::DocumentsRequested,
    subject: "Documents needed for your rebate application",
    body: "Hi {customer_name}, the {program} program needs supporting documents for \
           application {reference}. Upload them from your dashboard to keep your \
           application moving.",
};

const DOCUMENTS_RECEIVED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::DocumentsReceived,
    subject: "We received your documents",
    body: "Hi {customer_name}, the documents for application {reference} arrived and \
           are queued for review.",
};

const PROGRAM_SUBMISSION: MessageTemplate = MessageTemplate {
    kind: TemplateKind::ProgramSubmission,
    subject: "Your application went to the program",
    body: "Hi {customer_name}, application {reference} was submitted to {program} for \
           a decision. We will let you know as soon as it comes back.",
};

const APPLICATION_APPROVED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::ApplicationApproved,
    subject: "Your rebate was approved",
    body: "Hi {customer_name}, application {reference} was approved for ${amount}. \
           Next we will match you with an installer.",
};

const CONTRACTOR_MATCHED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::ContractorMatched,
    subject: "An installer was matched to your project",
    body: "Hi {customer_name}, {contractor_name} will handle the installation for \
           application {reference}. They will reach out to schedule.",
};

const INSTALLATION_STARTED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::InstallationStarted,
    subject: "Installation under way",
    body: "Hi {customer_name}, installation work for application {reference} has started.",
};

const INSTALLATION_COMPLETED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::InstallationCompleted,
    subject: "Installation complete",
    body: "Hi {customer_name}, installation for application {reference} is complete. \
           Thanks for using the marketplace.",
};

const APPLICATION_REJECTED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::ApplicationRejected,
    subject: "Update on your rebate application",
    body: "Hi {customer_name}, application {reference} was not approved: {decision_reason}.",
};

const ONBOARDING_DETAILS_REQUESTED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::OnboardingDetailsRequested,
    subject: "Tell us more about your business",
    body: "Hi {contact_name}, we need license and insurance details for {company} \
           before onboarding can continue. Reference {reference}.",
};

const STATE_APPROVAL_PENDING: MessageTemplate = MessageTemplate {
    kind: TemplateKind::StateApprovalPending,
    subject: "Your details are with the state program",
    body: "Hi {contact_name}, the details for {company} were forwarded for state \
           approval. We will follow up once the program confirms. Reference {reference}.",
};

const ONBOARDING_INVOICE: MessageTemplate = MessageTemplate {
    kind: TemplateKind::OnboardingInvoice,
    subject: "Your onboarding invoice",
    body: "Hi {contact_name}, the onboarding fee for {company} is ${fee_amount}, due \
           {fee_due}. Reference {reference}.",
};

const PAYMENT_PROCESSING: MessageTemplate = MessageTemplate {
    kind: TemplateKind::PaymentProcessing,
    subject: "Payment received and processing",
    body: "Hi {contact_name}, we are processing the onboarding payment for {company}. \
           Reference {reference}.",
};

const CONTRACTOR_APPROVED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::ContractorApproved,
    subject: "You're live on the marketplace",
    body: "Hi {contact_name}, {company} is approved and can now accept rebate \
           installations. Reference {reference}.",
};

const CONTRACTOR_WELCOME: MessageTemplate = MessageTemplate {
    kind: TemplateKind::ContractorWelcome,
    subject: "Welcome to the marketplace",
    body: "Hi {contact_name}, {company} is approved effective immediately. Your \
           existing state approval was carried over and the onboarding fee is waived. \
           Reference {reference}.",
};

const CONTRACTOR_SUSPENDED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::ContractorSuspended,
    subject: "Your marketplace listing is suspended",
    body: "Hi {contact_name}, {company} was suspended: {decision_reason}. Reference \
           {reference}.",
};

const CONTRACTOR_REACTIVATED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::ContractorReactivated,
    subject: "Your marketplace listing is active again",
    body: "Hi {contact_name}, {company} was reactivated and can accept installations. \
           Reference {reference}.",
};

const CONTRACTOR_DEACTIVATED: MessageTemplate = MessageTemplate {
    kind: TemplateKind::ContractorDeactivated,
    subject: "Your marketplace account was deactivated",
    body: "Hi {contact_name}, {company} was deactivated and no longer appears in \
           matching. Reference {reference}.",
};

const STATUS_UPDATE: MessageTemplate = MessageTemplate {
    kind: TemplateKind::StatusUpdate,
    subject: "Status update on {reference}",
    body: "Your record {reference} moved from {from_state} to {to_state}.",
};

/// Template selection keys off the full edge identity — from, to, and path
/// tag — never the destination state alone. The two contractor paths into
/// `approved` carry different messages.
pub(crate) fn select(
    kind: LifecycleKind,
    from: &'static str,
    to: &'static str,
    path: PathTag,
) -> &'static MessageTemplate {
    match kind {
        LifecycleKind::RebateApplication => select_rebate(from, to),
        LifecycleKind::ContractorOnboarding => select_contractor(from, to, path),
    }
}

fn select_rebate(from: &str, to: &str) -> &'static MessageTemplate {
    match (from, to) {
        (_, "rejected") => &APPLICATION_REJECTED,
        (_, "documents_requested") => &DOCUMENTS_REQUESTED,
        ("documents_requested", "documents_received") => &DOCUMENTS_RECEIVED,
        ("documents_received", "submitted_to_program") => &PROGRAM_SUBMISSION,
        ("submitted_to_program", "approved") => &APPLICATION_APPROVED,
        ("approved", "contractor_matched") => &CONTRACTOR_MATCHED,
        ("contractor_matched", "installation_in_progress") => &INSTALLATION_STARTED,
        ("installation_in_progress", "completed") => &INSTALLATION_COMPLETED,
        _ => &STATUS_UPDATE,
    }
}

fn select_contractor(from: &str, to: &str, path: PathTag) -> &'static MessageTemplate {
    match (from, to, path) {
        ("pending", "approved", PathTag::FastTrack) => &CONTRACTOR_WELCOME,
        ("pending", "details_requested", _) => &ONBOARDING_DETAILS_REQUESTED,
        ("details_requested", "awaiting_state_approval", _) => &STATE_APPROVAL_PENDING,
        ("awaiting_state_approval", "invoice_sent", _) => &ONBOARDING_INVOICE,
        ("invoice_sent", "payment_pending", _) => &PAYMENT_PROCESSING,
        ("payment_pending", "approved", _) => &CONTRACTOR_APPROVED,
        ("suspended", "approved", _) => &CONTRACTOR_REACTIVATED,
        ("approved", "suspended", _) => &CONTRACTOR_SUSPENDED,
        (_, "deactivated", _) => &CONTRACTOR_DEACTIVATED,
        _ => &STATUS_UPDATE,
    }
}

/// Placeholder fields the context failed to provide.
#[derive(Debug, thiserror::Error)]
#[error("template context missing fields: {}", missing.join(", "))]
pub struct RenderError {
    pub missing: Vec<String>,
}

pub(crate) fn render(
    template: &MessageTemplate,
    context: &BTreeMap<String, String>,
) -> Result<(String, String), RenderError> {
    let mut missing = Vec::new();
    let subject = substitute(template.subject, context, &mut missing);
    let body = substitute(template.body, context, &mut missing);
    if missing.is_empty() {
        Ok((subject, body))
    } else {
        Err(RenderError { missing })
    }
}

fn substitute(
    text: &str,
    context: &BTreeMap<String, String>,
    missing: &mut Vec<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        match rest[open + 1..].find('}') {
            Some(close) => {
                let field = &rest[open + 1..open + 1 + close];
                match context.get(field) {
                    Some(value) => out.push_str(value),
                    None => {
                        if !missing.iter().any(|seen| seen == field) {
                            missing.push(field.to_string());
                        }
                        out.push('{');
                        out.push_str(field);
                        out.push('}');
                    }
                }
                rest = &rest[open + close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
