use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use rebate_match::config::OnboardingSettings;
use rebate_match::workflows::contractor::onboarding::{
    ContractorOnboardingService, ContractorRecord, OnboardingFeePolicy,
};
use rebate_match::workflows::lifecycle::InMemoryLifecycleStore;
use rebate_match::workflows::notifications::{
    InMemoryNotificationFeed, NotificationDispatcher, TracingMailer,
};
use rebate_match::workflows::rebate::applications::{
    InMemoryEvidenceStore, RebateApplication, RebateApplicationService,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ApplicationService =
    RebateApplicationService<InMemoryLifecycleStore<RebateApplication>, InMemoryEvidenceStore>;
pub(crate) type OnboardingService =
    ContractorOnboardingService<InMemoryLifecycleStore<ContractorRecord>>;

/// The wired-up service graph behind the HTTP surface and the demo.
pub(crate) struct Marketplace {
    pub(crate) applications: Arc<ApplicationService>,
    pub(crate) contractors: Arc<OnboardingService>,
    pub(crate) dispatcher: Arc<NotificationDispatcher>,
}

/// Assemble both lifecycle services over the library's in-memory reference
/// stores, sharing one notification dispatcher so the feed is unified.
pub(crate) fn build_marketplace(settings: OnboardingSettings) -> Marketplace {
    let feed = Arc::new(InMemoryNotificationFeed::default());
    let mailer = Arc::new(TracingMailer);
    let dispatcher = Arc::new(NotificationDispatcher::new(feed, mailer));

    let applications = Arc::new(RebateApplicationService::new(
        Arc::new(InMemoryLifecycleStore::default()),
        Arc::new(InMemoryEvidenceStore::default()),
        dispatcher.clone(),
    ));
    let contractors = Arc::new(ContractorOnboardingService::new(
        Arc::new(InMemoryLifecycleStore::default()),
        dispatcher.clone(),
        OnboardingFeePolicy {
            amount_cents: settings.fee_cents,
            due_days: settings.fee_due_days,
        },
    ));

    Marketplace {
        applications,
        contractors,
        dispatcher,
    }
}
