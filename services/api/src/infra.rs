use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use transit_hub::agencies::{NotificationError, NotificationPublisher, ReviewNotice};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Notification sink for the standalone service: notices are written to the log stream.
#[derive(Debug, Default, Clone)]
pub(crate) struct TracingNotifications;

impl NotificationPublisher for TracingNotifications {
    fn publish(&self, notice: ReviewNotice) -> Result<(), NotificationError> {
        info!(
            template = %notice.template,
            agency_id = %notice.agency_id,
            details = ?notice.details,
            "agency notification"
        );
        Ok(())
    }
}
