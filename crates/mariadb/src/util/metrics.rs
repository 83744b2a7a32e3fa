use crate::api::v1beta1::mariadb::MariaDB;
use crate::util::errors::Error;
use kube::ResourceExt;
use prometheus::{
    histogram_opts, opts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Registry,
};
use tokio::time::Instant;
use tracing::debug;

#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounter,
    pub failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
    pub ready: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "controller_reconcile_duration_seconds",
                "The duration of reconcile to complete in seconds",
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &["instance"],
        )?;
        let failures = IntCounterVec::new(
            opts!("controller_reconciliation_errors_total", "reconciliation errors",),
            &["instance", "error"],
        )?;
        let reconciliations = IntCounter::new("reconciliations_total", "reconciliations")?;
        let ready = IntGaugeVec::new(
            opts!("mariadb_ready", "1 when the MariaDB Ready condition is True"),
            &["namespace", "name"],
        )?;
        Ok(Metrics {
            reconciliations,
            failures,
            reconcile_duration,
            ready,
        })
    }

    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.ready.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure(&self, mariadb: &MariaDB, e: &Error) {
        debug!(
            name = %mariadb.name_any(),
            error = %e.metric_label(),
            "recording reconcile failure"
        );
        self.failures
            .with_label_values(&[mariadb.name_any().as_ref(), e.metric_label().as_ref()])
            .inc()
    }

    pub fn set_ready(&self, mariadb: &MariaDB, ready: bool) {
        let namespace = mariadb.namespace().unwrap_or_default();
        self.ready
            .with_label_values(&[namespace.as_str(), mariadb.name_any().as_str()])
            .set(i64::from(ready))
    }

    pub fn forget(&self, mariadb: &MariaDB) {
        let namespace = mariadb.namespace().unwrap_or_default();
        // Absent series are fine, nothing was ever recorded for it
        let _ = self
            .ready
            .remove_label_values(&[namespace.as_str(), mariadb.name_any().as_str()]);
    }

    pub fn count_and_measure(&self, controller: &str) -> ReconcileMeasurer {
        self.reconciliations.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
            instance: controller.to_string(),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
    instance: String,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric
            .with_label_values(&[self.instance.as_str()])
            .observe(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_gauge_tracks_each_resource() {
        let registry = Registry::new();
        let metrics = Metrics::new().unwrap().register(&registry).unwrap();

        let mut mariadb = MariaDB::new("openstack", Default::default());
        mariadb.metadata.namespace = Some("openstack".to_string());

        metrics.set_ready(&mariadb, true);
        assert_eq!(
            metrics.ready.with_label_values(&["openstack", "openstack"]).get(),
            1
        );

        metrics.set_ready(&mariadb, false);
        assert_eq!(
            metrics.ready.with_label_values(&["openstack", "openstack"]).get(),
            0
        );
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry = Registry::new();
        Metrics::new().unwrap().register(&registry).unwrap();
        assert!(Metrics::new().unwrap().register(&registry).is_err());
    }
}
