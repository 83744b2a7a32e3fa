use crate::api::v1beta1::mariadb::{MariaDB, MariaDBSpec, MARIADB_FINALIZER};
use crate::util::adoption::{
    invalid_configuration_condition, resolve_adoption, AdoptionMode, INVALID_CONFIGURATION_CONDITION,
};
use crate::util::conditions::{Conditions, READY_CONDITION};
use crate::util::defaults::{effective_container_image, Defaults};
use crate::util::errors::{Error, ErrorWithRequeue, Result, StdError};
use crate::util::readiness::{compute_readiness, redirected_readiness};
use crate::util::{metrics, telemetry};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::{
    api::{Api, ListParams, Patch, PatchParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType, Recorder, Reporter},
        finalizer::{finalizer, Event as Finalizer},
        watcher::Config,
    },
    Resource,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

pub const FIELD_MANAGER: &str = "mariadb-controller";

/// Condition types written by this controller. Everything else in the status belongs to
/// the collaborators reporting progress.
pub const OWNED_CONDITIONS: [&str; 2] = [READY_CONDITION, INVALID_CONFIGURATION_CONDITION];

const READY_REQUEUE: Duration = Duration::from_secs(5 * 60);
const NOT_READY_REQUEUE: Duration = Duration::from_secs(30);

/// Evaluates one pass over a snapshot of the spec and its reported conditions.
///
/// Returns the condition set the resource should carry: the reported conditions plus
/// `InvalidConfiguration` (when the adoption host is malformed) and the `Ready` verdict.
pub fn evaluate(spec: &MariaDBSpec, reported: &Conditions) -> Conditions {
    let mut conditions = reported.clone();
    let mode = resolve_adoption(spec);

    match invalid_configuration_condition(&mode) {
        Some(invalid) => {
            conditions.set(invalid);
        }
        None => {
            conditions.remove(INVALID_CONFIGURATION_CONDITION);
        }
    }

    let ready = match &mode {
        AdoptionMode::Redirected { host } => redirected_readiness(&conditions, host),
        AdoptionMode::SelfManaged => compute_readiness(&conditions),
    };
    conditions.put_ready(ready);
    conditions
}

/// The subset of `conditions` this controller applies, in a stable order.
pub fn owned_conditions(conditions: &Conditions) -> Vec<Condition> {
    OWNED_CONDITIONS
        .iter()
        .filter_map(|t| conditions.get(t).cloned())
        .collect()
}

impl MariaDB {
    // Reconcile (for non-finalizer related changes)
    #[instrument(skip(self, ctx), fields(name = %self.name_any(), trace_id))]
    pub async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let trace_id = telemetry::get_trace_id();
        Span::current().record("trace_id", field::display(&trace_id));

        let name = self.name_any();
        let namespace = self.namespace().ok_or_else(|| {
            Error::ErrorWithRequeue(ErrorWithRequeue::new(
                StdError::MetadataMissing(format!("MariaDB {name} has no namespace")),
                READY_REQUEUE,
            ))
        })?;

        let mode = resolve_adoption(&self.spec);
        match &mode {
            AdoptionMode::Redirected { host } => {
                info!(%host, "adoption redirect active, self-managed provisioning is skipped")
            }
            AdoptionMode::SelfManaged => debug!(
                image = effective_container_image(&self.spec, &ctx.defaults),
                "self-managed instance"
            ),
        }

        let reported = self
            .status
            .as_ref()
            .map(|s| s.conditions.clone())
            .unwrap_or_default();
        let desired = evaluate(&self.spec, &reported);

        let ready = desired.is_true(READY_CONDITION);
        ctx.metrics.set_ready(self, ready);
        let requeue = Action::requeue(if ready { READY_REQUEUE } else { NOT_READY_REQUEUE });

        let owned = owned_conditions(&desired);
        if owned == owned_conditions(&reported) {
            debug!("status is up to date");
            return Ok(requeue);
        }

        let mariadbs: Api<MariaDB> = Api::namespaced(ctx.client.clone(), &namespace);
        let patch = Patch::Apply(json!({
            "apiVersion": MariaDB::api_version(&()),
            "kind": MariaDB::kind(&()),
            "status": {
                "conditions": owned
            }
        }));
        mariadbs
            .patch_status(&name, &PatchParams::apply(FIELD_MANAGER).force(), &patch)
            .await?;

        if let Some(verdict) = desired.get(READY_CONDITION) {
            info!(
                status = %verdict.status,
                reason = %verdict.reason,
                message = %verdict.message,
                "updated Ready condition"
            );
        }
        Ok(requeue)
    }

    // Finalizer cleanup (the object was deleted, ensure nothing is orphaned)
    async fn cleanup(&self, ctx: Arc<Context>) -> Result<Action> {
        let recorder = ctx.diagnostics.read().await.recorder(ctx.client.clone());
        ctx.metrics.forget(self);
        // MariaDB doesn't own anything itself, so we just publish an event
        recorder
            .publish(
                &Event {
                    type_: EventType::Normal,
                    reason: "DeleteRequested".into(),
                    note: Some(format!("Delete `{}`", self.name_any())),
                    action: "Deleting".into(),
                    secondary: None,
                },
                &self.object_ref(&()),
            )
            .await?;
        Ok(Action::await_change())
    }
}

/// State shared between the controller and the web server
#[derive(Clone)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
    metrics: metrics::Metrics,
    /// Defaults resolved at process start
    defaults: Arc<Defaults>,
}

/// State wrapper around the controller outputs for the web server
impl State {
    pub fn new(defaults: Defaults, reporter: &str) -> Result<Self, prometheus::Error> {
        let registry = prometheus::Registry::default();
        let metrics = metrics::Metrics::new()?.register(&registry)?;
        Ok(Self {
            diagnostics: Arc::new(RwLock::new(Diagnostics::new(reporter))),
            registry,
            metrics,
            defaults: Arc::new(defaults),
        })
    }

    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, client: Client) -> Arc<Context> {
        Arc::new(Context {
            client,
            metrics: self.metrics.clone(),
            diagnostics: self.diagnostics.clone(),
            defaults: self.defaults.clone(),
        })
    }
}

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: metrics::Metrics,
    /// Defaults resolved at process start
    pub defaults: Arc<Defaults>,
}

pub async fn reconcile(mariadb: Arc<MariaDB>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("mariadb");
    ctx.diagnostics.write().await.last_event = Utc::now();

    let ns = mariadb.namespace().unwrap_or_default();
    let mariadbs: Api<MariaDB> = Api::namespaced(ctx.client.clone(), &ns);

    info!("Reconciling MariaDB \"{}\" in {}", mariadb.name_any(), ns);
    finalizer(&mariadbs, MARIADB_FINALIZER, mariadb, |event| async {
        match event {
            Finalizer::Apply(mariadb) => mariadb.reconcile(ctx.clone()).await,
            Finalizer::Cleanup(mariadb) => mariadb.cleanup(ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::StdError(StdError::FinalizerError(Box::new(e))))
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}

impl Diagnostics {
    fn new(reporter: &str) -> Self {
        Self {
            last_event: Utc::now(),
            reporter: reporter.into(),
        }
    }

    fn recorder(&self, client: Client) -> Recorder {
        Recorder::new(client, self.reporter.clone())
    }
}

fn error_policy(mariadb: Arc<MariaDB>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&mariadb, error);
    match error {
        Error::ErrorWithRequeue(e) => Action::requeue(e.duration),
        Error::StdError(_) => Action::requeue(READY_REQUEUE),
    }
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State, client: Client) -> Result<()> {
    let mariadbs = Api::<MariaDB>::all(client.clone());
    if let Err(e) = mariadbs.list(&ListParams::default().limit(1)).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        return Err(e.into());
    }

    info!(
        container_image_url = %state.defaults().container_image_url,
        "starting MariaDB controller"
    );
    Controller::new(mariadbs, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client))
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{timeout_after_1s, Scenario};
    use crate::util::conditions::{false_condition, true_condition};
    use crate::util::readiness::{
        ADOPTION_REDIRECT_REASON, CREDENTIALS_READY_CONDITION, DB_INIT_READY_CONDITION,
        DEPLOYMENT_READY_CONDITION, READY_MESSAGE, REQUIRED_CONDITIONS, STORAGE_READY_CONDITION,
    };

    fn reported_all_ready() -> Conditions {
        let mut conditions = Conditions::new();
        for condition_type in REQUIRED_CONDITIONS {
            conditions.set(true_condition(condition_type, "Ready", "done"));
        }
        conditions
    }

    #[test]
    fn evaluate_self_managed() {
        let mut reported = reported_all_ready();
        reported.set(false_condition(
            DB_INIT_READY_CONDITION,
            "Requested",
            "mariadb-dbinit job running",
        ));

        let desired = evaluate(&MariaDBSpec::default(), &reported);
        let ready = desired.get(READY_CONDITION).unwrap();
        assert_eq!(ready.status, "False");
        assert_eq!(ready.message, "mariadb-dbinit job running");
        assert!(!desired.has(INVALID_CONFIGURATION_CONDITION));
        assert_eq!(desired.len(), reported.len() + 1);
    }

    #[test]
    fn evaluate_redirect_ignores_self_managed_stages() {
        let mut spec = MariaDBSpec::default();
        spec.adoption_redirect.host = "10.0.0.5".to_string();

        let desired = evaluate(&spec, &Conditions::new());
        let ready = desired.get(READY_CONDITION).unwrap();
        assert_eq!(ready.status, "True");
        assert_eq!(ready.reason, ADOPTION_REDIRECT_REASON);
    }

    #[test]
    fn evaluate_drops_stale_invalid_configuration() {
        let mut spec = MariaDBSpec::default();
        spec.adoption_redirect.host = "db..example.com".to_string();
        let broken = evaluate(&spec, &Conditions::new());
        assert!(broken.is_true(INVALID_CONFIGURATION_CONDITION));
        assert!(broken.is_false(READY_CONDITION));

        spec.adoption_redirect.host = "db.example.com".to_string();
        let fixed = evaluate(&spec, &broken);
        assert!(!fixed.has(INVALID_CONFIGURATION_CONDITION));
        assert!(fixed.is_true(READY_CONDITION));
    }

    #[test]
    fn evaluate_is_stable() {
        let reported = reported_all_ready();
        let once = evaluate(&MariaDBSpec::default(), &reported);
        let twice = evaluate(&MariaDBSpec::default(), &once);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn ready_mariadb_gets_ready_condition() {
        let (testctx, fakeserver) = Context::test();
        let mariadb = MariaDB::test("openstack").with_conditions(reported_all_ready());
        let mocksrv = fakeserver.run(Scenario::StatusPatch(mariadb.clone()));

        let action = mariadb.reconcile(testctx).await.expect("reconciler");
        assert_eq!(action, Action::requeue(READY_REQUEUE));

        let applied = timeout_after_1s(mocksrv).await;
        assert_eq!(applied.len(), 1);
        let ready = applied.get(READY_CONDITION).unwrap();
        assert_eq!(ready.status, "True");
        assert_eq!(ready.message, READY_MESSAGE);
    }

    #[tokio::test]
    async fn blocked_mariadb_reports_earliest_stage() {
        let (testctx, fakeserver) = Context::test();
        let mut reported = reported_all_ready();
        reported.set(false_condition(
            DEPLOYMENT_READY_CONDITION,
            "Requested",
            "0/1 replicas ready",
        ));
        reported.set(false_condition(
            STORAGE_READY_CONDITION,
            "Requested",
            "PersistentVolumeClaim pending",
        ));
        reported.remove(CREDENTIALS_READY_CONDITION);
        let mariadb = MariaDB::test("openstack").with_conditions(reported);
        let mocksrv = fakeserver.run(Scenario::StatusPatch(mariadb.clone()));

        let action = mariadb.reconcile(testctx).await.expect("reconciler");
        assert_eq!(action, Action::requeue(NOT_READY_REQUEUE));

        let applied = timeout_after_1s(mocksrv).await;
        let ready = applied.get(READY_CONDITION).unwrap();
        assert_eq!(ready.status, "False");
        assert_eq!(ready.message, "PersistentVolumeClaim pending");
    }

    #[tokio::test]
    async fn malformed_adoption_host_is_reported() {
        let (testctx, fakeserver) = Context::test();
        let mariadb = MariaDB::test("openstack").with_adoption_host("not a host!");
        let mocksrv = fakeserver.run(Scenario::StatusPatch(mariadb.clone()));

        mariadb.reconcile(testctx).await.expect("reconciler");

        let applied = timeout_after_1s(mocksrv).await;
        assert_eq!(applied.len(), 2);
        assert!(applied.is_true(INVALID_CONFIGURATION_CONDITION));
        assert!(applied.is_false(READY_CONDITION));
    }

    #[tokio::test]
    async fn unchanged_status_makes_no_api_call() {
        let (testctx, fakeserver) = Context::test();
        let settled = evaluate(&MariaDBSpec::default(), &reported_all_ready());
        let mariadb = MariaDB::test("openstack").with_conditions(settled);
        let mocksrv = fakeserver.run(Scenario::NoRequests);

        let action = mariadb.reconcile(testctx).await.expect("reconciler");
        assert_eq!(action, Action::requeue(READY_REQUEUE));
        assert!(timeout_after_1s(mocksrv).await.is_empty());
    }

    #[tokio::test]
    async fn missing_namespace_requeues() {
        let (testctx, _fakeserver) = Context::test();
        let mut mariadb = MariaDB::test("openstack");
        mariadb.metadata.namespace = None;

        let err = mariadb.reconcile(testctx.clone()).await.unwrap_err();
        assert!(matches!(err, Error::ErrorWithRequeue(_)));
        let action = error_policy(Arc::new(mariadb), &err, testctx);
        assert_eq!(action, Action::requeue(READY_REQUEUE));
    }
}
