//! Helper methods only available for tests
use crate::api::v1beta1::mariadb::{AdoptionRedirectSpec, MariaDB, MariaDBSpec, MariaDBStatus};
use crate::controllers::mariadb_controller::{Context, State};
use crate::util::conditions::Conditions;
use crate::util::defaults::{Defaults, MARIADB_CONTAINER_IMAGE};
use http::{Request, Response};
use kube::{client::Body, Client, Resource, ResourceExt};

impl MariaDB {
    /// A normal test MariaDB with no status
    pub fn test(name: &str) -> Self {
        let mut mariadb = MariaDB::new(
            name,
            MariaDBSpec {
                secret: "osp-secret".to_string(),
                storage_request: "500M".to_string(),
                ..Default::default()
            },
        );
        mariadb.meta_mut().namespace = Some("default".into());
        mariadb
    }

    /// Modify a MariaDB to carry the given reported conditions
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.status = Some(MariaDBStatus {
            conditions,
            ..Default::default()
        });
        self
    }

    /// Modify a MariaDB to redirect to an external host
    pub fn with_adoption_host(mut self, host: &str) -> Self {
        self.spec.adoption_redirect = AdoptionRedirectSpec {
            host: host.to_string(),
        };
        self
    }
}

// We wrap tower_test::mock::Handle
type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;
pub struct ApiServerVerifier(ApiServerHandle);

/// Scenarios we test for in ApiServerVerifier
pub enum Scenario {
    /// The reconciler applies the owned conditions through the status subresource
    StatusPatch(MariaDB),
    /// The reconciler has nothing to write
    NoRequests,
}

pub async fn timeout_after_1s(handle: tokio::task::JoinHandle<Conditions>) -> Conditions {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("scenario succeeded")
}

impl ApiServerVerifier {
    /// Tests only get to run specific scenarios that has matching handlers
    ///
    /// The returned handle resolves to the conditions carried by the status patch, or to an
    /// empty set when no request was expected.
    pub fn run(self, scenario: Scenario) -> tokio::task::JoinHandle<Conditions> {
        tokio::spawn(async move {
            match scenario {
                Scenario::StatusPatch(mariadb) => self.handle_status_patch(mariadb).await,
                Scenario::NoRequests => self.handle_no_requests().await,
            }
        })
    }

    async fn handle_status_patch(mut self, mariadb: MariaDB) -> Conditions {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::PATCH);
        assert_eq!(
            request.uri().path(),
            format!(
                "/apis/mariadb.openstack.org/v1beta1/namespaces/default/mariadbs/{}/status",
                mariadb.name_any()
            )
        );
        let req_body = request.into_body().collect_bytes().await.unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&req_body).expect("patch object is json");
        assert_eq!(json["kind"], "MariaDB");
        assert_eq!(json["apiVersion"], "mariadb.openstack.org/v1beta1");
        let conditions: Conditions =
            serde_json::from_value(json["status"]["conditions"].clone()).expect("valid conditions");

        let response = mariadb.with_conditions(conditions.clone());
        let response = serde_json::to_vec(&response).unwrap();
        send.send_response(Response::builder().body(Body::from(response)).unwrap());
        conditions
    }

    async fn handle_no_requests(mut self) -> Conditions {
        // The handle only yields None once every client clone is gone
        if let Some((request, _)) = self.0.next_request().await {
            panic!("unexpected {} {}", request.method(), request.uri());
        }
        Conditions::new()
    }
}

impl Context {
    // Create a test context with a mocked kube client, locally registered metrics and default diagnostics
    pub fn test() -> (std::sync::Arc<Self>, ApiServerVerifier) {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let mock_client = Client::new(mock_service, "default");
        let defaults = Defaults {
            container_image_url: MARIADB_CONTAINER_IMAGE.to_string(),
        };
        let state = State::new(defaults, "mariadb-controller-test").unwrap();
        (state.to_context(mock_client), ApiServerVerifier(handle))
    }
}
