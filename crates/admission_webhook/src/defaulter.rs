use json_patch::{AddOperation, PatchOperation};
use jsonptr::PointerBuf;
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
    DynamicObject,
};
use mariadb::api::v1beta1::mariadb::{MariaDB, MariaDBSpec};
use mariadb::util::adoption::{resolve_adoption, validate_host};
use mariadb::util::defaults::{apply_defaults, Defaults};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mutating admission for MariaDB: fills unset spec fields from the process defaults.
///
/// Never rejects. Malformed adoption hosts are surfaced as admission warnings and left for
/// the controller to report.
#[derive(Clone)]
pub struct MariaDBDefaulter {
    defaults: Arc<Defaults>,
}

impl MariaDBDefaulter {
    pub fn new(defaults: Defaults) -> Self {
        Self {
            defaults: Arc::new(defaults),
        }
    }

    pub fn mutate(&self, review: AdmissionReview<MariaDB>) -> AdmissionReview<DynamicObject> {
        let request: AdmissionRequest<MariaDB> = match review.try_into() {
            Ok(request) => request,
            Err(e) => {
                warn!("Invalid admission review: {}", e);
                return AdmissionResponse::invalid(e.to_string()).into_review();
            }
        };
        self.mutate_request(&request).into_review()
    }

    fn mutate_request(&self, request: &AdmissionRequest<MariaDB>) -> AdmissionResponse {
        let mut response = AdmissionResponse::from(request);
        if !matches!(request.operation, Operation::Create | Operation::Update) {
            return response;
        }
        let Some(mariadb) = request.object.as_ref() else {
            return response;
        };

        let warnings = host_warnings(&mariadb.spec);
        if !warnings.is_empty() {
            response.warnings = Some(warnings.clone());
        }

        let ops = default_patch(&mariadb.spec, &self.defaults);
        if ops.is_empty() {
            debug!(uid = %request.uid, "nothing to default");
            return response;
        }

        info!(uid = %request.uid, name = %request.name, patch_ops = ops.len(), "defaulting MariaDB");
        match response.with_patch(json_patch::Patch(ops)) {
            Ok(response) => response,
            Err(e) => {
                warn!(uid = %request.uid, "Failed to serialize patch: {}", e);
                let mut response = AdmissionResponse::from(request);
                if !warnings.is_empty() {
                    response.warnings = Some(warnings);
                }
                response
            }
        }
    }
}

/// JSON patch filling every unset field of `spec` from `defaults`.
pub fn default_patch(spec: &MariaDBSpec, defaults: &Defaults) -> Vec<PatchOperation> {
    let mut defaulted = spec.clone();
    if !apply_defaults(&mut defaulted, defaults) {
        return Vec::new();
    }

    let mut ops = Vec::new();
    if defaulted.container_image != spec.container_image {
        ops.push(PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["spec", "containerImage"]),
            value: serde_json::Value::String(defaulted.container_image),
        }));
    }
    ops
}

/// Admission warnings for configuration the controller will report as invalid.
pub fn host_warnings(spec: &MariaDBSpec) -> Vec<String> {
    resolve_adoption(spec)
        .host()
        .and_then(|host| validate_host(host).err())
        .map(|reason| format!("spec.adoptionRedirect.host: {reason}"))
        .into_iter()
        .collect()
}
