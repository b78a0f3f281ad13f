//! # Metal Resources
//!
//! `BMCSecret` and `BMC` are owned by the metal operator. Only the fields this
//! controller reads are modelled; unknown fields are ignored on deserialization.
//!
//! `BMCSecret` is shaped like a core `Secret` (top-level `data`, no `spec`), so it
//! implements [`kube::Resource`] by hand instead of deriving `CustomResource`.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

const METAL_GROUP: &str = "metal.ironcore.dev";
const METAL_VERSION: &str = "v1alpha1";

/// BMC credentials
///
/// ```yaml
/// apiVersion: metal.ironcore.dev/v1alpha1
/// kind: BMCSecret
/// metadata:
///   name: bmc-rack1-creds
///   labels:
///     sync-enabled: "true"
/// data:
///   username: YWRtaW4=
///   password: c2VjcmV0
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BMCSecret {
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, ByteString>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
}

impl kube::Resource for BMCSecret {
    type DynamicType = ();
    type Scope = k8s_openapi::ClusterResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("BMCSecret")
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(METAL_GROUP)
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(METAL_VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("bmcsecrets")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl BMCSecret {
    /// Raw bytes stored under `key`, if any
    pub fn value(&self, key: &str) -> Option<&[u8]> {
        self.data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(|bytes| bytes.0.as_slice())
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|finalizers| finalizers.iter().any(|f| f == finalizer))
    }
}

/// Reference to a cluster-scoped object by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct LocalObjectReference {
    #[serde(default)]
    pub name: String,
}

/// Baseboard management controller
///
/// The region of a BMC is read from one of its labels (default `region`). Its
/// hostname falls back to the endpoint reference name, then to the BMC name.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "BMC",
    group = "metal.ironcore.dev",
    version = "v1alpha1",
    plural = "bmcs"
)]
#[serde(rename_all = "camelCase")]
pub struct BMCSpec {
    /// BMCSecret holding the credentials for this BMC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmc_secret_ref: Option<LocalObjectReference>,
    /// Endpoint object the BMC is reachable through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_ref: Option<LocalObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl BMC {
    /// Name of the BMCSecret this BMC authenticates with
    pub fn secret_name(&self) -> Option<&str> {
        self.spec
            .bmc_secret_ref
            .as_ref()
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty())
    }
}
