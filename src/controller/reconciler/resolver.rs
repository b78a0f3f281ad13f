//! # BMC Resolver
//!
//! Finds the BMCs that reference a BMCSecret, derives their routing variables,
//! and extracts the credentials from the secret.

use crate::constants::UNKNOWN_REGION;
use crate::crd::{BMCSecret, BMC};
use kube::ResourceExt;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("BMCSecret {secret} has no {key} key")]
    Missing { secret: String, key: &'static str },

    #[error("BMCSecret {secret} has an empty {key}")]
    Empty { secret: String, key: &'static str },

    #[error("{key} in BMCSecret {secret} is not valid UTF-8")]
    NotUtf8 { secret: String, key: &'static str },
}

/// Username and password of a BMCSecret, wiped from memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Routing variables of one BMC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmcTarget {
    pub name: String,
    pub region: String,
    pub hostname: String,
}

impl BmcTarget {
    pub fn from_bmc(bmc: &BMC, region_label_key: &str) -> Self {
        Self {
            name: bmc.name_any(),
            region: region_of(bmc, region_label_key),
            hostname: hostname_of(bmc),
        }
    }
}

/// BMCs whose `bmcSecretRef` names `secret_name`
pub fn bmcs_for_secret(bmcs: Vec<BMC>, secret_name: &str) -> Vec<BMC> {
    bmcs.into_iter()
        .filter(|bmc| bmc.secret_name() == Some(secret_name))
        .collect()
}

/// Value of the region label, or `unknown` when absent or empty
pub fn region_of(bmc: &BMC, region_label_key: &str) -> String {
    bmc.labels()
        .get(region_label_key)
        .filter(|region| !region.is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN_REGION.to_string())
}

/// Declared hostname, else the endpoint reference name, else the BMC name
pub fn hostname_of(bmc: &BMC) -> String {
    let endpoint = bmc.spec.endpoint_ref.as_ref().map(|r| r.name.as_str());
    bmc.spec
        .hostname
        .as_deref()
        .into_iter()
        .chain(endpoint)
        .find(|candidate| !candidate.is_empty())
        .map_or_else(|| bmc.name_any(), str::to_string)
}

/// Read `username` and `password` from the secret data
///
/// # Errors
///
/// Returns [`CredentialError`] when a key is missing, empty, or not UTF-8.
pub fn extract_credentials(secret: &BMCSecret) -> Result<Credentials, CredentialError> {
    let name = secret.name_any();
    let username = read_key(secret, &name, USERNAME_KEY)?;
    let password = read_key(secret, &name, PASSWORD_KEY)?;
    Ok(Credentials { username, password })
}

fn read_key(secret: &BMCSecret, name: &str, key: &'static str) -> Result<String, CredentialError> {
    let bytes = secret.value(key).ok_or_else(|| CredentialError::Missing {
        secret: name.to_string(),
        key,
    })?;
    if bytes.is_empty() {
        return Err(CredentialError::Empty {
            secret: name.to_string(),
            key,
        });
    }
    String::from_utf8(bytes.to_vec()).map_err(|_| CredentialError::NotUtf8 {
        secret: name.to_string(),
        key,
    })
}
