//! BMC Secret Controller Library
//!
//! Syncs BMC credentials held in `BMCSecret` resources to HashiCorp Vault, one
//! secret per BMC that references them, and removes them again on deletion.
//!
//! ## Quick Start
//!
//! ```rust
//! use bmc_secret_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod paths;
pub mod prelude;
pub mod provider;
pub mod runtime;
