//! # Path Templates
//!
//! Compiles secret path templates such as `bmc/{{.Region}}/{{.Hostname}}/{{.Username}}`
//! once and renders them for every (destination, BMC) pair.
//!
//! ## Quick Start
//!
//! ```rust
//! use bmc_secret_controller::paths::{PathTemplateBuilder, PathVariables};
//!
//! let builder = PathTemplateBuilder::new("bmc/{{.Region}}/{{.Hostname}}/{{.Username}}").unwrap();
//! let path = builder
//!     .render(&PathVariables::new("us-east-1", "bmc1.example.com", "admin"))
//!     .unwrap();
//! assert_eq!(path, "bmc/us-east-1/bmc1.example.com/admin");
//! ```

pub mod builder;
pub mod errors;

pub use builder::{PathTemplateBuilder, PathVariables};
pub use errors::TemplateError;
