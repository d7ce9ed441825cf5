//! Infrastructure definitions for a static website behind CloudFront, with
//! the cross region plumbing CloudFront needs: certificates and Lambda@Edge
//! functions must live in us-east-1 no matter where the rest of the site is
//! deployed.
//!
//! Definitions are built into a [`tree::Tree`] and synthesized into one
//! CloudFormation template per stack with [`synth`].

pub mod app;
pub mod config;
pub mod constructs;
pub mod cross_region;
pub mod error;
pub mod metric;
pub mod regions;
pub mod resources;
pub mod stacks;
pub mod synth;
pub mod token;
pub mod tree;

pub use error::{Error, Result};
pub use token::{NodeId, StrVal};
pub use tree::{Environment, Tree};
