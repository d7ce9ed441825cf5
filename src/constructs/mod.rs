//! Higher level constructs built from several resources.

pub mod certificate;
pub mod edge_function;
pub mod function;

use crate::error::{Error, Result};
use crate::regions::CLOUDFRONT_REGION;
use crate::token::NodeId;
use crate::tree::Tree;

pub use certificate::{CertificateProps, CloudFrontDnsValidatedCertificate, HostedZoneRef};
pub use edge_function::EdgeFunction;
pub use function::{FunctionProps, LambdaFunction};

/// Where a region bound facade put its real resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// the facade's stack is already in the required region. `resource`
    /// lives next to the facade.
    SameRegion { resource: NodeId },
    /// `resource` lives in `companion`, and its value reaches the facade's
    /// stack through the parameter at `parameter_name`.
    CrossRegion { companion: NodeId, resource: NodeId, parameter_name: String },
}

impl Placement {
    pub fn resource(&self) -> NodeId {
        match self {
            Placement::SameRegion { resource } => *resource,
            Placement::CrossRegion { resource, .. } => *resource,
        }
    }

    pub fn companion(&self) -> Option<NodeId> {
        match self {
            Placement::SameRegion { .. } => None,
            Placement::CrossRegion { companion, .. } => Some(*companion),
        }
    }

    pub fn is_cross_region(&self) -> bool {
        matches!(self, Placement::CrossRegion { .. })
    }
}

/// Region of the stack `scope` is defined in, which must be explicit.
/// Returns it along with whether it is the CloudFront region.
pub(crate) fn concrete_region(tree: &Tree, scope: NodeId, what: &str) -> Result<(String, bool)> {
    tree.require_stack(scope)?;
    match tree.region_of(scope) {
        Some(region) => Ok((region.to_string(), region == CLOUDFRONT_REGION)),
        None => Err(Error::UnresolvedRegion(format!(
            "Stacks which use {what} must have an explicitly set region. {} has none",
            tree.display_path(scope),
        ))),
    }
}
