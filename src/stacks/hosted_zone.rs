use crate::constructs::HostedZoneRef;
use crate::error::Result;
use crate::resources::route53::HostedZone;
use crate::token::{NodeId, StrVal};
use crate::tree::{Environment, Tree};

pub const HOSTED_ZONE_ID: &str = "HostedZone";

/// A stack holding a single public hosted zone.
#[derive(Debug, Clone)]
pub struct HostedZoneStack {
    stack: NodeId,
    hosted_zone: NodeId,
    zone_name: String,
}

impl HostedZoneStack {
    pub fn new(tree: &mut Tree, scope: NodeId, id: &str, env: Environment, zone_name: &str) -> Result<Self> {
        let stack = tree.add_stack(scope, id, env)?;
        let hosted_zone = tree.add_resource(stack, HOSTED_ZONE_ID, HostedZone { name: zone_name.to_string() })?;
        Ok(Self { stack, hosted_zone, zone_name: zone_name.to_string() })
    }

    pub fn stack(&self) -> NodeId {
        self.stack
    }

    pub fn hosted_zone(&self) -> NodeId {
        self.hosted_zone
    }

    pub fn hosted_zone_ref(&self) -> HostedZoneRef {
        HostedZoneRef { hosted_zone_id: StrVal::Ref(self.hosted_zone), zone_name: self.zone_name.clone() }
    }
}
