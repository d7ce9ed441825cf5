use tracing::info;

use crate::config::{AppConfig, StageConfig};
use crate::constructs::function::FunctionProps;
use crate::error::Result;
use crate::stacks::{CloudFrontStack, CloudFrontStackProps, EdgeLambda, HostedZoneStack};
use crate::synth::{self, CloudAssembly};
use crate::token::NodeId;
use crate::tree::{Environment, Tree};

pub const HOSTED_ZONE_STACK_ID: &str = "HostedZoneStack";
pub const CLOUDFRONT_STACK_ID: &str = "CloudFrontStack";

/// The stacks defined for one configured stage.
#[derive(Debug, Clone)]
pub struct StageStacks {
    pub stage: NodeId,
    pub hosted_zone: Option<HostedZoneStack>,
    pub cloudfront: CloudFrontStack,
}

/// Defines one stage per configured stage.
pub fn build(config: &AppConfig) -> Result<(Tree, Vec<StageStacks>)> {
    let mut tree = Tree::new();
    let mut stages = Vec::with_capacity(config.stages.len());
    for stage in config.stages.iter() {
        stages.push(define_stage(&mut tree, stage)?);
    }
    Ok((tree, stages))
}

pub fn define_stage(tree: &mut Tree, config: &StageConfig) -> Result<StageStacks> {
    let stage = tree.add_stage(tree.root(), &config.name)?;
    let env = Environment { account: config.account.clone(), region: Some(config.region.clone()) };

    let hosted_zone = match &config.hosted_zone {
        Some(zone) => Some(HostedZoneStack::new(tree, stage, HOSTED_ZONE_STACK_ID, env.clone(), &zone.zone_name)?),
        None => None,
    };

    let edge_lambdas = config.edge_function.iter().map(|edge| EdgeLambda {
        event_type: edge.event_type,
        props: FunctionProps {
            runtime: edge.runtime.clone(),
            handler: edge.handler.clone(),
            code_bucket: edge.code_bucket.as_str().into(),
            code_key: edge.code_key.as_str().into(),
            memory_size: edge.memory_size,
            timeout: edge.timeout,
            ..Default::default()
        },
    }).collect();

    let cloudfront = CloudFrontStack::new(tree, stage, CLOUDFRONT_STACK_ID, env, CloudFrontStackProps {
        hosted_zone: hosted_zone.as_ref().map(|z| z.hosted_zone_ref()),
        edge_lambdas,
    })?;
    info!("defined stage {} in {}", config.name, config.region);
    Ok(StageStacks { stage, hosted_zone, cloudfront })
}

/// Builds and synthesizes the whole app, one assembly per stage.
pub fn synth(config: &AppConfig) -> Result<Vec<CloudAssembly>> {
    let (tree, _) = build(config)?;
    synth::synth_app(&tree)
}
