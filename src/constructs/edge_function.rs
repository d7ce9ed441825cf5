//! A Lambda@Edge function that can be defined in any region.
//!
//! Lambda@Edge functions must live in us-east-1. From any other region the
//! function is created in a support stack in us-east-1, and the arn of its
//! current version is read back through the cross region parameter channel.
//! The version's logical id is passed as the read's refresh token, so a new
//! version is always read again.

use crate::cross_region::{self, channel, ParameterKind};
use crate::error::{Error, Result};
use crate::metric::{Metric, MetricOptions};
use crate::regions::CLOUDFRONT_REGION;
use crate::resources::iam::{PolicyStatement, Role};
use crate::token::{NodeId, StrVal};
use crate::tree::Tree;

use super::function::{
    AliasOptions, AsyncInvokeOptions, EventSource, EventSourceMappingOptions, FunctionProps, Grant, LambdaFunction,
    PermissionProps, Principal,
};
use super::{concrete_region, Placement};

pub const SUPPORT_STACK_ID: &str = "CloudFrontEdgeFunctionSupportStack";
pub const FUNCTION_ID: &str = "EdgeFunction";
pub const ROLE_READER_ID: &str = "EdgeFunctionCrossRegionRole";
pub const EDGE_LAMBDA_SERVICE: &str = "edgelambda.amazonaws.com";

#[derive(Debug, Clone)]
pub struct EdgeFunction {
    node: NodeId,
    lambda: LambdaFunction,
    edge_arn: StrVal,
    version: StrVal,
    placement: Placement,
}

impl EdgeFunction {
    pub fn new(tree: &mut Tree, scope: NodeId, id: &str, mut props: FunctionProps) -> Result<Self> {
        let (region, in_cloudfront_region) = concrete_region(tree, scope, "EdgeFunction")?;
        let node = tree.add_construct(scope, id)?;

        let (lambda, edge_arn, placement) = if in_cloudfront_region {
            let lambda = LambdaFunction::new(tree, node, FUNCTION_ID, props)?;
            let edge_arn = lambda.version_arn();
            let placement = Placement::SameRegion { resource: lambda.function() };
            (lambda, edge_arn, placement)
        } else {
            let companion = cross_region::resolve(tree, node, CLOUDFRONT_REGION, SUPPORT_STACK_ID)?;
            let group_id = tree.unique_id(node);
            let group = tree.add_construct(companion, &group_id)?;
            if let Some(role) = props.role.take() {
                props.role = Some(cross_region::propagate(
                    tree,
                    group,
                    ROLE_READER_ID,
                    node,
                    ParameterKind::EdgeFunctionRole,
                    role,
                )?);
            }
            let lambda = LambdaFunction::new(tree, group, id, props)?;

            let key = channel::parameter_key(ParameterKind::EdgeFunction, &region, &tree.path(node));
            cross_region::store(tree, lambda.node(), &key, lambda.version_arn())?;
            let refresh_token = tree.logical_id(lambda.current_version()).map_err(|e| {
                Error::MissingVersionResource(format!(
                    "Lambda@Edge function {} has no current version resource\n{e}",
                    tree.display_path(node),
                ))
            })?;
            let edge_arn = cross_region::read(tree, node, &key, CLOUDFRONT_REGION, Some(refresh_token.into()))?;
            let placement = Placement::CrossRegion {
                companion,
                resource: lambda.function(),
                parameter_name: channel::namespaced(&key),
            };
            (lambda, edge_arn, placement)
        };

        if let Some(role) = lambda.role() {
            if let Some(role) = tree.resource_props_mut::<Role>(role) {
                role.add_trust_statement(PolicyStatement::assume_role(EDGE_LAMBDA_SERVICE));
            }
        }

        let version = StrVal::select_split(7, ":", edge_arn.clone());
        Ok(Self { node, lambda, edge_arn, version, placement })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// the qualified arn of the current version, usable from the stack the
    /// facade was defined in. This is what CloudFront associations need.
    pub fn edge_arn(&self) -> &StrVal {
        &self.edge_arn
    }

    /// same as [`EdgeFunction::edge_arn`]: edge functions are always referenced by version.
    pub fn function_arn(&self) -> &StrVal {
        &self.edge_arn
    }

    pub fn function_name(&self) -> StrVal {
        self.lambda.function_name()
    }

    /// the version qualifier, the last component of the edge arn.
    pub fn version(&self) -> &StrVal {
        &self.version
    }

    pub fn lambda(&self) -> &LambdaFunction {
        &self.lambda
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn current_version(&self) -> NodeId {
        self.lambda.current_version()
    }

    pub fn is_bound_to_vpc(&self) -> bool {
        false
    }

    pub fn connections(&self) -> Result<()> {
        Err(Error::Unsupported("Lambda@Edge does not support connections"))
    }

    pub fn latest_version(&self) -> Result<NodeId> {
        Err(Error::Unsupported("$LATEST function version cannot be used for Lambda@Edge"))
    }

    pub fn add_alias(&self, tree: &mut Tree, alias_name: &str, options: AliasOptions) -> Result<NodeId> {
        self.lambda.add_alias(tree, alias_name, options)
    }

    pub fn add_permission(&self, tree: &mut Tree, id: &str, props: PermissionProps) -> Result<NodeId> {
        self.lambda.add_permission(tree, id, props)
    }

    pub fn add_to_role_policy(&self, tree: &mut Tree, statement: PolicyStatement) -> Result<()> {
        self.lambda.add_to_role_policy(tree, statement)
    }

    pub fn grant_invoke(&self, tree: &mut Tree, grantee: Principal) -> Result<Grant> {
        self.lambda.grant_invoke(tree, grantee)
    }

    pub fn add_event_source_mapping(&self, tree: &mut Tree, id: &str, options: EventSourceMappingOptions) -> Result<NodeId> {
        self.lambda.add_event_source_mapping(tree, id, options)
    }

    pub fn add_event_source(&self, tree: &mut Tree, source: &dyn EventSource) -> Result<()> {
        self.lambda.add_event_source(tree, source)
    }

    pub fn configure_async_invoke(&self, tree: &mut Tree, options: AsyncInvokeOptions) -> Result<NodeId> {
        self.lambda.configure_async_invoke(tree, options)
    }

    pub fn metric(&self, metric_name: &str, options: MetricOptions) -> Metric {
        self.lambda.metric(metric_name, options.with_region(CLOUDFRONT_REGION))
    }

    pub fn metric_duration(&self, options: MetricOptions) -> Metric {
        self.lambda.metric_duration(options.with_region(CLOUDFRONT_REGION))
    }

    pub fn metric_errors(&self, options: MetricOptions) -> Metric {
        self.lambda.metric_errors(options.with_region(CLOUDFRONT_REGION))
    }

    pub fn metric_invocations(&self, options: MetricOptions) -> Metric {
        self.lambda.metric_invocations(options.with_region(CLOUDFRONT_REGION))
    }

    pub fn metric_throttles(&self, options: MetricOptions) -> Metric {
        self.lambda.metric_throttles(options.with_region(CLOUDFRONT_REGION))
    }
}
