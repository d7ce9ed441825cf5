//! Singleton custom resource providers: one handler function (and role)
//! per stack and custom resource type, shared by every custom resource of
//! that type in the stack.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::resources::iam::{PolicyStatement, Role};
use crate::resources::lambda::{Code, Function};
use crate::token::{NodeId, StrVal};
use crate::tree::{Tree, TemplateParameter};

pub const PROVIDER_RUNTIME: &str = "provided.al2";
pub const PROVIDER_HANDLER: &str = "bootstrap";
pub const PROVIDER_ARCHITECTURE: &str = "arm64";
pub const PROVIDER_TIMEOUT: u32 = 900;
pub const PROVIDER_MEMORY: u64 = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHandle {
    /// the construct holding the role and handler.
    pub construct: NodeId,
    pub role: NodeId,
    pub handler: NodeId,
    /// what custom resources put in their `ServiceToken`.
    pub service_token: StrVal,
}

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<(NodeId, String), ProviderHandle>,
}

impl ProviderRegistry {
    pub fn get(&self, stack: NodeId, resource_type: &str) -> Option<&ProviderHandle> {
        self.providers.get(&(stack, resource_type.to_string()))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// `Custom::CrossRegionStringParameterReader` -> `CrossRegionStringParameterReader`
fn provider_name(resource_type: &str) -> Result<&str> {
    match resource_type.strip_prefix("Custom::") {
        Some(name) if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()) => Ok(name),
        _ => Err(Error::InvalidProps(format!(
            "Invalid custom resource type {resource_type:?}\nMust be Custom:: followed by alphanumeric characters"
        ))),
    }
}

/// names of the template parameters holding the provider's code location.
pub fn artifact_parameters(resource_type: &str) -> Result<(String, String)> {
    let name = provider_name(resource_type)?;
    Ok((format!("ArtifactBucket{name}"), format!("ArtifactKey{name}")))
}

/// Returns the provider for `resource_type` in `stack`, creating it on
/// first use. `statements` are merged into the provider role's policy on
/// every call, so later callers can widen what the handler may access.
pub fn get_or_create(
    tree: &mut Tree,
    stack: NodeId,
    resource_type: &str,
    statements: Vec<PolicyStatement>,
) -> Result<ProviderHandle> {
    let stack = tree.require_stack(stack)?;
    let key = (stack, resource_type.to_string());
    if let Some(handle) = tree.providers.providers.get(&key).cloned() {
        let stack_path = tree.display_path(stack);
        let role = tree.resource_props_mut::<Role>(handle.role)
            .ok_or_else(|| Error::InvalidProps(format!("Provider role for {resource_type} in {stack_path} is missing")))?;
        for statement in statements {
            if role.merge_into_policy(statement) {
                debug!("widened {resource_type} provider policy in {stack_path}");
            }
        }
        debug!("reusing {resource_type} provider in {stack_path}");
        return Ok(handle);
    }

    let name = provider_name(resource_type)?;
    let (bucket_param, key_param) = artifact_parameters(resource_type)?;
    tree.add_parameter(stack, &bucket_param, TemplateParameter {
        ty: "String".into(),
        description: Some(format!("S3 bucket holding the {name} provider code")),
    })?;
    tree.add_parameter(stack, &key_param, TemplateParameter {
        ty: "String".into(),
        description: Some(format!("S3 key of the {name} provider code")),
    })?;

    let construct = tree.add_construct(stack, &format!("Custom{name}CustomResourceProvider"))?;
    let mut role = Role::for_lambda();
    for statement in statements {
        role.merge_into_policy(statement);
    }
    let role = tree.add_resource(construct, "Role", role)?;
    let handler = tree.add_resource(construct, "Handler", Function {
        code: Code {
            s3_bucket: StrVal::Parameter(bucket_param),
            s3_key: StrVal::Parameter(key_param),
        },
        handler: PROVIDER_HANDLER.into(),
        runtime: PROVIDER_RUNTIME.into(),
        role: StrVal::get_att(role, "Arn"),
        memory_size: PROVIDER_MEMORY,
        timeout: PROVIDER_TIMEOUT,
        architectures: vec![PROVIDER_ARCHITECTURE.into()],
        description: Some(format!("Provider for {resource_type}")),
    })?;
    let handle = ProviderHandle {
        construct,
        role,
        handler,
        service_token: StrVal::get_att(handler, "Arn"),
    };
    debug!("created {resource_type} provider in {}", tree.display_path(stack));
    tree.providers.providers.insert(key, handle.clone());
    Ok(handle)
}
