use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::metric::{Metric, MetricOptions};
use crate::resources::iam::{PolicyStatement, Role};
use crate::resources::lambda::{
    Alias, Code, Destination, DestinationConfig, EventInvokeConfig, EventSourceMapping, Function, Permission, Version,
};
use crate::token::{NodeId, StrVal};
use crate::tree::Tree;

pub const ASYNC_INVOKE_CONFIG_ID: &str = "EventInvokeConfig";

#[derive(Debug, Clone)]
pub struct FunctionProps {
    pub runtime: String,
    pub handler: String,
    pub code_bucket: StrVal,
    pub code_key: StrVal,
    /// in MB. defaults to 128
    pub memory_size: u64,
    /// in seconds. defaults to 3
    pub timeout: u32,
    pub description: Option<String>,
    /// leave empty for the default (x86_64)
    pub architectures: Vec<String>,
    /// arn of an existing role for the function to run as.
    /// if None, a role is created for it.
    pub role: Option<StrVal>,
    /// statements added to the created role. Not allowed with an existing role.
    pub initial_policy: Vec<PolicyStatement>,
}

impl Default for FunctionProps {
    fn default() -> Self {
        Self {
            runtime: String::new(),
            handler: String::new(),
            code_bucket: StrVal::default(),
            code_key: StrVal::default(),
            memory_size: 128,
            timeout: 3,
            description: None,
            architectures: vec![],
            role: None,
            initial_policy: vec![],
        }
    }
}

/// Something allowed to invoke a function.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    /// eg: `s3.amazonaws.com`. Granted through a resource policy on the function.
    Service(String),
    /// an account id or account arn. Granted through a resource policy on the function.
    Account(StrVal),
    /// a role resource in the tree. Granted through the role's own policy.
    Role(NodeId),
}

/// The outcome of [`LambdaFunction::grant_invoke`]: either a permission
/// on the function, or a statement added to the grantee's role.
#[derive(Debug, Clone, PartialEq)]
pub enum Grant {
    ResourcePolicy { permission: NodeId },
    PrincipalPolicy { role: NodeId, statement: PolicyStatement },
}

#[derive(Debug, Clone, Default)]
pub struct PermissionProps {
    pub principal: Option<Principal>,
    /// defaults to lambda:InvokeFunction
    pub action: Option<String>,
    pub source_arn: Option<StrVal>,
    pub source_account: Option<StrVal>,
}

#[derive(Debug, Clone, Default)]
pub struct AliasOptions {
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventSourceMappingOptions {
    pub event_source_arn: StrVal,
    pub batch_size: Option<u32>,
    /// LATEST or TRIM_HORIZON for stream sources
    pub starting_position: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AsyncInvokeOptions {
    pub max_event_age_secs: Option<u32>,
    pub retry_attempts: Option<u32>,
    pub on_success: Option<StrVal>,
    pub on_failure: Option<StrVal>,
}

/// Something that can feed events into a function. Binding usually adds an
/// event source mapping and whatever permissions the function needs to
/// consume from the source.
pub trait EventSource {
    fn bind(&self, tree: &mut Tree, target: &LambdaFunction) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqsEventSource {
    pub queue_arn: StrVal,
    pub batch_size: Option<u32>,
    pub enabled: bool,
}

impl SqsEventSource {
    pub fn new(queue_arn: StrVal) -> Self {
        Self { queue_arn, batch_size: None, enabled: true }
    }
}

impl EventSource for SqsEventSource {
    fn bind(&self, tree: &mut Tree, target: &LambdaFunction) -> Result<()> {
        let hash = adler::adler32_slice(self.queue_arn.to_json().to_string().as_bytes());
        target.add_event_source_mapping(tree, &format!("SqsEventSource{hash:08X}"), EventSourceMappingOptions {
            event_source_arn: self.queue_arn.clone(),
            batch_size: self.batch_size,
            starting_position: None,
            enabled: self.enabled,
        })?;
        if target.role().is_some() {
            target.add_to_role_policy(tree, PolicyStatement::allow(
                &[
                    "sqs:ReceiveMessage",
                    "sqs:ChangeMessageVisibility",
                    "sqs:GetQueueUrl",
                    "sqs:DeleteMessage",
                    "sqs:GetQueueAttributes",
                ],
                vec![self.queue_arn.clone()],
            ))?;
        }
        Ok(())
    }
}

/// A lambda function, its role (unless an existing one is given) and a
/// version resource that is replaced whenever the function's configuration
/// changes.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaFunction {
    node: NodeId,
    function: NodeId,
    role: Option<NodeId>,
    role_arn: StrVal,
    current_version: NodeId,
}

impl LambdaFunction {
    pub fn new(tree: &mut Tree, scope: NodeId, id: &str, props: FunctionProps) -> Result<Self> {
        if props.role.is_some() && !props.initial_policy.is_empty() {
            return Err(Error::InvalidProps(format!(
                "Function {id}: initial_policy cannot be applied to an existing role"
            )));
        }
        let node = tree.add_construct(scope, id)?;
        let (role, role_arn) = match props.role {
            Some(arn) => (None, arn),
            None => {
                let mut role = Role::for_lambda();
                for statement in props.initial_policy {
                    role.add_to_policy(statement);
                }
                let role = tree.add_resource(node, "ServiceRole", role)?;
                (Some(role), StrVal::get_att(role, "Arn"))
            }
        };
        let function = Function {
            code: Code { s3_bucket: props.code_bucket, s3_key: props.code_key },
            handler: props.handler,
            runtime: props.runtime,
            role: role_arn.clone(),
            memory_size: props.memory_size,
            timeout: props.timeout,
            architectures: props.architectures,
            description: props.description,
        };
        let config = serde_json::to_value(&function)
            .map_err(|source| Error::Serialize { path: tree.display_path(node), source })?;
        let hash = adler::adler32_slice(tree.stable_json(config).to_string().as_bytes());
        let function = tree.add_resource(node, "Resource", function)?;

        // a new logical id for every configuration forces CloudFormation
        // to publish a new version.
        let version_id = tree.logical_id_with_suffix(function, &format!("CurrentVersion{hash:08X}"))?;
        let current_version = tree.add_resource(node, "CurrentVersion", Version {
            function_name: StrVal::Ref(function),
        })?;
        tree.override_logical_id(current_version, &version_id)?;

        Ok(Self { node, function, role, role_arn, current_version })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// the `AWS::Lambda::Function` resource.
    pub fn function(&self) -> NodeId {
        self.function
    }

    /// the role created for the function. None if an existing role was given.
    pub fn role(&self) -> Option<NodeId> {
        self.role
    }

    pub fn role_arn(&self) -> &StrVal {
        &self.role_arn
    }

    pub fn current_version(&self) -> NodeId {
        self.current_version
    }

    pub fn function_arn(&self) -> StrVal {
        StrVal::get_att(self.function, "Arn")
    }

    pub fn function_name(&self) -> StrVal {
        StrVal::Ref(self.function)
    }

    /// qualified arn of the current version.
    pub fn version_arn(&self) -> StrVal {
        StrVal::Ref(self.current_version)
    }

    pub fn add_alias(&self, tree: &mut Tree, alias_name: &str, options: AliasOptions) -> Result<NodeId> {
        tree.add_resource(self.node, &format!("Alias{alias_name}"), Alias {
            function_name: StrVal::Ref(self.function),
            function_version: StrVal::get_att(self.current_version, "Version"),
            name: alias_name.to_string(),
            description: options.description,
        })
    }

    pub fn add_permission(&self, tree: &mut Tree, id: &str, props: PermissionProps) -> Result<NodeId> {
        let principal = match props.principal {
            Some(Principal::Service(service)) => StrVal::from(service),
            Some(Principal::Account(account)) => account,
            Some(Principal::Role(role)) => StrVal::get_att(role, "Arn"),
            None => return Err(Error::InvalidProps(format!("Permission {id} must have a principal"))),
        };
        tree.add_resource(self.node, id, Permission {
            action: props.action.unwrap_or_else(|| "lambda:InvokeFunction".to_string()),
            function_name: self.function_arn(),
            principal,
            source_arn: props.source_arn,
            source_account: props.source_account,
        })
    }

    /// adds `statement` to the function's role. Fails when the function
    /// runs as an existing role, since that role's policy is not ours to edit.
    pub fn add_to_role_policy(&self, tree: &mut Tree, statement: PolicyStatement) -> Result<()> {
        let path = tree.display_path(self.node);
        let role = self.role
            .and_then(|r| tree.resource_props_mut::<Role>(r))
            .ok_or_else(|| Error::InvalidProps(format!("{path} runs as an existing role, cannot add to its policy")))?;
        role.add_to_policy(statement);
        Ok(())
    }

    pub fn grant_invoke(&self, tree: &mut Tree, grantee: Principal) -> Result<Grant> {
        match grantee {
            Principal::Role(role) => {
                let statement = PolicyStatement::allow(&["lambda:InvokeFunction"], vec![
                    self.function_arn(),
                    StrVal::join("", vec![self.function_arn(), ":*".into()]),
                ]);
                let path = tree.display_path(role);
                let props = tree.resource_props_mut::<Role>(role)
                    .ok_or_else(|| Error::InvalidProps(format!("{path} is not a role")))?;
                props.add_to_policy(statement.clone());
                Ok(Grant::PrincipalPolicy { role, statement })
            }
            Principal::Service(service) => {
                let id = format!("Invoke{}", service.replace(|c: char| !c.is_ascii_alphanumeric(), ""));
                self.grant_through_permission(tree, &id, Principal::Service(service))
            }
            Principal::Account(account) => {
                let id = format!("Invoke{:08X}", adler::adler32_slice(account.to_json().to_string().as_bytes()));
                self.grant_through_permission(tree, &id, Principal::Account(account))
            }
        }
    }

    fn grant_through_permission(&self, tree: &mut Tree, id: &str, principal: Principal) -> Result<Grant> {
        let permission = self.add_permission(tree, id, PermissionProps {
            principal: Some(principal),
            ..Default::default()
        })?;
        Ok(Grant::ResourcePolicy { permission })
    }

    pub fn add_event_source_mapping(&self, tree: &mut Tree, id: &str, options: EventSourceMappingOptions) -> Result<NodeId> {
        tree.add_resource(self.node, id, EventSourceMapping {
            function_name: StrVal::Ref(self.function),
            event_source_arn: options.event_source_arn,
            batch_size: options.batch_size,
            starting_position: options.starting_position,
            enabled: options.enabled,
        })
    }

    pub fn add_event_source(&self, tree: &mut Tree, source: &dyn EventSource) -> Result<()> {
        source.bind(tree, self)
    }

    /// Only one async invoke configuration may exist per function.
    pub fn configure_async_invoke(&self, tree: &mut Tree, options: AsyncInvokeOptions) -> Result<NodeId> {
        if tree.find_child(self.node, ASYNC_INVOKE_CONFIG_ID).is_some() {
            return Err(Error::InvalidProps(format!(
                "An EventInvokeConfig has already been configured for the function at {}",
                tree.display_path(self.node),
            )));
        }
        let destination_config = if options.on_success.is_some() || options.on_failure.is_some() {
            Some(DestinationConfig {
                on_success: options.on_success.map(|destination| Destination { destination }),
                on_failure: options.on_failure.map(|destination| Destination { destination }),
            })
        } else {
            None
        };
        tree.add_resource(self.node, ASYNC_INVOKE_CONFIG_ID, EventInvokeConfig {
            function_name: StrVal::Ref(self.function),
            qualifier: "$LATEST".into(),
            maximum_event_age_in_seconds: options.max_event_age_secs,
            maximum_retry_attempts: options.retry_attempts,
            destination_config,
        })
    }

    pub fn metric(&self, metric_name: &str, options: MetricOptions) -> Metric {
        let mut dimensions = BTreeMap::new();
        dimensions.insert("FunctionName".to_string(), self.function_name());
        Metric::new("AWS/Lambda", metric_name, dimensions, options)
    }

    pub fn metric_duration(&self, options: MetricOptions) -> Metric {
        self.metric("Duration", options.with_default_statistic("Average"))
    }

    pub fn metric_errors(&self, options: MetricOptions) -> Metric {
        self.metric("Errors", options.with_default_statistic("Sum"))
    }

    pub fn metric_invocations(&self, options: MetricOptions) -> Metric {
        self.metric("Invocations", options.with_default_statistic("Sum"))
    }

    pub fn metric_throttles(&self, options: MetricOptions) -> Metric {
        self.metric("Throttles", options.with_default_statistic("Sum"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Environment;

    fn props() -> FunctionProps {
        FunctionProps {
            runtime: "provided.al2".into(),
            handler: "bootstrap".into(),
            code_bucket: "artifacts".into(),
            code_key: "fn.zip".into(),
            ..Default::default()
        }
    }

    fn stack(tree: &mut Tree) -> NodeId {
        tree.add_stack(tree.root(), "Fns", Environment::in_region("us-east-1")).unwrap()
    }

    #[test]
    fn version_logical_id_tracks_configuration() {
        let version_id = |timeout: u32| {
            let mut tree = Tree::new();
            let stack = stack(&mut tree);
            let f = LambdaFunction::new(&mut tree, stack, "Fn", FunctionProps { timeout, ..props() }).unwrap();
            tree.logical_id(f.current_version()).unwrap()
        };
        assert_eq!(version_id(3), version_id(3));
        assert_ne!(version_id(3), version_id(4));
        assert!(version_id(3).contains("CurrentVersion"));
    }

    #[test]
    fn existing_roles_are_not_modified() {
        let mut tree = Tree::new();
        let stack = stack(&mut tree);
        let f = LambdaFunction::new(&mut tree, stack, "Fn", FunctionProps {
            role: Some("arn:aws:iam::123456789012:role/edge".into()),
            ..props()
        }).unwrap();
        assert!(f.role().is_none());
        assert!(f.add_to_role_policy(&mut tree, PolicyStatement::allow(&["s3:GetObject"], vec!["*".into()])).is_err());

        let with_policy = FunctionProps {
            role: Some("arn:aws:iam::123456789012:role/edge".into()),
            initial_policy: vec![PolicyStatement::allow(&["s3:GetObject"], vec!["*".into()])],
            ..props()
        };
        assert!(LambdaFunction::new(&mut tree, stack, "Fn2", with_policy).is_err());
    }

    #[test]
    fn async_invoke_can_only_be_configured_once() {
        let mut tree = Tree::new();
        let stack = stack(&mut tree);
        let f = LambdaFunction::new(&mut tree, stack, "Fn", props()).unwrap();
        f.configure_async_invoke(&mut tree, AsyncInvokeOptions { retry_attempts: Some(1), ..Default::default() }).unwrap();
        let err = f.configure_async_invoke(&mut tree, AsyncInvokeOptions::default()).unwrap_err();
        assert!(err.to_string().contains("already been configured"));
    }

    #[test]
    fn grants_go_to_the_right_policy() {
        let mut tree = Tree::new();
        let stack = stack(&mut tree);
        let f = LambdaFunction::new(&mut tree, stack, "Fn", props()).unwrap();
        let caller = tree.add_resource(stack, "Caller", Role::for_lambda()).unwrap();

        let grant = f.grant_invoke(&mut tree, Principal::Role(caller)).unwrap();
        assert!(matches!(grant, Grant::PrincipalPolicy { role, .. } if role == caller));
        assert_eq!(tree.resource_props::<Role>(caller).unwrap().inline_statements().len(), 1);

        let grant = f.grant_invoke(&mut tree, Principal::Service("s3.amazonaws.com".into())).unwrap();
        let Grant::ResourcePolicy { permission } = grant else { panic!("expected a resource policy") };
        let permission = tree.resource_props::<Permission>(permission).unwrap();
        assert_eq!(permission.principal, StrVal::from("s3.amazonaws.com"));
        assert_eq!(permission.action, "lambda:InvokeFunction");
    }

    #[test]
    fn sqs_sources_add_a_mapping_and_consume_permissions() {
        let mut tree = Tree::new();
        let stack = stack(&mut tree);
        let f = LambdaFunction::new(&mut tree, stack, "Fn", props()).unwrap();
        let queue_arn = StrVal::from("arn:aws:sqs:us-east-1:123456789012:jobs");
        f.add_event_source(&mut tree, &SqsEventSource::new(queue_arn.clone())).unwrap();
        let mappings: Vec<_> = tree.resources_in(stack).into_iter()
            .filter_map(|n| tree.resource_props::<EventSourceMapping>(n))
            .collect();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].event_source_arn, queue_arn);
        let role = tree.resource_props::<Role>(f.role().unwrap()).unwrap();
        assert!(role.inline_statements()[0].action.contains(&"sqs:ReceiveMessage".to_string()));
    }

    #[test]
    fn metrics_are_dimensioned_by_function_name() {
        let mut tree = Tree::new();
        let stack = stack(&mut tree);
        let f = LambdaFunction::new(&mut tree, stack, "Fn", props()).unwrap();
        let m = f.metric_errors(MetricOptions::default());
        assert_eq!(m.namespace, "AWS/Lambda");
        assert_eq!(m.statistic, "Sum");
        assert_eq!(m.dimensions.get("FunctionName"), Some(&f.function_name()));
        let m = f.metric_duration(MetricOptions { statistic: Some("p99".into()), ..Default::default() });
        assert_eq!(m.statistic, "p99");
    }
}
