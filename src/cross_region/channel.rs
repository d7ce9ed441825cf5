//! Region scoped string parameters used to move a value from the stack
//! that produces it into a stack deployed to another region.

use tracing::debug;

use crate::error::{Error, Result};
use crate::resources::custom::CustomResource;
use crate::resources::iam::PolicyStatement;
use crate::resources::ssm::Parameter;
use crate::token::{NodeId, Pseudo, StrVal};
use crate::tree::Tree;

use super::provider;

/// Every parameter lives under this prefix so that a reader can be granted
/// access to all of them without knowing their names up front.
pub const PARAMETER_NAMESPACE: &str = "/crossRegionParam";

pub const READER_RESOURCE_TYPE: &str = "Custom::CrossRegionStringParameterReader";

/// attribute of the reader custom resource that holds the parameter value.
pub const READER_ATTRIBUTE: &str = "stringValue";

/// id of the parameter created by [`store`] under its scope.
pub const STORE_ID: &str = "Parameter";

/// id of the custom resource created by [`read`] under its scope.
pub const READ_ID: &str = "ARNReader";

/// What kind of value a parameter carries. Becomes the first component of
/// the parameter path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    CloudFrontCertificate,
    CloudFrontHostedZone,
    EdgeFunction,
    EdgeFunctionRole,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::CloudFrontCertificate => "cloudFrontCertificate",
            ParameterKind::CloudFrontHostedZone => "cloudFrontHostedZone",
            ParameterKind::EdgeFunction => "edgeFunction",
            ParameterKind::EdgeFunctionRole => "edgeFunctionRole",
        }
    }
}

/// collapses every run of `/` into a single `/`.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_separator = false;
    for c in path.chars() {
        if c == '/' {
            if last_was_separator {
                continue;
            }
            last_was_separator = true;
        } else {
            last_was_separator = false;
        }
        out.push(c);
    }
    out
}

/// the fully qualified parameter name for `path`.
pub fn namespaced(path: &str) -> String {
    normalize(&format!("{PARAMETER_NAMESPACE}/{path}"))
}

/// `/<kind>/<requester region>/<construct path>`, relative to the namespace.
pub fn parameter_key(kind: ParameterKind, requester_region: &str, construct_path: &str) -> String {
    format!("/{}/{}/{}", kind.as_str(), requester_region, construct_path)
}

/// Writes `value` to a string parameter in the region of `scope`'s stack.
/// The parameter is a child of `scope` with id `Parameter`.
pub fn store(tree: &mut Tree, scope: NodeId, path: &str, value: StrVal) -> Result<NodeId> {
    let name = namespaced(path);
    debug!("storing cross region parameter {name} in {}", tree.display_path(scope));
    tree.add_resource(scope, STORE_ID, Parameter::string(name, value))
}

/// Reads the parameter at `path` from `region` while `scope`'s stack deploys.
///
/// Creates the stack's reader provider on first use, and a reader custom
/// resource with id `ARNReader` under `scope`. The returned value resolves
/// to the parameter's contents. A different `refresh_token` makes
/// CloudFormation run the read again even if the path and region are the same.
pub fn read(
    tree: &mut Tree,
    scope: NodeId,
    path: &str,
    region: &str,
    refresh_token: Option<StrVal>,
) -> Result<StrVal> {
    let stack = tree.require_stack(scope)?;
    let statement = PolicyStatement::allow(&["ssm:GetParameter"], vec![all_parameters_arn(region)]);
    let provider = provider::get_or_create(tree, stack, READER_RESOURCE_TYPE, vec![statement])?;

    let mut reader = CustomResource {
        resource_type: READER_RESOURCE_TYPE.to_string(),
        service_token: provider.service_token.clone(),
        properties: Default::default(),
    };
    reader.properties.insert("region".into(), region.into());
    reader.properties.insert("parameterName".into(), namespaced(path).into());
    if let Some(token) = refresh_token {
        reader.properties.insert("refreshToken".into(), token);
    }
    let node = tree.add_resource(scope, READ_ID, reader)?;
    Ok(StrVal::get_att(node, READER_ATTRIBUTE))
}

/// `arn:${AWS::Partition}:ssm:<region>:${AWS::AccountId}:parameter/crossRegionParam/*`
pub fn all_parameters_arn(region: &str) -> StrVal {
    StrVal::join("", vec![
        "arn:".into(),
        StrVal::Pseudo(Pseudo::Partition),
        format!(":ssm:{region}:").into(),
        StrVal::Pseudo(Pseudo::AccountId),
        format!(":parameter{PARAMETER_NAMESPACE}/*").into(),
    ])
}

/// Makes `value` usable from the stack enclosing `target`.
///
/// If `value` refers to a resource in a stack deployed to another region it
/// is stored in that stack and read back under `target` (inside a construct
/// named `reader_id`), and the target stack is made to depend on the
/// producing stack. Otherwise `value` is returned unchanged.
///
/// The parameter path is derived from `owner`: its stack's region and its
/// construct path.
pub fn propagate(
    tree: &mut Tree,
    target: NodeId,
    reader_id: &str,
    owner: NodeId,
    kind: ParameterKind,
    value: StrVal,
) -> Result<StrVal> {
    let target_stack = tree.require_stack(target)?;
    let target_region = tree.region_of(target_stack).map(str::to_string);

    let mut producer: Option<(NodeId, String)> = None;
    for node in value.referenced_nodes() {
        let stack = tree.require_stack(node)?;
        if stack == target_stack {
            continue;
        }
        let Some(region) = tree.region_of(stack) else {
            return Err(Error::UnresolvedRegion(format!(
                "{} is in a stack without an explicit region and cannot be read from another region",
                tree.display_path(node),
            )));
        };
        if Some(region) == target_region.as_deref() {
            continue;
        }
        match &producer {
            Some((existing, _)) if *existing != stack => {
                return Err(Error::InvalidProps(format!(
                    "A {} value can only come from one stack, found {} and {}",
                    kind.as_str(), tree.display_path(*existing), tree.display_path(stack),
                )));
            }
            Some(_) => {}
            None => producer = Some((stack, region.to_string())),
        }
    }
    let Some((producer_stack, producer_region)) = producer else {
        return Ok(value);
    };

    let requester_region = tree.region_of(owner).map(str::to_string).ok_or_else(|| {
        Error::UnresolvedRegion(format!("{} must be in a stack with an explicit region", tree.display_path(owner)))
    })?;
    let key = parameter_key(kind, &requester_region, &tree.path(owner));

    tree.add_dependency(target_stack, producer_stack)?;

    let group_id = tree.unique_id(owner);
    let group = match tree.find_child(producer_stack, &group_id) {
        Some(g) => g,
        None => tree.add_construct(producer_stack, &group_id)?,
    };
    let store_scope = tree.add_construct(group, kind.as_str())?;
    store(tree, store_scope, &key, value)?;

    let read_scope = tree.add_construct(target, reader_id)?;
    read(tree, read_scope, &key, &producer_region, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::route53::HostedZone;
    use crate::tree::Environment;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn namespaces_and_collapses_separators() {
        assert_eq!(namespaced("/edgeFunction/us-west-2/dev/Stack/Fn"), "/crossRegionParam/edgeFunction/us-west-2/dev/Stack/Fn");
        assert_eq!(namespaced("//a///b/"), "/crossRegionParam/a/b/");
        assert_eq!(
            parameter_key(ParameterKind::CloudFrontCertificate, "eu-west-1", "dev/Site/Cert"),
            "/cloudFrontCertificate/eu-west-1/dev/Site/Cert",
        );
    }

    proptest! {
        #[test]
        fn normalize_leaves_no_separator_runs(path in "[a-z/]{0,40}") {
            let once = normalize(&path);
            prop_assert!(!once.contains("//"));
            prop_assert_eq!(normalize(&once), once.clone());
            prop_assert_eq!(once.replace('/', ""), path.replace('/', ""));
        }

        #[test]
        fn namespaced_paths_stay_inside_the_namespace(path in "[A-Za-z0-9/-]{0,60}") {
            let name = namespaced(&path);
            prop_assert!(name.starts_with("/crossRegionParam/"));
            prop_assert_eq!(namespaced(&name[PARAMETER_NAMESPACE.len()..]), name.clone());
        }
    }

    fn stage_stack(tree: &mut Tree, region: &str) -> NodeId {
        let stage = tree.add_stage(tree.root(), "dev").unwrap();
        tree.add_stack(stage, "Site", Environment::new("123456789012", region)).unwrap()
    }

    #[test]
    fn store_creates_a_namespaced_string_parameter() {
        let mut tree = Tree::new();
        let stack = stage_stack(&mut tree, "us-east-1");
        let param = store(&mut tree, stack, "/x//y", "value".into()).unwrap();
        let props = tree.resource_props::<Parameter>(param).unwrap();
        assert_eq!(props.name, "/crossRegionParam/x/y");
        assert_eq!(props.parameter_type, "String");
        assert_eq!(props.value, StrVal::from("value"));
    }

    #[test]
    fn reads_share_one_provider_per_stack() {
        let mut tree = Tree::new();
        let stack = stage_stack(&mut tree, "us-west-2");
        let a = tree.add_construct(stack, "A").unwrap();
        let b = tree.add_construct(stack, "B").unwrap();
        let va = read(&mut tree, a, "/k/a", "us-east-1", None).unwrap();
        let vb = read(&mut tree, b, "/k/b", "us-east-1", Some("token".into())).unwrap();
        assert_eq!(tree.providers.len(), 1);

        let StrVal::GetAtt(reader_a, attr) = va else { panic!("expected GetAtt") };
        assert_eq!(attr, READER_ATTRIBUTE);
        let props = tree.resource_props::<CustomResource>(reader_a).unwrap();
        assert_eq!(props.properties.get("parameterName"), Some(&StrVal::from("/crossRegionParam/k/a")));
        assert_eq!(props.properties.get("region"), Some(&StrVal::from("us-east-1")));
        assert!(props.properties.get("refreshToken").is_none());

        let StrVal::GetAtt(reader_b, _) = vb else { panic!("expected GetAtt") };
        let props_b = tree.resource_props::<CustomResource>(reader_b).unwrap();
        assert_eq!(props_b.properties.get("refreshToken"), Some(&StrVal::from("token")));
        assert_eq!(props.service_token, props_b.service_token);
    }

    #[test]
    fn refresh_token_is_the_only_difference_between_reads() {
        let props_for = |token: &str| {
            let mut tree = Tree::new();
            let stack = stage_stack(&mut tree, "us-west-2");
            let v = read(&mut tree, stack, "/k", "us-east-1", Some(token.into())).unwrap();
            let StrVal::GetAtt(reader, _) = v else { panic!("expected GetAtt") };
            serde_json::to_value(tree.resource_props::<CustomResource>(reader).unwrap()).unwrap()
        };
        assert_eq!(props_for("a"), props_for("a"));
        assert_ne!(props_for("a"), props_for("b"));
        assert_eq!(props_for("a")["refreshToken"], json!("a"));
    }

    #[test]
    fn propagate_leaves_same_region_values_alone() {
        let mut tree = Tree::new();
        let stack = stage_stack(&mut tree, "us-east-1");
        let zone = tree.add_resource(stack, "Zone", HostedZone { name: "example.com".into() }).unwrap();
        let owner = tree.add_construct(stack, "Owner").unwrap();
        let value = StrVal::Ref(zone);
        let out = propagate(&mut tree, owner, "Reader", owner, ParameterKind::CloudFrontHostedZone, value.clone()).unwrap();
        assert_eq!(out, value);
        let literal = propagate(&mut tree, owner, "Reader", owner, ParameterKind::CloudFrontHostedZone, "Z1".into()).unwrap();
        assert_eq!(literal, StrVal::from("Z1"));
        assert!(tree.providers.is_empty());
    }

    #[test]
    fn propagate_moves_values_across_regions() {
        let mut tree = Tree::new();
        let stage = tree.add_stage(tree.root(), "dev").unwrap();
        let zones = tree.add_stack(stage, "Zones", Environment::in_region("us-west-2")).unwrap();
        let zone = tree.add_resource(zones, "Zone", HostedZone { name: "example.com".into() }).unwrap();
        let site = tree.add_stack(stage, "Site", Environment::in_region("us-west-2")).unwrap();
        let owner = tree.add_construct(site, "Cert").unwrap();
        let support = tree.add_stack(stage, "Support", Environment::in_region("us-east-1")).unwrap();
        let target = tree.add_construct(support, "Group").unwrap();

        let out = propagate(&mut tree, target, "Reader", owner, ParameterKind::CloudFrontHostedZone, StrVal::Ref(zone)).unwrap();
        assert!(tree.depends_on(support, zones));
        let StrVal::GetAtt(reader, _) = out else { panic!("expected GetAtt") };
        assert_eq!(tree.stack_of(reader), Some(support));
        let props = tree.resource_props::<CustomResource>(reader).unwrap();
        assert_eq!(props.properties.get("region"), Some(&StrVal::from("us-west-2")));
        assert_eq!(
            props.properties.get("parameterName"),
            Some(&StrVal::from("/crossRegionParam/cloudFrontHostedZone/us-west-2/dev/Site/Cert")),
        );
        let written: Vec<_> = tree.resources_in(zones).into_iter()
            .filter_map(|n| tree.resource_props::<Parameter>(n))
            .collect();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].value, StrVal::Ref(zone));
    }
}
