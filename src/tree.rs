//! The construct tree: stages contain stacks, stacks contain constructs and
//! resources. Nodes live in an arena and are addressed by [`NodeId`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::cross_region::provider::ProviderRegistry;
use crate::error::{Error, Result};
use crate::regions;
use crate::resources::{AnyResource, CfnResource};
use crate::token::{NodeId, StrVal};

/// Target of a stack. `None` fields are environment agnostic and are only
/// known once CloudFormation deploys the stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    pub fn new(account: &str, region: &str) -> Self {
        Self { account: Some(account.to_string()), region: Some(region.to_string()) }
    }

    pub fn in_region(region: &str) -> Self {
        Self { account: None, region: Some(region.to_string()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateParameter {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StackOutput {
    pub description: Option<String>,
    pub value: StrVal,
    pub export_name: Option<String>,
}

#[derive(Debug)]
pub struct StackData {
    pub env: Environment,
    pub description: Option<String>,
    dependencies: BTreeSet<NodeId>,
    parameters: BTreeMap<String, TemplateParameter>,
    outputs: BTreeMap<String, StackOutput>,
}

impl StackData {
    pub fn dependencies(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dependencies.iter().copied()
    }

    pub fn parameters(&self) -> &BTreeMap<String, TemplateParameter> {
        &self.parameters
    }

    pub fn outputs(&self) -> &BTreeMap<String, StackOutput> {
        &self.outputs
    }
}

#[derive(Debug)]
pub struct ResourceData {
    pub(crate) properties: Box<dyn AnyResource>,
    pub deletion_policy: Option<DeletionPolicy>,
    logical_id_override: Option<String>,
}

impl ResourceData {
    pub fn type_string(&self) -> &str {
        self.properties.type_string()
    }

    pub fn properties(&self) -> &dyn AnyResource {
        self.properties.as_ref()
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Root,
    Stage,
    Stack(StackData),
    Construct,
    Resource(ResourceData),
}

#[derive(Debug)]
pub struct Node {
    id: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    pub(crate) providers: ProviderRegistry,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let root = Node { id: String::new(), parent: None, children: vec![], kind: NodeKind::Root };
        Self { nodes: vec![root], providers: ProviderRegistry::default() }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn add_stage(&mut self, parent: NodeId, id: &str) -> Result<NodeId> {
        if self.stack_of(parent).is_some() {
            return Err(Error::InvalidProps(format!("Stage {id:?} cannot be nested inside a stack")));
        }
        self.add_node(parent, id, NodeKind::Stage)
    }

    pub fn add_stack(&mut self, parent: NodeId, id: &str, env: Environment) -> Result<NodeId> {
        if self.stack_of(parent).is_some() {
            return Err(Error::InvalidProps(format!("Stack {id:?} cannot be nested inside another stack")));
        }
        if let Some(region) = &env.region {
            if let Some(err) = regions::verify_region(region) {
                return Err(Error::InvalidRegion(err));
            }
        }
        if let Some(account) = &env.account {
            if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::InvalidProps(format!("Invalid account id {account:?}\nMust be 12 digits")));
            }
        }
        let stack = StackData {
            env,
            description: None,
            dependencies: BTreeSet::new(),
            parameters: BTreeMap::new(),
            outputs: BTreeMap::new(),
        };
        let node = self.add_node(parent, id, NodeKind::Stack(stack))?;
        let name = self.stack_name(node);
        if let Err(reason) = validate_stack_name(&name) {
            self.remove_last(node);
            return Err(Error::InvalidStackName { name, reason });
        }
        Ok(node)
    }

    pub fn add_construct(&mut self, parent: NodeId, id: &str) -> Result<NodeId> {
        self.add_node(parent, id, NodeKind::Construct)
    }

    pub fn add_resource<R: CfnResource>(&mut self, parent: NodeId, id: &str, resource: R) -> Result<NodeId> {
        if self.stack_of(parent).is_none() {
            return Err(Error::NotInStack(format!("{}/{id}", self.display_path(parent))));
        }
        if let Err(reason) = resource.validate() {
            return Err(Error::InvalidResource { path: format!("{}/{id}", self.display_path(parent)), reason });
        }
        let data = ResourceData { properties: Box::new(resource), deletion_policy: None, logical_id_override: None };
        self.add_node(parent, id, NodeKind::Resource(data))
    }

    fn add_node(&mut self, parent: NodeId, id: &str, kind: NodeKind) -> Result<NodeId> {
        if id.is_empty() || id.contains('/') {
            return Err(Error::InvalidId(id.to_string()));
        }
        if self.find_child(parent, id).is_some() {
            return Err(Error::DuplicateId { parent: self.display_path(parent), id: id.to_string() });
        }
        let node = NodeId(self.nodes.len());
        self.nodes.push(Node { id: id.to_string(), parent: Some(parent), children: vec![], kind });
        self.nodes[parent.0].children.push(node);
        Ok(node)
    }

    // only valid for the node that was just added.
    fn remove_last(&mut self, node: NodeId) {
        if node.0 + 1 != self.nodes.len() {
            return;
        }
        if let Some(parent) = self.nodes[node.0].parent {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
        self.nodes.pop();
    }

    pub fn find_child(&self, parent: NodeId, id: &str) -> Option<NodeId> {
        self.node(parent).children.iter().copied().find(|c| self.node(*c).id == id)
    }

    /// ancestors of `node`, from the top of the tree down to `node` itself.
    fn lineage(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![node];
        let mut current = node;
        while let Some(parent) = self.node(current).parent {
            out.push(parent);
            current = parent;
        }
        out.reverse();
        out
    }

    /// slash separated ids from the top of the tree, eg `dev/CloudFrontStack/CFCertificate`.
    pub fn path(&self, node: NodeId) -> String {
        self.lineage(node).iter()
            .filter(|n| !matches!(self.node(**n).kind, NodeKind::Root))
            .map(|n| self.node(*n).id.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub(crate) fn display_path(&self, node: NodeId) -> String {
        let path = self.path(node);
        if path.is_empty() { "<root>".to_string() } else { path }
    }

    /// closest enclosing stage, including `node` itself.
    pub fn stage_of(&self, node: NodeId) -> Option<NodeId> {
        self.lineage(node).into_iter().rev().find(|n| matches!(self.node(*n).kind, NodeKind::Stage))
    }

    /// closest enclosing stack, including `node` itself.
    pub fn stack_of(&self, node: NodeId) -> Option<NodeId> {
        self.lineage(node).into_iter().rev().find(|n| matches!(self.node(*n).kind, NodeKind::Stack(_)))
    }

    pub fn require_stack(&self, node: NodeId) -> Result<NodeId> {
        self.stack_of(node).ok_or_else(|| Error::NotInStack(self.display_path(node)))
    }

    pub fn stack(&self, node: NodeId) -> Option<&StackData> {
        match &self.node(node).kind {
            NodeKind::Stack(s) => Some(s),
            _ => None,
        }
    }

    fn stack_mut(&mut self, node: NodeId) -> Option<&mut StackData> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Stack(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_stack(&self, node: NodeId) -> bool {
        self.stack(node).is_some()
    }

    /// region of the stack enclosing `node`, if it is known at definition time.
    pub fn region_of(&self, node: NodeId) -> Option<&str> {
        let stack = self.stack_of(node)?;
        self.stack(stack)?.env.region.as_deref()
    }

    pub fn account_of(&self, node: NodeId) -> Option<&str> {
        let stack = self.stack_of(node)?;
        self.stack(stack)?.env.account.as_deref()
    }

    /// CloudFormation stack name: the path from the top of the tree joined by hyphens.
    pub fn stack_name(&self, stack: NodeId) -> String {
        self.path(stack).replace('/', "-").replace('_', "-")
    }

    pub fn resource(&self, node: NodeId) -> Option<&ResourceData> {
        match &self.node(node).kind {
            NodeKind::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn resource_props<T: CfnResource>(&self, node: NodeId) -> Option<&T> {
        self.resource(node)?.properties.downcast_ref::<T>()
    }

    pub fn resource_props_mut<T: CfnResource>(&mut self, node: NodeId) -> Option<&mut T> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Resource(r) => r.properties.downcast_mut::<T>(),
            _ => None,
        }
    }

    pub fn set_deletion_policy(&mut self, node: NodeId, policy: DeletionPolicy) {
        if let NodeKind::Resource(r) = &mut self.nodes[node.0].kind {
            r.deletion_policy = Some(policy);
        }
    }

    pub fn override_logical_id(&mut self, node: NodeId, logical_id: &str) -> Result<()> {
        if let Some(err) = verify_resource_name(logical_id) {
            return Err(Error::InvalidProps(err));
        }
        match &mut self.nodes[node.0].kind {
            NodeKind::Resource(r) => {
                r.logical_id_override = Some(logical_id.to_string());
                Ok(())
            }
            _ => Err(Error::InvalidProps(format!("{} is not a resource", self.display_path(node)))),
        }
    }

    /// The id of a resource inside its stack's template. Derived from the
    /// path below the stack, plus a hash of that path so that ids stay
    /// unique after non-alphanumeric characters are dropped.
    pub fn logical_id(&self, node: NodeId) -> Result<String> {
        let resource = self.resource(node)
            .ok_or_else(|| Error::InvalidProps(format!("{} is not a resource", self.display_path(node))))?;
        if let Some(id) = &resource.logical_id_override {
            return Ok(id.clone());
        }
        self.derived_logical_id(node, None)
    }

    /// A logical id for a sibling of `node` that is derived from it, eg a
    /// version of a function. Goes through the same truncation as every
    /// other logical id so it always fits.
    pub fn logical_id_with_suffix(&self, node: NodeId, suffix: &str) -> Result<String> {
        self.derived_logical_id(node, Some(suffix))
    }

    fn derived_logical_id(&self, node: NodeId, suffix: Option<&str>) -> Result<String> {
        let stack = self.require_stack(node)?;
        let mut components: Vec<&str> = self.lineage(node).into_iter()
            .skip_while(|n| *n != stack)
            .skip(1)
            .map(|n| self.node(n).id.as_str())
            .collect();
        components.extend(suffix);
        Ok(make_unique_id(&components))
    }

    /// Replaces node markers in `value` with the logical id of the resource
    /// they point to (or the node's path for anything else). Unlike the
    /// markers, the result does not depend on the order nodes were created in.
    pub fn stable_json(&self, value: Value) -> Value {
        match value {
            Value::String(s) => match NodeId::from_marker(&s) {
                Some(node) if node.0 < self.nodes.len() => {
                    let stable = self.logical_id(node).unwrap_or_else(|_| self.path(node));
                    Value::String(stable)
                }
                _ => Value::String(s),
            },
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.stable_json(v)).collect()),
            Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, self.stable_json(v))).collect()),
            other => other,
        }
    }

    /// an alphanumeric id that is unique across the whole tree.
    pub fn unique_id(&self, node: NodeId) -> String {
        let components: Vec<&str> = self.lineage(node).into_iter()
            .filter(|n| !matches!(self.node(*n).kind, NodeKind::Root))
            .map(|n| self.node(n).id.as_str())
            .collect();
        make_unique_id(&components)
    }

    /// Records that `from` must deploy after `to`. Both are resolved to
    /// their enclosing stacks. Rejects edges that would close a cycle.
    pub fn add_dependency(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        let from = self.require_stack(from)?;
        let to = self.require_stack(to)?;
        if from == to {
            return Ok(());
        }
        if self.depends_on(to, from) {
            return Err(Error::DependencyCycle { from: self.display_path(from), to: self.display_path(to) });
        }
        if let Some(stack) = self.stack_mut(from) {
            stack.dependencies.insert(to);
        }
        Ok(())
    }

    /// true if `a` transitively depends on `b`.
    pub fn depends_on(&self, a: NodeId, b: NodeId) -> bool {
        let mut seen = BTreeSet::new();
        let mut todo = vec![a];
        while let Some(current) = todo.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(stack) = self.stack(current) {
                for dep in stack.dependencies() {
                    if dep == b {
                        return true;
                    }
                    todo.push(dep);
                }
            }
        }
        false
    }

    pub fn add_parameter(&mut self, stack: NodeId, name: &str, parameter: TemplateParameter) -> Result<()> {
        if let Some(err) = verify_resource_name(name) {
            return Err(Error::InvalidProps(err));
        }
        let path = self.display_path(stack);
        let stack = self.stack_mut(stack).ok_or(Error::NotInStack(path))?;
        stack.parameters.insert(name.to_string(), parameter);
        Ok(())
    }

    pub fn add_output(&mut self, stack: NodeId, key: &str, output: StackOutput) -> Result<()> {
        if let Some(err) = verify_resource_name(key) {
            return Err(Error::InvalidProps(err));
        }
        let path = self.display_path(stack);
        let stack = self.stack_mut(stack).ok_or(Error::NotInStack(path))?;
        stack.outputs.insert(key.to_string(), output);
        Ok(())
    }

    /// stacks that belong to `stage`, in creation order. Does not descend
    /// into nested stages.
    pub fn stacks_in(&self, stage: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut todo: Vec<NodeId> = self.node(stage).children.iter().rev().copied().collect();
        while let Some(current) = todo.pop() {
            match &self.node(current).kind {
                NodeKind::Stack(_) => out.push(current),
                NodeKind::Construct => todo.extend(self.node(current).children.iter().rev().copied()),
                _ => {}
            }
        }
        out.sort();
        out
    }

    /// resources that belong to `stack`, in creation order.
    pub fn resources_in(&self, stack: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut todo: Vec<NodeId> = self.node(stack).children.clone();
        while let Some(current) = todo.pop() {
            match &self.node(current).kind {
                NodeKind::Stack(_) | NodeKind::Stage | NodeKind::Root => continue,
                NodeKind::Resource(_) => out.push(current),
                NodeKind::Construct => {}
            }
            todo.extend(self.node(current).children.iter().copied());
        }
        out.sort();
        out
    }
}

fn make_unique_id(components: &[&str]) -> String {
    const MAX_HUMAN_LEN: usize = 240;
    let hash = adler::adler32_slice(components.join("/").as_bytes());
    let mut human: String = components.iter()
        .filter(|c| **c != "Resource" && **c != "Default")
        .flat_map(|c| c.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if human.is_empty() {
        human.push_str("Resource");
    }
    human.truncate(MAX_HUMAN_LEN);
    format!("{human}{hash:08X}")
}

pub fn verify_resource_name(resource_name: &str) -> Option<String> {
    if resource_name.len() > 255 {
        return Some(format!("Invalid resource name {:?}\nmust be less than 255 characters", resource_name));
    }
    if resource_name.len() < 1 {
        return Some(format!("Invalid resource name {:?}\nMust contain at least 1 character", resource_name));
    }
    if !resource_name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some(format!("Invalid resource name {:?}\nMust contain only alphanumeric characters [A-Za-z0-9]", resource_name));
    }
    None
}

fn validate_stack_name(stack_name: &str) -> std::result::Result<(), String> {
    // A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
    // It must start with an alphabetical character and can't be longer than 128 characters.
    let restriction = "Must only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.";
    match stack_name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(restriction.to_string()),
    }
    if !stack_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(restriction.to_string());
    }
    if stack_name.len() > 128 {
        return Err(restriction.to_string());
    }
    Ok(())
}
