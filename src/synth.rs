//! Turns the stacks of a stage into CloudFormation templates.
//!
//! References between resources are written into properties as node
//! markers (see [`crate::token`]). Here they become logical ids when
//! producer and consumer share a stack, or an export in the producer plus
//! an `Fn::ImportValue` in the consumer when they share a region. Anything
//! else is an error: values that must cross regions go through
//! [`crate::cross_region`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::NodeId;
use crate::tree::{DeletionPolicy, NodeKind, TemplateParameter, Tree};

pub const TEMPLATE_VERSION: &str = "2010-09-09";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DeletionPolicy", skip_serializing_if = "Option::is_none", default)]
    pub deletion_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutput {
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(rename = "Value")]
    pub value: Value,
    #[serde(rename = "Export", skip_serializing_if = "Option::is_none", default)]
    pub export: Option<Export>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedParameter {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(rename = "Parameters", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub parameters: BTreeMap<String, SavedParameter>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, ResourceOutput>,
}

impl Default for SavedTemplate {
    fn default() -> Self {
        Self {
            version: TEMPLATE_VERSION.to_string(),
            description: None,
            parameters: Default::default(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

/// One stack of a cloud assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedStack {
    pub node: NodeId,
    pub stack_name: String,
    pub region: Option<String>,
    pub account: Option<String>,
    pub template: SavedTemplate,
    /// names of stacks that must finish deploying first.
    pub dependencies: Vec<String>,
}

impl SynthesizedStack {
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.stack_name)
    }
}

/// Everything needed to deploy one stage. Stacks are in deployment order:
/// every stack comes after all of its dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudAssembly {
    pub stage: String,
    pub stacks: Vec<SynthesizedStack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStack {
    pub stack_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub account: Option<String>,
    pub template_file: String,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub stage: String,
    /// in deployment order.
    pub stacks: Vec<ManifestStack>,
}

impl CloudAssembly {
    pub fn stack(&self, stack_name: &str) -> Option<&SynthesizedStack> {
        self.stacks.iter().find(|s| s.stack_name == stack_name)
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            stage: self.stage.clone(),
            stacks: self.stacks.iter().map(|s| ManifestStack {
                stack_name: s.stack_name.clone(),
                region: s.region.clone(),
                account: s.account.clone(),
                template_file: s.template_file(),
                dependencies: s.dependencies.clone(),
            }).collect(),
        }
    }

    /// writes `manifest.json` and one template per stack into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|source| Error::Io { path: dir.display().to_string(), source })?;
        for stack in self.stacks.iter() {
            write_json(&dir.join(stack.template_file()), &stack.template)?;
        }
        write_json(&dir.join(MANIFEST_FILE), &self.manifest())?;
        info!("wrote {} stacks of stage {} to {}", self.stacks.len(), self.stage, dir.display());
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|source| Error::Serialize { path: path.display().to_string(), source })?;
    std::fs::write(path, body).map_err(|source| Error::Io { path: path.display().to_string(), source })
}

/// Synthesizes every stage directly under the root of the tree.
pub fn synth_app(tree: &Tree) -> Result<Vec<CloudAssembly>> {
    let root = tree.root();
    tree.node(root).children().iter()
        .filter(|n| matches!(tree.node(**n).kind(), NodeKind::Stage))
        .map(|stage| synth_stage(tree, *stage))
        .collect()
}

pub fn synth_stage(tree: &Tree, stage: NodeId) -> Result<CloudAssembly> {
    let stacks = tree.stacks_in(stage);
    let mut synth = Synth {
        tree,
        templates: BTreeMap::new(),
        exports: BTreeMap::new(),
        implicit_dependencies: BTreeMap::new(),
    };
    for stack in stacks.iter() {
        let template = synth.stack_template(*stack)?;
        synth.templates.insert(*stack, template);
    }
    let Synth { mut templates, exports, implicit_dependencies, .. } = synth;
    for (producer, outputs) in exports {
        if let Some(template) = templates.get_mut(&producer) {
            template.outputs.extend(outputs);
        }
    }

    let mut dependencies: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    for stack in stacks.iter() {
        let mut deps: BTreeSet<NodeId> = tree.stack(*stack).map(|s| s.dependencies().collect()).unwrap_or_default();
        if let Some(implicit) = implicit_dependencies.get(stack) {
            deps.extend(implicit.iter().copied());
        }
        for dep in deps.iter() {
            if !stacks.contains(dep) {
                return Err(Error::CrossStageReference {
                    consumer: tree.display_path(*stack),
                    producer: tree.display_path(*dep),
                });
            }
        }
        dependencies.insert(*stack, deps);
    }

    let order = deployment_order(tree, &stacks, &dependencies)?;
    let mut out = Vec::with_capacity(order.len());
    for stack in order {
        let data = tree.stack(stack).ok_or_else(|| Error::NotInStack(tree.display_path(stack)))?;
        let template = templates.remove(&stack).unwrap_or_default();
        out.push(SynthesizedStack {
            node: stack,
            stack_name: tree.stack_name(stack),
            region: data.env.region.clone(),
            account: data.env.account.clone(),
            template,
            dependencies: dependencies.get(&stack).into_iter().flatten().map(|d| tree.stack_name(*d)).collect(),
        });
    }
    Ok(CloudAssembly { stage: tree.path(stage), stacks: out })
}

/// Kahn's algorithm. Among stacks that are ready to deploy, the one created
/// first goes first.
fn deployment_order(
    tree: &Tree,
    stacks: &[NodeId],
    dependencies: &BTreeMap<NodeId, BTreeSet<NodeId>>,
) -> Result<Vec<NodeId>> {
    let mut remaining: BTreeMap<NodeId, usize> = stacks.iter()
        .map(|s| (*s, dependencies.get(s).map(|d| d.len()).unwrap_or(0)))
        .collect();
    let mut ready: BTreeSet<NodeId> = remaining.iter().filter(|(_, n)| **n == 0).map(|(s, _)| *s).collect();
    let mut order = Vec::with_capacity(stacks.len());
    while let Some(next) = ready.pop_first() {
        remaining.remove(&next);
        order.push(next);
        for (stack, count) in remaining.iter_mut() {
            if dependencies.get(stack).map(|d| d.contains(&next)).unwrap_or(false) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*stack);
                }
            }
        }
    }
    if let Some((stuck, _)) = remaining.iter().next() {
        let to = dependencies.get(stuck)
            .and_then(|d| d.iter().find(|dep| remaining.contains_key(dep)))
            .copied()
            .unwrap_or(*stuck);
        return Err(Error::DependencyCycle { from: tree.display_path(*stuck), to: tree.display_path(to) });
    }
    Ok(order)
}

struct Synth<'a> {
    tree: &'a Tree,
    templates: BTreeMap<NodeId, SavedTemplate>,
    /// outputs to add to producer stacks, keyed by producer.
    exports: BTreeMap<NodeId, BTreeMap<String, ResourceOutput>>,
    /// consumer -> producers found through references.
    implicit_dependencies: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl<'a> Synth<'a> {
    fn stack_template(&mut self, stack: NodeId) -> Result<SavedTemplate> {
        let tree = self.tree;
        let data = tree.stack(stack).ok_or_else(|| Error::NotInStack(tree.display_path(stack)))?;
        let mut template = SavedTemplate { description: data.description.clone(), ..Default::default() };
        for (name, TemplateParameter { ty, description }) in data.parameters() {
            template.parameters.insert(name.clone(), SavedParameter { ty: ty.clone(), description: description.clone() });
        }

        for node in tree.resources_in(stack) {
            let Some(resource) = tree.resource(node) else { continue };
            if let Err(reason) = resource.properties().validate() {
                return Err(Error::InvalidResource { path: tree.display_path(node), reason });
            }
            let properties = resource.properties().properties()
                .map_err(|source| Error::Serialize { path: tree.display_path(node), source })?;
            let properties = self.resolve_value(stack, node, properties)?;
            let logical_id = tree.logical_id(node)?;
            if template.resources.contains_key(&logical_id) {
                return Err(Error::DuplicateId { parent: tree.display_path(stack), id: logical_id });
            }
            template.resources.insert(logical_id, SavedResource {
                ty: resource.type_string().to_string(),
                properties,
                deletion_policy: resource.deletion_policy.map(deletion_policy_name),
            });
        }

        for (key, output) in data.outputs() {
            let value = self.resolve_value(stack, stack, output.value.to_json())?;
            template.outputs.insert(key.clone(), ResourceOutput {
                description: output.description.clone(),
                value,
                export: output.export_name.clone().map(|name| Export { name }),
            });
        }
        Ok(template)
    }

    /// rewrites node markers inside `value`, as seen from `consumer_stack`.
    fn resolve_value(&mut self, consumer_stack: NodeId, consumer: NodeId, value: Value) -> Result<Value> {
        match value {
            Value::Array(items) => items.into_iter()
                .map(|v| self.resolve_value(consumer_stack, consumer, v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                if let Some(reference) = self.as_reference(&map) {
                    let (producer, attribute) = reference;
                    return self.resolve_reference(consumer_stack, consumer, producer, attribute);
                }
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, self.resolve_value(consumer_stack, consumer, v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other),
        }
    }

    fn as_reference(&self, map: &serde_json::Map<String, Value>) -> Option<(NodeId, Option<String>)> {
        if map.len() != 1 {
            return None;
        }
        if let Some(Value::String(target)) = map.get("Ref") {
            return NodeId::from_marker(target).map(|n| (n, None));
        }
        if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
            if let [Value::String(target), Value::String(attribute)] = args.as_slice() {
                return NodeId::from_marker(target).map(|n| (n, Some(attribute.clone())));
            }
        }
        None
    }

    fn resolve_reference(
        &mut self,
        consumer_stack: NodeId,
        consumer: NodeId,
        producer: NodeId,
        attribute: Option<String>,
    ) -> Result<Value> {
        let tree = self.tree;
        if producer.0 >= tree.len() || tree.resource(producer).is_none() {
            return Err(Error::InvalidProps(format!(
                "{} references node {producer} which is not a resource",
                tree.display_path(consumer),
            )));
        }
        let logical_id = tree.logical_id(producer)?;
        let local = match &attribute {
            None => json!({ "Ref": logical_id }),
            Some(attribute) => json!({ "Fn::GetAtt": [logical_id, attribute] }),
        };
        let producer_stack = tree.require_stack(producer)?;
        if producer_stack == consumer_stack {
            return Ok(local);
        }

        if tree.stage_of(producer_stack) != tree.stage_of(consumer_stack) {
            return Err(Error::CrossStageReference {
                consumer: tree.display_path(consumer),
                producer: tree.display_path(producer),
            });
        }
        let consumer_region = tree.region_of(consumer_stack);
        let producer_region = tree.region_of(producer_stack);
        if consumer_region != producer_region {
            return Err(Error::CrossRegionReference {
                consumer: tree.display_path(consumer),
                consumer_region: consumer_region.unwrap_or("an unresolved region").to_string(),
                producer: tree.display_path(producer),
                producer_region: producer_region.unwrap_or("an unresolved region").to_string(),
            });
        }
        if let (Some(a), Some(b)) = (tree.account_of(consumer_stack), tree.account_of(producer_stack)) {
            if a != b {
                return Err(Error::CrossAccountReference {
                    consumer: tree.display_path(consumer),
                    producer: tree.display_path(producer),
                });
            }
        }

        let output_key = match &attribute {
            None => format!("ExportsOutputRef{logical_id}"),
            Some(attribute) => {
                let attribute: String = attribute.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
                format!("ExportsOutputFnGetAtt{logical_id}{attribute}")
            }
        };
        let export_name = format!("{}:{output_key}", tree.stack_name(producer_stack));
        let outputs = self.exports.entry(producer_stack).or_default();
        if !outputs.contains_key(&output_key) {
            debug!("exporting {export_name} for {}", tree.display_path(consumer));
            outputs.insert(output_key, ResourceOutput {
                description: None,
                value: local,
                export: Some(Export { name: export_name.clone() }),
            });
        }
        self.implicit_dependencies.entry(consumer_stack).or_default().insert(producer_stack);
        Ok(json!({ "Fn::ImportValue": export_name }))
    }
}

fn deletion_policy_name(policy: DeletionPolicy) -> String {
    match policy {
        DeletionPolicy::Delete => "Delete",
        DeletionPolicy::Retain => "Retain",
        DeletionPolicy::Snapshot => "Snapshot",
    }.to_string()
}
