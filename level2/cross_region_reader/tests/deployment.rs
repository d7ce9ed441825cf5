//! Walks a synthesized cloud assembly the way CloudFormation would, stack by
//! stack in manifest order, with SSM backed by a [`MemoryParameterStore`]
//! and every reader custom resource answered by [`handle`].

use std::collections::HashMap;

use cross_region_reader::{
    handle, CustomResourceRequest, MemoryParameterStore, ReaderProperties, RequestType, ResponseStatus,
};
use edgestack::app;
use edgestack::config::AppConfig;
use edgestack::cross_region::channel::{READER_ATTRIBUTE, READER_RESOURCE_TYPE};
use edgestack::synth::{CloudAssembly, SynthesizedStack};
use serde_json::Value;

const CONFIG: &str = r#"
    [[stage]]
    name = "dev"
    account = "123456789012"
    region = "us-west-2"

    [stage.hosted_zone]
    zone_name = "dev.example.com"

    [[stage.edge_function]]
    event_type = "viewer-request"
    runtime = "provided.al2"
    handler = "bootstrap"
    code_bucket = "artifacts"
    code_key = "oidc.zip"
"#;

const ACCOUNT: &str = "123456789012";

#[derive(Default)]
struct Deployment {
    store: MemoryParameterStore,
    exports: HashMap<String, String>,
    /// (stack name, logical id) -> resolved properties
    deployed: HashMap<(String, String), Value>,
}

/// a resource that was created, with its Ref and any attributes we know.
struct Created {
    reference: String,
    attributes: HashMap<String, String>,
}

struct StackDeploy<'a> {
    stack: &'a SynthesizedStack,
    created: HashMap<String, Created>,
}

impl<'a> StackDeploy<'a> {
    fn region(&self) -> &str {
        self.stack.region.as_deref().unwrap_or("us-east-1")
    }

    fn account(&self) -> &str {
        self.stack.account.as_deref().unwrap_or(ACCOUNT)
    }

    /// `Ok(None)` when the value refers to a resource that is not created yet.
    fn eval(&self, exports: &HashMap<String, String>, value: &Value) -> Result<Option<Value>, String> {
        match value {
            Value::Array(items) => {
                let mut out = vec![];
                for item in items {
                    match self.eval(exports, item)? {
                        Some(v) => out.push(v),
                        None => return Ok(None),
                    }
                }
                Ok(Some(Value::Array(out)))
            }
            Value::Object(map) if map.len() == 1 => {
                let (key, arg) = map.iter().next().ok_or("empty object")?;
                match key.as_str() {
                    "Ref" => self.eval_ref(arg.as_str().ok_or("Ref of a non string")?),
                    "Fn::GetAtt" => {
                        let logical = arg[0].as_str().ok_or("bad GetAtt")?;
                        let attribute = arg[1].as_str().ok_or("bad GetAtt")?;
                        Ok(self.created.get(logical).map(|c| {
                            let v = c.attributes.get(attribute).cloned()
                                .unwrap_or_else(|| format!("{}.{attribute}", c.reference));
                            Value::String(v)
                        }))
                    }
                    "Fn::ImportValue" => {
                        let name = arg.as_str().ok_or("bad ImportValue")?;
                        exports.get(name).map(|v| Some(Value::String(v.clone())))
                            .ok_or_else(|| format!("No export named {name} found"))
                    }
                    "Fn::Join" => {
                        let delimiter = arg[0].as_str().ok_or("bad Join")?;
                        let Some(parts) = self.eval(exports, &arg[1])? else { return Ok(None) };
                        let parts: Vec<&str> = parts.as_array().ok_or("bad Join")?.iter()
                            .map(|p| p.as_str().unwrap_or_default()).collect();
                        Ok(Some(Value::String(parts.join(delimiter))))
                    }
                    "Fn::Split" => {
                        let delimiter = arg[0].as_str().ok_or("bad Split")?;
                        let Some(source) = self.eval(exports, &arg[1])? else { return Ok(None) };
                        let source = source.as_str().ok_or("bad Split")?;
                        Ok(Some(Value::Array(source.split(delimiter).map(|s| Value::String(s.into())).collect())))
                    }
                    "Fn::Select" => {
                        let index = arg[0].as_u64().ok_or("bad Select")? as usize;
                        let Some(list) = self.eval(exports, &arg[1])? else { return Ok(None) };
                        let item = list.as_array().and_then(|l| l.get(index)).cloned();
                        item.map(Some).ok_or_else(|| format!("Select index {index} out of range"))
                    }
                    _ => self.eval_map(exports, map),
                }
            }
            Value::Object(map) => self.eval_map(exports, map),
            other => Ok(Some(other.clone())),
        }
    }

    fn eval_map(&self, exports: &HashMap<String, String>, map: &serde_json::Map<String, Value>) -> Result<Option<Value>, String> {
        let mut out = serde_json::Map::new();
        for (k, v) in map {
            match self.eval(exports, v)? {
                Some(v) => { out.insert(k.clone(), v); }
                None => return Ok(None),
            }
        }
        Ok(Some(Value::Object(out)))
    }

    fn eval_ref(&self, target: &str) -> Result<Option<Value>, String> {
        let v = match target {
            "AWS::Region" => self.region().to_string(),
            "AWS::AccountId" => self.account().to_string(),
            "AWS::Partition" => "aws".to_string(),
            "AWS::URLSuffix" => "amazonaws.com".to_string(),
            "AWS::StackName" => self.stack.stack_name.clone(),
            name if self.stack.template.parameters.contains_key(name) => format!("param-{name}"),
            logical => match self.created.get(logical) {
                Some(c) => c.reference.clone(),
                None if self.stack.template.resources.contains_key(logical) => return Ok(None),
                None => return Err(format!("Ref to unknown {logical} in {}", self.stack.stack_name)),
            },
        };
        Ok(Some(Value::String(v)))
    }

    async fn create(&mut self, store: &MemoryParameterStore, logical: &str, ty: &str, props: &Value) -> Result<(), String> {
        let mut attributes = HashMap::new();
        let reference = match ty {
            "AWS::SSM::Parameter" => {
                let name = props["Name"].as_str().ok_or("parameter without a name")?;
                let value = props["Value"].as_str().ok_or("parameter without a value")?;
                store.put(self.region(), name, value);
                name.to_string()
            }
            "AWS::Lambda::Version" => {
                let function = props["FunctionName"].as_str().ok_or("version without a function")?;
                format!("arn:aws:lambda:{}:{}:function:{function}:1", self.region(), self.account())
            }
            "AWS::CertificateManager::Certificate" => {
                format!("arn:aws:acm:{}:{}:certificate/{logical}", self.region(), self.account())
            }
            READER_RESOURCE_TYPE => {
                let properties: ReaderProperties = serde_json::from_value(props.clone()).map_err(|e| e.to_string())?;
                let request = CustomResourceRequest {
                    request_type: RequestType::Create,
                    response_url: "https://example.com".into(),
                    stack_id: self.stack.stack_name.clone(),
                    request_id: logical.to_string(),
                    resource_type: ty.to_string(),
                    logical_resource_id: logical.to_string(),
                    physical_resource_id: None,
                    resource_properties: properties,
                    old_resource_properties: None,
                };
                let response = handle(&request, store).await;
                if response.status != ResponseStatus::Success {
                    return Err(response.reason.unwrap_or_default());
                }
                attributes.extend(response.data);
                response.physical_resource_id
            }
            _ => format!("{}-{logical}", self.stack.stack_name),
        };
        self.created.insert(logical.to_string(), Created { reference, attributes });
        Ok(())
    }
}

impl Deployment {
    async fn deploy_stack(&mut self, stack: &SynthesizedStack) -> Result<(), String> {
        let mut deploy = StackDeploy { stack, created: HashMap::new() };
        let mut pending: Vec<_> = stack.template.resources.iter().collect();
        while !pending.is_empty() {
            let mut next = vec![];
            for (logical, resource) in pending.iter().copied() {
                match deploy.eval(&self.exports, &resource.properties)? {
                    Some(props) => {
                        deploy.create(&self.store, logical, &resource.ty, &props).await
                            .map_err(|e| format!("{} {logical} failed: {e}", stack.stack_name))?;
                        self.deployed.insert((stack.stack_name.clone(), logical.clone()), props);
                    }
                    None => next.push((logical, resource)),
                }
            }
            if next.len() == pending.len() {
                return Err(format!("{} has resources that can never be created", stack.stack_name));
            }
            pending = next;
        }
        for output in stack.template.outputs.values() {
            let value = deploy.eval(&self.exports, &output.value)?
                .and_then(|v| v.as_str().map(String::from))
                .ok_or("output did not resolve to a string")?;
            if let Some(export) = &output.export {
                self.exports.insert(export.name.clone(), value);
            }
        }
        Ok(())
    }

    async fn deploy<'a>(&mut self, stacks: impl IntoIterator<Item = &'a SynthesizedStack>) -> Result<(), String> {
        for stack in stacks {
            self.deploy_stack(stack).await?;
        }
        Ok(())
    }

    fn resource_of_type(&self, assembly: &CloudAssembly, stack_name: &str, ty: &str) -> Value {
        let stack = assembly.stack(stack_name).unwrap();
        let (logical, _) = stack.template.resources.iter().find(|(_, r)| r.ty == ty).unwrap();
        self.deployed[&(stack_name.to_string(), logical.clone())].clone()
    }
}

fn assembly() -> CloudAssembly {
    let config = AppConfig::from_toml(CONFIG).unwrap();
    app::synth(&config).unwrap().remove(0)
}

#[tokio::test]
async fn values_cross_regions_when_deployed_in_order() {
    let assembly = assembly();
    let mut deployment = Deployment::default();
    deployment.deploy(assembly.stacks.iter()).await.unwrap();

    let cert_support = assembly.stack("dev-CloudFrontCertificateSupportStack").unwrap();
    assert_eq!(cert_support.region.as_deref(), Some("us-east-1"));
    let (cert_logical, _) = cert_support.template.resources.iter()
        .find(|(_, r)| r.ty == "AWS::CertificateManager::Certificate").unwrap();

    let distribution = deployment.resource_of_type(&assembly, "dev-CloudFrontStack", "AWS::CloudFront::Distribution");
    let config = &distribution["DistributionConfig"];
    assert_eq!(
        config["ViewerCertificate"]["AcmCertificateArn"],
        Value::String(format!("arn:aws:acm:us-east-1:{ACCOUNT}:certificate/{cert_logical}")),
    );
    let edge_arn = config["DefaultCacheBehavior"]["LambdaFunctionAssociations"][0]["LambdaFunctionARN"]
        .as_str().unwrap();
    assert!(edge_arn.starts_with(&format!("arn:aws:lambda:us-east-1:{ACCOUNT}:function:")), "{edge_arn}");
    assert!(edge_arn.ends_with(":1"), "{edge_arn}");

    // the certificate was validated against the zone defined in us-west-2.
    let certificate = deployment.resource_of_type(&assembly, "dev-CloudFrontCertificateSupportStack", "AWS::CertificateManager::Certificate");
    let zone_id = certificate["DomainValidationOptions"][0]["HostedZoneId"].as_str().unwrap();
    assert!(zone_id.starts_with("dev-HostedZoneStack-"), "{zone_id}");

    // one parameter per value that crossed a region.
    assert_eq!(deployment.store.len(), 3);
}

#[tokio::test]
async fn reading_before_the_producer_deploys_fails() {
    let assembly = assembly();
    let mut deployment = Deployment::default();
    let without_certificate = assembly.stacks.iter()
        .filter(|s| s.stack_name != "dev-CloudFrontCertificateSupportStack");
    let err = deployment.deploy(without_certificate).await.unwrap_err();
    assert!(err.starts_with("dev-CloudFrontStack"), "{err}");
    assert!(err.contains("not found in us-east-1"), "{err}");
}

#[tokio::test]
async fn edge_function_reader_is_refreshed_by_version() {
    let assembly = assembly();
    let site = assembly.stack("dev-CloudFrontStack").unwrap();
    let edge_support = assembly.stack("dev-CloudFrontEdgeFunctionSupportStack").unwrap();
    let readers: Vec<_> = site.template.resources.values()
        .filter(|r| r.ty == READER_RESOURCE_TYPE)
        .collect();
    assert_eq!(readers.len(), 2);
    let refreshed: Vec<_> = readers.iter().filter_map(|r| r.properties.get("refreshToken")).collect();
    assert_eq!(refreshed.len(), 1);
    let token = refreshed[0].as_str().unwrap();
    assert!(token.contains("CurrentVersion"), "{token}");
    assert_eq!(edge_support.template.resources[token].ty, "AWS::Lambda::Version");

    // the association reads the reader's value, not the version directly.
    let distribution = site.template.resources.values()
        .find(|r| r.ty == "AWS::CloudFront::Distribution").unwrap();
    let association = &distribution.properties["DistributionConfig"]["DefaultCacheBehavior"]["LambdaFunctionAssociations"][0];
    assert_eq!(association["LambdaFunctionARN"]["Fn::GetAtt"][1], Value::String(READER_ATTRIBUTE.into()));
}
