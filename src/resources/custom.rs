use std::collections::BTreeMap;

use serde::Serialize;

use crate::token::StrVal;
use super::CfnResource;

/// A `Custom::*` resource backed by a provider lambda.
#[derive(Debug, Clone, Serialize)]
pub struct CustomResource {
    #[serde(skip)]
    pub resource_type: String,
    #[serde(rename = "ServiceToken")]
    pub service_token: StrVal,
    #[serde(flatten)]
    pub properties: BTreeMap<String, StrVal>,
}

impl CfnResource for CustomResource {
    fn type_string(&self) -> &str {
        &self.resource_type
    }

    fn validate(&self) -> Result<(), String> {
        let Some(name) = self.resource_type.strip_prefix("Custom::") else {
            return Err(format!("Custom resource type {:?} must start with Custom::", self.resource_type));
        };
        if name.is_empty() || name.len() > 60 {
            return Err(format!("Custom resource type {:?} must have a name of 1 to 60 characters", self.resource_type));
        }
        if self.properties.contains_key("ServiceToken") {
            return Err("ServiceToken is reserved".into());
        }
        Ok(())
    }
}
