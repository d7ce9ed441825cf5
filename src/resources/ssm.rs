use serde::Serialize;

use crate::token::StrVal;
use super::CfnResource;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "Type")]
    pub parameter_type: String,
    pub value: StrVal,
}

impl Parameter {
    pub fn string(name: String, value: StrVal) -> Self {
        Self { name, parameter_type: "String".into(), value }
    }
}

impl CfnResource for Parameter {
    fn type_string(&self) -> &str {
        "AWS::SSM::Parameter"
    }

    fn validate(&self) -> Result<(), String> {
        if !self.name.starts_with('/') {
            return Err(format!("Parameter name {:?} must be fully qualified", self.name));
        }
        if self.name.len() > 1011 {
            return Err(format!("Parameter name {:?} is longer than 1011 characters", self.name));
        }
        Ok(())
    }
}
