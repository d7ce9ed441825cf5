use serde::Serialize;

use crate::token::StrVal;
use super::CfnResource;

#[derive(Debug, Clone, Serialize)]
pub struct Code {
    #[serde(rename = "S3Bucket")]
    pub s3_bucket: StrVal,
    #[serde(rename = "S3Key")]
    pub s3_key: StrVal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Function {
    pub code: Code,
    pub handler: String,
    pub runtime: String,
    pub role: StrVal,
    pub memory_size: u64,
    pub timeout: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CfnResource for Function {
    fn type_string(&self) -> &str {
        "AWS::Lambda::Function"
    }

    fn validate(&self) -> Result<(), String> {
        if self.memory_size < 128 || self.memory_size > 10240 {
            return Err(format!("Invalid memory size {:?}\nMust be between 128 and 10240", self.memory_size));
        }
        if self.timeout < 1 || self.timeout > 900 {
            return Err(format!("Invalid timeout {:?}\nMust be between 1 and 900", self.timeout));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Version {
    pub function_name: StrVal,
}

impl CfnResource for Version {
    fn type_string(&self) -> &str {
        "AWS::Lambda::Version"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Alias {
    pub function_name: StrVal,
    pub function_version: StrVal,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CfnResource for Alias {
    fn type_string(&self) -> &str {
        "AWS::Lambda::Alias"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Permission {
    pub action: String,
    pub function_name: StrVal,
    pub principal: StrVal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_arn: Option<StrVal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_account: Option<StrVal>,
}

impl CfnResource for Permission {
    fn type_string(&self) -> &str {
        "AWS::Lambda::Permission"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventSourceMapping {
    pub function_name: StrVal,
    pub event_source_arn: StrVal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_position: Option<String>,
    pub enabled: bool,
}

impl CfnResource for EventSourceMapping {
    fn type_string(&self) -> &str {
        "AWS::Lambda::EventSourceMapping"
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(batch_size) = self.batch_size {
            if batch_size < 1 || batch_size > 10000 {
                return Err(format!("Invalid batch size {batch_size}\nMust be between 1 and 10000"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Destination {
    #[serde(rename = "Destination")]
    pub destination: StrVal,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DestinationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Destination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Destination>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventInvokeConfig {
    pub function_name: StrVal,
    pub qualifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_event_age_in_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_retry_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_config: Option<DestinationConfig>,
}

impl CfnResource for EventInvokeConfig {
    fn type_string(&self) -> &str {
        "AWS::Lambda::EventInvokeConfig"
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(age) = self.maximum_event_age_in_seconds {
            if age < 60 || age > 21600 {
                return Err(format!("Invalid maximum event age {age}\nMust be between 60 and 21600 seconds"));
            }
        }
        if let Some(retries) = self.maximum_retry_attempts {
            if retries > 2 {
                return Err(format!("Invalid retry attempts {retries}\nMust be between 0 and 2"));
            }
        }
        Ok(())
    }
}
