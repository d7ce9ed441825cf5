use serde::Serialize;

use crate::token::StrVal;
use super::CfnResource;
use super::iam::PolicyDocument;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bucket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
}

impl CfnResource for Bucket {
    fn type_string(&self) -> &str {
        "AWS::S3::Bucket"
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.bucket_name {
            let valid_chars = name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
            if name.len() < 3 || name.len() > 63 || !valid_chars {
                return Err(format!("Invalid bucket name {name:?}\nMust be 3-63 characters of lowercase letters, numbers, dots, and hyphens"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketPolicy {
    pub bucket: StrVal,
    pub policy_document: PolicyDocument,
}

impl CfnResource for BucketPolicy {
    fn type_string(&self) -> &str {
        "AWS::S3::BucketPolicy"
    }
}
