use serde::Serialize;

use crate::token::StrVal;
use super::CfnResource;

/// managed "CachingOptimized" policy.
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-cache-policies.html#managed-cache-caching-optimized
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// the hosted zone id every CloudFront alias target lives in.
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

#[derive(Debug, Clone, Serialize)]
pub struct OriginAccessIdentityConfig {
    #[serde(rename = "Comment")]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloudFrontOriginAccessIdentity {
    #[serde(rename = "CloudFrontOriginAccessIdentityConfig")]
    pub config: OriginAccessIdentityConfig,
}

impl CfnResource for CloudFrontOriginAccessIdentity {
    fn type_string(&self) -> &str {
        "AWS::CloudFront::CloudFrontOriginAccessIdentity"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct S3OriginConfig {
    #[serde(rename = "OriginAccessIdentity")]
    pub origin_access_identity: StrVal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub id: String,
    pub domain_name: StrVal,
    #[serde(rename = "S3OriginConfig")]
    pub s3_origin_config: S3OriginConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct LambdaFunctionAssociation {
    #[serde(rename = "EventType")]
    pub event_type: String,
    #[serde(rename = "LambdaFunctionARN")]
    pub lambda_function_arn: StrVal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultCacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: String,
    pub cache_policy_id: String,
    pub compress: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lambda_function_associations: Vec<LambdaFunctionAssociation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomErrorResponse {
    pub error_code: u16,
    pub response_code: u16,
    pub response_page_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewerCertificate {
    #[serde(rename = "AcmCertificateArn")]
    pub acm_certificate_arn: StrVal,
    #[serde(rename = "MinimumProtocolVersion")]
    pub minimum_protocol_version: String,
    #[serde(rename = "SslSupportMethod")]
    pub ssl_support_method: String,
}

impl ViewerCertificate {
    pub fn sni(acm_certificate_arn: StrVal) -> Self {
        Self {
            acm_certificate_arn,
            minimum_protocol_version: "TLSv1.2_2021".into(),
            ssl_support_method: "sni-only".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_root_object: Option<String>,
    pub price_class: String,
    pub origins: Vec<Origin>,
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_error_responses: Vec<CustomErrorResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_certificate: Option<ViewerCertificate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    #[serde(rename = "DistributionConfig")]
    pub distribution_config: DistributionConfig,
}

impl CfnResource for Distribution {
    fn type_string(&self) -> &str {
        "AWS::CloudFront::Distribution"
    }

    fn validate(&self) -> Result<(), String> {
        let config = &self.distribution_config;
        if config.origins.is_empty() {
            return Err("Must provide at least one origin to cloudfront distribution".into());
        }
        let target = &config.default_cache_behavior.target_origin_id;
        if !config.origins.iter().any(|o| &o.id == target) {
            return Err(format!("Default cache behavior targets unknown origin {target:?}"));
        }
        if !config.aliases.is_empty() && config.viewer_certificate.is_none() {
            return Err("A distribution with aliases requires a viewer certificate".into());
        }
        Ok(())
    }
}
