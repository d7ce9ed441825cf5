//! The CloudFormation custom resource request/response documents.
//! https://docs.aws.amazon.com/AWSCloudFormation/latest/UserGuide/crpg-ref.html

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// What the reader is asked to read. Everything is optional here so that
/// a malformed request can still be answered with a FAILED response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderProperties {
    #[serde(rename = "ServiceToken", default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub parameter_name: Option<String>,
    /// only there to make CloudFormation send an Update. never read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub resource_type: String,
    pub logical_resource_id: String,
    /// absent on Create.
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: ReaderProperties,
    #[serde(default)]
    pub old_resource_properties: Option<ReaderProperties>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default)]
    pub no_echo: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl CustomResourceResponse {
    fn for_request(request: &CustomResourceRequest, status: ResponseStatus, physical_resource_id: String) -> Self {
        Self {
            status,
            reason: None,
            physical_resource_id,
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            no_echo: false,
            data: BTreeMap::new(),
        }
    }

    pub fn success(request: &CustomResourceRequest, physical_resource_id: String) -> Self {
        Self::for_request(request, ResponseStatus::Success, physical_resource_id)
    }

    pub fn failed(request: &CustomResourceRequest, physical_resource_id: String, reason: String) -> Self {
        let mut out = Self::for_request(request, ResponseStatus::Failed, physical_resource_id);
        out.reason = Some(reason);
        out
    }

    pub fn with_data(mut self, key: &str, value: String) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_create_request() {
        let request: CustomResourceRequest = serde_json::from_value(json!({
            "RequestType": "Create",
            "ResponseURL": "https://example.com/response",
            "StackId": "arn:aws:cloudformation:us-west-2:123456789012:stack/dev-Site/guid",
            "RequestId": "req-1",
            "ResourceType": "Custom::CrossRegionStringParameterReader",
            "LogicalResourceId": "CertARNReader1234ABCD",
            "ResourceProperties": {
                "ServiceToken": "arn:aws:lambda:us-west-2:123456789012:function:reader",
                "region": "us-east-1",
                "parameterName": "/crossRegionParam/cloudFrontCertificate/us-west-2/dev/Site/Cert"
            }
        })).unwrap();
        assert_eq!(request.request_type, RequestType::Create);
        assert!(request.physical_resource_id.is_none());
        assert_eq!(request.resource_properties.region.as_deref(), Some("us-east-1"));
        assert!(request.resource_properties.refresh_token.is_none());
    }

    #[test]
    fn serializes_the_response_cloudformation_expects() {
        let request = CustomResourceRequest {
            request_type: RequestType::Update,
            response_url: "https://example.com".into(),
            stack_id: "stack".into(),
            request_id: "req".into(),
            resource_type: "Custom::X".into(),
            logical_resource_id: "Reader".into(),
            physical_resource_id: Some("us-east-1:/p".into()),
            resource_properties: ReaderProperties::default(),
            old_resource_properties: None,
        };
        let response = CustomResourceResponse::success(&request, "us-east-1:/p".into()).with_data("stringValue", "v".into());
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({
            "Status": "SUCCESS",
            "PhysicalResourceId": "us-east-1:/p",
            "StackId": "stack",
            "RequestId": "req",
            "LogicalResourceId": "Reader",
            "NoEcho": false,
            "Data": { "stringValue": "v" }
        }));
    }
}
