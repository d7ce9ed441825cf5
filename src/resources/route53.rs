use serde::Serialize;

use crate::token::StrVal;
use super::CfnResource;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostedZone {
    pub name: String,
}

impl CfnResource for HostedZone {
    fn type_string(&self) -> &str {
        "AWS::Route53::HostedZone"
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() || !self.name.contains('.') {
            return Err(format!("Invalid hosted zone name {:?}. Must be a domain", self.name));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: StrVal,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: StrVal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordSet {
    pub hosted_zone_id: StrVal,
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_target: Option<AliasTarget>,
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_records: Vec<String>,
}

impl CfnResource for RecordSet {
    fn type_string(&self) -> &str {
        "AWS::Route53::RecordSet"
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Route53 record must have a name. Example mysubdomain.mywebsite.com".into());
        }
        if self.alias_target.is_some() && self.ttl.is_some() {
            return Err("Alias records cannot have a TTL".into());
        }
        if self.alias_target.is_none() && self.resource_records.is_empty() {
            return Err(format!("Record {} needs either an alias target or resource records", self.name));
        }
        Ok(())
    }
}
