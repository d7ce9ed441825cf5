use serde::Serialize;

use crate::token::StrVal;
use super::CfnResource;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub hosted_zone_id: StrVal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Certificate {
    pub domain_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
    pub validation_method: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domain_validation_options: Vec<DomainValidationOption>,
}

impl Certificate {
    /// a certificate validated through records in the given hosted zone,
    /// one validation option per name on the certificate.
    pub fn dns_validated(domain_name: &str, subject_alternative_names: &[String], hosted_zone_id: StrVal) -> Self {
        let mut names = vec![domain_name.to_string()];
        for san in subject_alternative_names {
            if !names.contains(san) {
                names.push(san.clone());
            }
        }
        let domain_validation_options = names.into_iter()
            .map(|domain_name| DomainValidationOption { domain_name, hosted_zone_id: hosted_zone_id.clone() })
            .collect();
        Self {
            domain_name: domain_name.to_string(),
            subject_alternative_names: subject_alternative_names.to_vec(),
            validation_method: "DNS".into(),
            domain_validation_options,
        }
    }
}

impl CfnResource for Certificate {
    fn type_string(&self) -> &str {
        "AWS::CertificateManager::Certificate"
    }

    fn validate(&self) -> Result<(), String> {
        if self.domain_name.is_empty() {
            return Err("Must provide a domain name".into());
        }
        for name in std::iter::once(&self.domain_name).chain(self.subject_alternative_names.iter()) {
            if name.contains('*') {
                if name.matches('*').count() > 1 {
                    return Err(format!("Must only provide 1 wildcard. {name} is invalid."));
                }
                if !name.starts_with("*.") {
                    return Err(format!("If using a wildcard, it must be the first component of your domain, eg: \"*.something.com\". {name} is invalid."));
                }
            }
            if name.ends_with('.') {
                return Err(format!("Domain names cannot end with a dot. {name} is invalid."));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_must_lead() {
        let cert = Certificate::dns_validated("a.*.example.com", &[], "Z1".into());
        assert!(cert.validate().is_err());
        let cert = Certificate::dns_validated("*.example.com", &["example.com".into()], "Z1".into());
        assert!(cert.validate().is_ok());
        assert_eq!(cert.domain_validation_options.len(), 2);
    }
}
