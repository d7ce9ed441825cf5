//! A DNS validated ACM certificate usable by CloudFront distributions.
//!
//! CloudFront only accepts certificates from us-east-1. When the stack the
//! certificate is defined in lives elsewhere, the certificate is created in
//! a support stack in us-east-1 and its arn is read back through the cross
//! region parameter channel. If the hosted zone used for validation is in
//! yet another region, its id is moved into us-east-1 the same way.

use std::collections::BTreeMap;

use crate::cross_region::{self, channel, ParameterKind};
use crate::error::Result;
use crate::metric::{Metric, MetricOptions};
use crate::regions::CLOUDFRONT_REGION;
use crate::resources::acm::Certificate;
use crate::resources::route53::HostedZone;
use crate::token::{NodeId, StrVal};
use crate::tree::Tree;

use super::{concrete_region, Placement};

pub const SUPPORT_STACK_ID: &str = "CloudFrontCertificateSupportStack";
pub const CERTIFICATE_ID: &str = "CloudFrontCertificate";
pub const HOSTED_ZONE_READER_ID: &str = "CloudFrontCrossRegionHostedZone";

/// A hosted zone to validate against. When `hosted_zone_id` refers to a
/// zone resource in the tree, the zone's stack decides whether the id has
/// to cross regions.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedZoneRef {
    pub hosted_zone_id: StrVal,
    pub zone_name: String,
}

impl HostedZoneRef {
    /// an existing zone, outside of the tree.
    pub fn from_attributes(hosted_zone_id: &str, zone_name: &str) -> Self {
        Self { hosted_zone_id: hosted_zone_id.into(), zone_name: zone_name.to_string() }
    }

    /// a zone resource defined in the tree.
    pub fn from_zone(tree: &Tree, zone: NodeId) -> Option<Self> {
        let props = tree.resource_props::<HostedZone>(zone)?;
        Some(Self { hosted_zone_id: StrVal::Ref(zone), zone_name: props.name.clone() })
    }
}

#[derive(Debug, Clone)]
pub struct CertificateProps {
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    pub hosted_zone: HostedZoneRef,
}

#[derive(Debug, Clone)]
pub struct CloudFrontDnsValidatedCertificate {
    node: NodeId,
    certificate_arn: StrVal,
    placement: Placement,
}

impl CloudFrontDnsValidatedCertificate {
    pub fn new(tree: &mut Tree, scope: NodeId, id: &str, props: CertificateProps) -> Result<Self> {
        let (region, in_cloudfront_region) = concrete_region(tree, scope, "CloudFrontDnsValidatedCertificates")?;
        let node = tree.add_construct(scope, id)?;

        if in_cloudfront_region {
            let certificate = tree.add_resource(node, CERTIFICATE_ID, Certificate::dns_validated(
                &props.domain_name,
                &props.subject_alternative_names,
                props.hosted_zone.hosted_zone_id,
            ))?;
            return Ok(Self {
                node,
                certificate_arn: StrVal::Ref(certificate),
                placement: Placement::SameRegion { resource: certificate },
            });
        }

        let companion = cross_region::resolve(tree, node, CLOUDFRONT_REGION, SUPPORT_STACK_ID)?;
        let group_id = tree.unique_id(node);
        let group = tree.add_construct(companion, &group_id)?;
        let hosted_zone_id = cross_region::propagate(
            tree,
            group,
            HOSTED_ZONE_READER_ID,
            node,
            ParameterKind::CloudFrontHostedZone,
            props.hosted_zone.hosted_zone_id,
        )?;
        let certificate = tree.add_resource(group, CERTIFICATE_ID, Certificate::dns_validated(
            &props.domain_name,
            &props.subject_alternative_names,
            hosted_zone_id,
        ))?;

        let key = channel::parameter_key(ParameterKind::CloudFrontCertificate, &region, &tree.path(node));
        cross_region::store(tree, group, &key, StrVal::Ref(certificate))?;
        // no refresh token: a replaced certificate is picked up by the next
        // deployment that changes another input of the read.
        let certificate_arn = cross_region::read(tree, node, &key, CLOUDFRONT_REGION, None)?;

        Ok(Self {
            node,
            certificate_arn,
            placement: Placement::CrossRegion {
                companion,
                resource: certificate,
                parameter_name: channel::namespaced(&key),
            },
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// usable from the stack the certificate was defined in.
    pub fn certificate_arn(&self) -> &StrVal {
        &self.certificate_arn
    }

    /// the `AWS::CertificateManager::Certificate` resource, wherever it lives.
    pub fn certificate(&self) -> NodeId {
        self.placement.resource()
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// ACM publishes DaysToExpiry in the certificate's region, which is
    /// always us-east-1.
    pub fn metric_days_to_expiry(&self, options: MetricOptions) -> Metric {
        let mut dimensions = BTreeMap::new();
        dimensions.insert("CertificateArn".to_string(), self.certificate_arn.clone());
        let options = MetricOptions {
            period_secs: options.period_secs.or(Some(24 * 60 * 60)),
            ..options.with_default_statistic("Minimum").with_region(CLOUDFRONT_REGION)
        };
        Metric::new("AWS/CertificateManager", "DaysToExpiry", dimensions, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::custom::CustomResource;
    use crate::resources::ssm::Parameter;
    use crate::tree::Environment;

    fn props(hosted_zone: HostedZoneRef) -> CertificateProps {
        CertificateProps {
            domain_name: "example.com".into(),
            subject_alternative_names: vec!["*.example.com".into()],
            hosted_zone,
        }
    }

    #[test]
    fn in_us_east_1_the_certificate_is_local() {
        let mut tree = Tree::new();
        let stage = tree.add_stage(tree.root(), "dev").unwrap();
        let stack = tree.add_stack(stage, "Site", Environment::in_region("us-east-1")).unwrap();
        let zone = HostedZoneRef::from_attributes("Z123", "example.com");
        let cert = CloudFrontDnsValidatedCertificate::new(&mut tree, stack, "Cert", props(zone)).unwrap();
        assert!(!cert.placement().is_cross_region());
        assert_eq!(cert.certificate_arn(), &StrVal::Ref(cert.certificate()));
        assert_eq!(tree.stacks_in(stage), vec![stack]);
        assert!(tree.providers.is_empty());
        let stored = tree.resources_in(stack).into_iter().filter(|n| tree.resource_props::<Parameter>(*n).is_some()).count();
        assert_eq!(stored, 0);
    }

    #[test]
    fn elsewhere_the_arn_is_read_from_the_support_stack() {
        let mut tree = Tree::new();
        let stage = tree.add_stage(tree.root(), "dev").unwrap();
        let stack = tree.add_stack(stage, "Site", Environment::in_region("eu-west-1")).unwrap();
        let zone = HostedZoneRef::from_attributes("Z123", "example.com");
        let cert = CloudFrontDnsValidatedCertificate::new(&mut tree, stack, "Cert", props(zone)).unwrap();

        let Placement::CrossRegion { companion, parameter_name, .. } = cert.placement().clone() else {
            panic!("expected a cross region placement");
        };
        assert_eq!(tree.path(companion), "dev/CloudFrontCertificateSupportStack");
        assert_eq!(parameter_name, "/crossRegionParam/cloudFrontCertificate/eu-west-1/dev/Site/Cert");
        assert!(tree.depends_on(stack, companion));
        assert_eq!(tree.stack_of(cert.certificate()), Some(companion));

        let StrVal::GetAtt(reader, _) = cert.certificate_arn().clone() else { panic!("expected GetAtt") };
        assert_eq!(tree.stack_of(reader), Some(stack));
        let reader = tree.resource_props::<CustomResource>(reader).unwrap();
        assert!(reader.properties.get("refreshToken").is_none());

        // a literal zone id needs no propagation
        let issued = tree.resource_props::<Certificate>(cert.certificate()).unwrap();
        assert_eq!(issued.domain_validation_options[0].hosted_zone_id, StrVal::from("Z123"));
    }

    #[test]
    fn zones_in_other_regions_are_propagated() {
        let mut tree = Tree::new();
        let stage = tree.add_stage(tree.root(), "dev").unwrap();
        let zones = tree.add_stack(stage, "Zones", Environment::in_region("eu-west-1")).unwrap();
        let zone = tree.add_resource(zones, "Zone", HostedZone { name: "example.com".into() }).unwrap();
        let stack = tree.add_stack(stage, "Site", Environment::in_region("eu-west-1")).unwrap();
        let zone_ref = HostedZoneRef::from_zone(&tree, zone).unwrap();
        let cert = CloudFrontDnsValidatedCertificate::new(&mut tree, stack, "Cert", props(zone_ref)).unwrap();

        let companion = cert.placement().companion().unwrap();
        assert!(tree.depends_on(companion, zones));
        let issued = tree.resource_props::<Certificate>(cert.certificate()).unwrap();
        let StrVal::GetAtt(zone_reader, _) = issued.domain_validation_options[0].hosted_zone_id.clone() else {
            panic!("expected the zone id to be read");
        };
        assert_eq!(tree.stack_of(zone_reader), Some(companion));
    }

    #[test]
    fn two_certificates_share_one_support_stack() {
        let mut tree = Tree::new();
        let stage = tree.add_stage(tree.root(), "dev").unwrap();
        let stack = tree.add_stack(stage, "Site", Environment::in_region("eu-west-1")).unwrap();
        let zone = HostedZoneRef::from_attributes("Z123", "example.com");
        let a = CloudFrontDnsValidatedCertificate::new(&mut tree, stack, "A", props(zone.clone())).unwrap();
        let b = CloudFrontDnsValidatedCertificate::new(&mut tree, stack, "B", props(zone)).unwrap();
        assert_eq!(a.placement().companion(), b.placement().companion());
        assert_eq!(tree.stacks_in(stage).len(), 2);
        assert_eq!(tree.providers.len(), 1);
    }

    #[test]
    fn unresolved_regions_fail_before_anything_is_created() {
        let mut tree = Tree::new();
        let stage = tree.add_stage(tree.root(), "dev").unwrap();
        let stack = tree.add_stack(stage, "Site", Environment::default()).unwrap();
        let before = tree.len();
        let zone = HostedZoneRef::from_attributes("Z123", "example.com");
        let err = CloudFrontDnsValidatedCertificate::new(&mut tree, stack, "Cert", props(zone)).unwrap_err();
        assert!(err.to_string().contains("explicitly set region"));
        assert_eq!(tree.len(), before);
    }

    #[test]
    fn days_to_expiry_is_read_in_us_east_1() {
        let mut tree = Tree::new();
        let stage = tree.add_stage(tree.root(), "dev").unwrap();
        let stack = tree.add_stack(stage, "Site", Environment::in_region("eu-west-1")).unwrap();
        let zone = HostedZoneRef::from_attributes("Z123", "example.com");
        let cert = CloudFrontDnsValidatedCertificate::new(&mut tree, stack, "Cert", props(zone)).unwrap();
        let metric = cert.metric_days_to_expiry(MetricOptions::default());
        assert_eq!(metric.region.as_deref(), Some("us-east-1"));
        assert_eq!(metric.statistic, "Minimum");
        assert_eq!(metric.period_secs, 86400);
    }
}
