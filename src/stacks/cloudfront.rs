use crate::config::EdgeEventType;
use crate::constructs::function::FunctionProps;
use crate::constructs::{CertificateProps, CloudFrontDnsValidatedCertificate, EdgeFunction, HostedZoneRef};
use crate::error::Result;
use crate::resources::cloudfront::{
    CloudFrontOriginAccessIdentity, CustomErrorResponse, DefaultCacheBehavior, Distribution, DistributionConfig,
    LambdaFunctionAssociation, Origin, OriginAccessIdentityConfig, S3OriginConfig, ViewerCertificate,
    CACHING_OPTIMIZED_POLICY_ID, CLOUDFRONT_HOSTED_ZONE_ID,
};
use crate::resources::iam::{PolicyDocument, PolicyPrincipal, PolicyStatement};
use crate::resources::route53::{AliasTarget, RecordSet};
use crate::resources::s3::{Bucket, BucketPolicy};
use crate::token::{NodeId, StrVal};
use crate::tree::{DeletionPolicy, Environment, StackOutput, Tree};

pub const ORIGIN_BUCKET_ID: &str = "CFOriginBucket";

pub struct EdgeLambda {
    pub event_type: EdgeEventType,
    pub props: FunctionProps,
}

#[derive(Default)]
pub struct CloudFrontStackProps {
    /// if provided, the distribution is served from the zone's name with a
    /// certificate validated through the zone.
    pub hosted_zone: Option<HostedZoneRef>,
    pub edge_lambdas: Vec<EdgeLambda>,
}

/// A CloudFront distribution in front of a private S3 bucket.
#[derive(Debug, Clone)]
pub struct CloudFrontStack {
    stack: NodeId,
    origin_bucket: NodeId,
    distribution: NodeId,
    certificate: Option<CloudFrontDnsValidatedCertificate>,
    edge_functions: Vec<(EdgeEventType, EdgeFunction)>,
}

impl CloudFrontStack {
    pub fn new(tree: &mut Tree, scope: NodeId, id: &str, env: Environment, props: CloudFrontStackProps) -> Result<Self> {
        let stack = tree.add_stack(scope, id, env)?;

        // the zone's stack has to exist before we can put records in it.
        if let Some(zone) = &props.hosted_zone {
            for node in zone.hosted_zone_id.referenced_nodes() {
                tree.add_dependency(stack, node)?;
            }
        }

        let origin_bucket = tree.add_resource(stack, ORIGIN_BUCKET_ID, Bucket::default())?;
        tree.set_deletion_policy(origin_bucket, DeletionPolicy::Delete);

        // GetObject alone makes missing objects come back as 403. Listing
        // lets the origin answer 404, which is rewritten to index.html below.
        let identity = tree.add_resource(stack, "CFOriginAccessIdentity", CloudFrontOriginAccessIdentity {
            config: OriginAccessIdentityConfig { comment: format!("Identity for {}", tree.path(origin_bucket)) },
        })?;
        let bucket_arn = StrVal::get_att(origin_bucket, "Arn");
        let mut statement = PolicyStatement::allow(&["s3:GetObject", "s3:List*"], vec![
            StrVal::join("", vec![bucket_arn.clone(), "/*".into()]),
            bucket_arn,
        ]);
        statement.principal = Some(PolicyPrincipal::CanonicalUser(StrVal::get_att(identity, "S3CanonicalUserId")));
        tree.add_resource(stack, "CFOriginBucketPolicy", BucketPolicy {
            bucket: StrVal::Ref(origin_bucket),
            policy_document: PolicyDocument::new(vec![statement]),
        })?;

        let certificate = match &props.hosted_zone {
            Some(zone) => Some(CloudFrontDnsValidatedCertificate::new(tree, stack, "CFCertificate", CertificateProps {
                domain_name: zone.zone_name.clone(),
                subject_alternative_names: vec![],
                hosted_zone: zone.clone(),
            })?),
            None => None,
        };

        let mut edge_functions = vec![];
        let mut associations = vec![];
        for EdgeLambda { event_type, props } in props.edge_lambdas {
            let function = EdgeFunction::new(tree, stack, &format!("CFEdgeFunction{}", event_type.pascal_case()), props)?;
            associations.push(LambdaFunctionAssociation {
                event_type: event_type.as_str().to_string(),
                lambda_function_arn: function.edge_arn().clone(),
            });
            edge_functions.push((event_type, function));
        }

        let distribution = tree.add_resource(stack, "CFDistribution", Distribution {
            distribution_config: DistributionConfig {
                enabled: true,
                aliases: props.hosted_zone.iter().map(|z| z.zone_name.clone()).collect(),
                // serve index.html unless a specific file is requested, so
                // the site can do its own routing.
                default_root_object: Some("index.html".into()),
                price_class: "PriceClass_100".into(),
                origins: vec![Origin {
                    id: ORIGIN_BUCKET_ID.into(),
                    domain_name: StrVal::get_att(origin_bucket, "RegionalDomainName"),
                    s3_origin_config: S3OriginConfig {
                        origin_access_identity: StrVal::join("", vec![
                            "origin-access-identity/cloudfront/".into(),
                            StrVal::Ref(identity),
                        ]),
                    },
                }],
                default_cache_behavior: DefaultCacheBehavior {
                    target_origin_id: ORIGIN_BUCKET_ID.into(),
                    viewer_protocol_policy: "redirect-to-https".into(),
                    cache_policy_id: CACHING_OPTIMIZED_POLICY_ID.into(),
                    compress: true,
                    lambda_function_associations: associations,
                },
                custom_error_responses: vec![CustomErrorResponse {
                    error_code: 404,
                    response_code: 200,
                    response_page_path: "/index.html".into(),
                }],
                viewer_certificate: certificate.as_ref().map(|c| ViewerCertificate::sni(c.certificate_arn().clone())),
            },
        })?;

        if let Some(zone) = &props.hosted_zone {
            for (record_id, record_type) in [("CFIPv4AddressRecord", "A"), ("CFIPv6AddressRecord", "AAAA")] {
                tree.add_resource(stack, record_id, RecordSet {
                    hosted_zone_id: zone.hosted_zone_id.clone(),
                    name: zone.zone_name.clone(),
                    record_type: record_type.into(),
                    alias_target: Some(AliasTarget {
                        dns_name: StrVal::get_att(distribution, "DomainName"),
                        hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.into(),
                    }),
                    ttl: None,
                    resource_records: vec![],
                })?;
            }
        }

        tree.add_output(stack, "DistributionDomainName", StackOutput {
            description: Some("Domain name of the CloudFront distribution".into()),
            value: StrVal::get_att(distribution, "DomainName"),
            export_name: None,
        })?;

        Ok(Self { stack, origin_bucket, distribution, certificate, edge_functions })
    }

    pub fn stack(&self) -> NodeId {
        self.stack
    }

    pub fn origin_bucket(&self) -> NodeId {
        self.origin_bucket
    }

    pub fn distribution(&self) -> NodeId {
        self.distribution
    }

    pub fn certificate(&self) -> Option<&CloudFrontDnsValidatedCertificate> {
        self.certificate.as_ref()
    }

    pub fn edge_function(&self, event_type: EdgeEventType) -> Option<&EdgeFunction> {
        self.edge_functions.iter().find(|(e, _)| *e == event_type).map(|(_, f)| f)
    }
}
