/// CloudFront only accepts ACM certificates and Lambda@Edge functions
/// that live in this region.
pub const CLOUDFRONT_REGION: &str = "us-east-1";

/// Regions a stack can be pinned to, with the partition each belongs to.
const KNOWN_REGIONS: &[(&str, &str)] = &[
    ("us-east-1", "aws"),
    ("us-east-2", "aws"),
    ("us-west-1", "aws"),
    ("us-west-2", "aws"),
    ("ca-central-1", "aws"),
    ("eu-north-1", "aws"),
    ("eu-west-1", "aws"),
    ("eu-west-2", "aws"),
    ("eu-west-3", "aws"),
    ("eu-central-1", "aws"),
    ("eu-central-2", "aws"),
    ("eu-south-1", "aws"),
    ("eu-south-2", "aws"),
    ("ap-east-1", "aws"),
    ("ap-south-1", "aws"),
    ("ap-south-2", "aws"),
    ("ap-northeast-1", "aws"),
    ("ap-northeast-2", "aws"),
    ("ap-northeast-3", "aws"),
    ("ap-southeast-1", "aws"),
    ("ap-southeast-2", "aws"),
    ("ap-southeast-3", "aws"),
    ("ap-southeast-4", "aws"),
    ("sa-east-1", "aws"),
    ("me-south-1", "aws"),
    ("me-central-1", "aws"),
    ("il-central-1", "aws"),
    ("af-south-1", "aws"),
    ("cn-north-1", "aws-cn"),
    ("cn-northwest-1", "aws-cn"),
    ("us-gov-east-1", "aws-us-gov"),
    ("us-gov-west-1", "aws-us-gov"),
];

/// eg: `aws-cn` for `cn-north-1`. None for regions we do not know.
pub fn partition_of(region: &str) -> Option<&'static str> {
    KNOWN_REGIONS.iter().find(|(r, _)| *r == region).map(|(_, p)| *p)
}

pub fn is_valid_region(region: &str) -> bool {
    partition_of(region).is_some()
}

pub fn verify_region(region: &str) -> Option<String> {
    if is_valid_region(region) {
        return None;
    }
    // eu-middle-1 -> other eu-* regions, to catch typos.
    let prefix = region.split('-').next().unwrap_or_default();
    let similar: Vec<&str> = KNOWN_REGIONS.iter()
        .map(|(r, _)| *r)
        .filter(|r| !prefix.is_empty() && r.starts_with(&format!("{prefix}-")))
        .collect();
    if similar.is_empty() {
        Some(format!("Unknown region {region:?}"))
    } else {
        Some(format!("Unknown region {region:?}\nDid you mean one of {}?", similar.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloudfront_region_is_valid() {
        assert!(is_valid_region(CLOUDFRONT_REGION));
        assert!(verify_region("us-west-2").is_none());
    }

    #[test]
    fn rejects_made_up_regions() {
        let err = verify_region("us-middle-1").unwrap();
        assert!(err.starts_with("Unknown region \"us-middle-1\""));
        assert!(err.contains("us-west-2"));
        assert!(!err.contains("eu-west-1"));
        assert_eq!(verify_region("mars-1").unwrap(), "Unknown region \"mars-1\"");
    }

    #[test]
    fn regions_know_their_partition() {
        assert_eq!(partition_of(CLOUDFRONT_REGION), Some("aws"));
        assert_eq!(partition_of("cn-northwest-1"), Some("aws-cn"));
        assert_eq!(partition_of("us-gov-west-1"), Some("aws-us-gov"));
        assert_eq!(partition_of("us-middle-1"), None);
    }
}
