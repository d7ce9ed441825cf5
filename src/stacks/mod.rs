//! The stacks a stage is made of.

pub mod cloudfront;
pub mod hosted_zone;

pub use cloudfront::{CloudFrontStack, CloudFrontStackProps, EdgeLambda};
pub use hosted_zone::HostedZoneStack;
