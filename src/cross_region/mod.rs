//! Moving values between stacks that deploy to different regions.
//!
//! A value produced in one region is written to an SSM parameter by the
//! producing stack and read back by a custom resource in the consuming
//! stack, which is made to deploy after the producer.

pub mod channel;
pub mod provider;
pub mod resolver;

pub use channel::{normalize, propagate, read, store, ParameterKind, PARAMETER_NAMESPACE};
pub use resolver::resolve;
