//! Property schemas of the CloudFormation resources this crate declares.
//!
//! Only the properties the app actually sets are modeled. Every schema
//! serializes straight into the `Properties` block of its template entry.

use std::any::Any;
use std::fmt::Debug;

use serde::Serialize;
use serde_json::Value;

pub mod acm;
pub mod cloudfront;
pub mod custom;
pub mod iam;
pub mod lambda;
pub mod route53;
pub mod s3;
pub mod ssm;

pub trait CfnResource: Serialize + Debug + 'static {
    fn type_string(&self) -> &str;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Type erased resource as stored in the tree. Schemas can be read back
/// (and mutated) with [`AnyResource::downcast_mut`].
pub trait AnyResource: Debug {
    fn type_string(&self) -> &str;
    fn validate(&self) -> Result<(), String>;
    fn properties(&self) -> serde_json::Result<Value>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: CfnResource> AnyResource for T {
    fn type_string(&self) -> &str {
        CfnResource::type_string(self)
    }
    fn validate(&self) -> Result<(), String> {
        CfnResource::validate(self)
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn AnyResource {
    pub fn downcast_ref<T: CfnResource>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: CfnResource>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
