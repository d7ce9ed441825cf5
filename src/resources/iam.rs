use serde::Serialize;

use crate::token::{Pseudo, StrVal};
use super::CfnResource;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Default for Effect {
    // if no effect is given assume allow. only denys should be explicit.
    fn default() -> Self {
        Effect::Allow
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PolicyPrincipal {
    #[serde(rename = "Service")]
    Service(Vec<String>),
    #[serde(rename = "AWS")]
    Aws(StrVal),
    #[serde(rename = "CanonicalUser")]
    CanonicalUser(StrVal),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<PolicyPrincipal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<StrVal>,
}

impl PolicyStatement {
    pub fn allow<S: AsRef<str>>(actions: &[S], resources: Vec<StrVal>) -> Self {
        Self {
            effect: Effect::Allow,
            principal: None,
            action: actions.iter().map(|a| a.as_ref().to_string()).collect(),
            resource: resources,
        }
    }

    /// a trust statement letting `service` assume the role.
    pub fn assume_role(service: &str) -> Self {
        Self {
            effect: Effect::Allow,
            principal: Some(PolicyPrincipal::Service(vec![service.to_string()])),
            action: vec!["sts:AssumeRole".to_string()],
            resource: vec![],
        }
    }

    pub fn has_service_principal(&self, service: &str) -> bool {
        matches!(&self.principal, Some(PolicyPrincipal::Service(s)) if s.iter().any(|x| x == service))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self { version: POLICY_VERSION.to_string(), statement: vec![] }
    }
}

impl PolicyDocument {
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self { statement, ..Default::default() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlinePolicy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    pub assume_role_policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<StrVal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<InlinePolicy>,
}

impl CfnResource for Role {
    fn type_string(&self) -> &str {
        "AWS::IAM::Role"
    }

    fn validate(&self) -> Result<(), String> {
        if self.assume_role_policy_document.statement.is_empty() {
            return Err("Role must have at least one trust statement".into());
        }
        Ok(())
    }
}

impl Role {
    pub const INLINE_POLICY_NAME: &'static str = "Inline";

    /// role for a lambda function with basic logging permissions.
    pub fn for_lambda() -> Self {
        Self {
            assume_role_policy_document: PolicyDocument::new(vec![
                PolicyStatement::assume_role("lambda.amazonaws.com"),
            ]),
            managed_policy_arns: vec![StrVal::join("", vec![
                "arn:".into(),
                StrVal::Pseudo(Pseudo::Partition),
                ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole".into(),
            ])],
            policies: vec![],
        }
    }

    pub fn add_trust_statement(&mut self, statement: PolicyStatement) {
        self.assume_role_policy_document.statement.push(statement);
    }

    /// appends to the role's inline policy, creating it on first use.
    pub fn add_to_policy(&mut self, statement: PolicyStatement) {
        self.inline_policy_mut().statement.push(statement);
    }

    /// like `add_to_policy`, but merges `statement` into an existing
    /// statement with the same effect and actions. Returns true if the
    /// policy changed.
    pub fn merge_into_policy(&mut self, statement: PolicyStatement) -> bool {
        let doc = self.inline_policy_mut();
        let existing = doc.statement.iter_mut().find(|s| {
            s.effect == statement.effect && s.action == statement.action && s.principal == statement.principal
        });
        match existing {
            Some(s) => {
                let mut changed = false;
                for r in statement.resource {
                    if !s.resource.contains(&r) {
                        s.resource.push(r);
                        changed = true;
                    }
                }
                changed
            }
            None => {
                doc.statement.push(statement);
                true
            }
        }
    }

    pub fn inline_statements(&self) -> &[PolicyStatement] {
        self.policies.iter()
            .find(|p| p.policy_name == Self::INLINE_POLICY_NAME)
            .map(|p| p.policy_document.statement.as_slice())
            .unwrap_or(&[])
    }

    fn inline_policy_mut(&mut self) -> &mut PolicyDocument {
        let index = match self.policies.iter().position(|p| p.policy_name == Self::INLINE_POLICY_NAME) {
            Some(i) => i,
            None => {
                self.policies.push(InlinePolicy {
                    policy_name: Self::INLINE_POLICY_NAME.to_string(),
                    policy_document: PolicyDocument::default(),
                });
                self.policies.len() - 1
            }
        };
        &mut self.policies[index].policy_document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merging_widens_matching_statement() {
        let mut role = Role::for_lambda();
        assert!(role.merge_into_policy(PolicyStatement::allow(&["ssm:GetParameter"], vec!["a".into()])));
        assert!(role.merge_into_policy(PolicyStatement::allow(&["ssm:GetParameter"], vec!["b".into()])));
        assert!(!role.merge_into_policy(PolicyStatement::allow(&["ssm:GetParameter"], vec!["a".into()])));
        let statements = role.inline_statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].resource, vec![StrVal::from("a"), StrVal::from("b")]);
    }

    #[test]
    fn trust_statement_serializes_like_cloudformation_expects() {
        let v = serde_json::to_value(PolicyStatement::assume_role("edgelambda.amazonaws.com")).unwrap();
        assert_eq!(v, json!({
            "Effect": "Allow",
            "Principal": { "Service": ["edgelambda.amazonaws.com"] },
            "Action": ["sts:AssumeRole"],
        }));
    }
}
