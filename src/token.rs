use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// references to nodes are serialized with this prefix and rewritten to
/// logical ids (or imports) when a stack's template is synthesized.
pub const NODE_MARKER: &str = "#node:";

/// Index of a construct in a [`crate::tree::Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn marker(&self) -> String {
        format!("{NODE_MARKER}{}", self.0)
    }

    pub fn from_marker(s: &str) -> Option<NodeId> {
        s.strip_prefix(NODE_MARKER)?.parse().ok().map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pseudo {
    Region,
    AccountId,
    Partition,
    StackName,
    UrlSuffix,
}

impl Pseudo {
    pub fn name(&self) -> &'static str {
        match self {
            Pseudo::Region => "AWS::Region",
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::Partition => "AWS::Partition",
            Pseudo::StackName => "AWS::StackName",
            Pseudo::UrlSuffix => "AWS::URLSuffix",
        }
    }
}

/// A string property value. Anything other than `Literal` is only known
/// once CloudFormation deploys the stack that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StrVal {
    Literal(String),
    /// `Ref` of a resource node.
    Ref(NodeId),
    /// `Fn::GetAtt` of a resource node.
    GetAtt(NodeId, String),
    Pseudo(Pseudo),
    /// `Ref` of a template parameter.
    Parameter(String),
    Join(String, Vec<StrVal>),
    /// `Fn::Select [index, Fn::Split [delimiter, source]]`
    SelectSplit { index: usize, delimiter: String, source: Box<StrVal> },
}

impl StrVal {
    pub fn get_att(node: NodeId, attribute: &str) -> StrVal {
        StrVal::GetAtt(node, attribute.to_string())
    }

    pub fn join<S: Into<String>>(delimiter: S, parts: Vec<StrVal>) -> StrVal {
        StrVal::Join(delimiter.into(), parts)
    }

    /// picks the `index`th element of `source` split by `delimiter`.
    /// folds to a literal right away when `source` is already known.
    pub fn select_split(index: usize, delimiter: &str, source: StrVal) -> StrVal {
        if let StrVal::Literal(s) = &source {
            if let Some(part) = s.split(delimiter).nth(index) {
                return StrVal::Literal(part.to_string());
            }
        }
        StrVal::SelectSplit { index, delimiter: delimiter.to_string(), source: Box::new(source) }
    }

    pub fn is_unresolved(&self) -> bool {
        !matches!(self, StrVal::Literal(_))
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            StrVal::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// every resource node this value refers to, in order of appearance.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        let mut out = vec![];
        self.collect_nodes(&mut out);
        out
    }

    fn collect_nodes(&self, out: &mut Vec<NodeId>) {
        match self {
            StrVal::Ref(n) | StrVal::GetAtt(n, _) => {
                if !out.contains(n) {
                    out.push(*n);
                }
            }
            StrVal::Join(_, parts) => {
                for p in parts {
                    p.collect_nodes(out);
                }
            }
            StrVal::SelectSplit { source, .. } => source.collect_nodes(out),
            StrVal::Literal(_) | StrVal::Pseudo(_) | StrVal::Parameter(_) => {}
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            StrVal::Literal(s) => Value::String(s.clone()),
            StrVal::Ref(n) => json!({ "Ref": n.marker() }),
            StrVal::GetAtt(n, attr) => json!({ "Fn::GetAtt": [n.marker(), attr] }),
            StrVal::Pseudo(p) => json!({ "Ref": p.name() }),
            StrVal::Parameter(name) => json!({ "Ref": name }),
            StrVal::Join(delimiter, parts) => {
                let parts: Vec<Value> = parts.iter().map(|p| p.to_json()).collect();
                json!({ "Fn::Join": [delimiter, parts] })
            }
            StrVal::SelectSplit { index, delimiter, source } => {
                json!({ "Fn::Select": [index, { "Fn::Split": [delimiter, source.to_json()] }] })
            }
        }
    }
}

impl Default for StrVal {
    fn default() -> Self {
        StrVal::Literal(String::new())
    }
}

impl From<&str> for StrVal {
    fn from(s: &str) -> Self {
        StrVal::Literal(s.to_string())
    }
}

impl From<String> for StrVal {
    fn from(s: String) -> Self {
        StrVal::Literal(s)
    }
}

impl From<&String> for StrVal {
    fn from(s: &String) -> Self {
        StrVal::Literal(s.clone())
    }
}

impl Serialize for StrVal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
