// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Kind-tagged message type definitions as served by the schema service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structural kind of a type node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// Ordered record of named members.
    Sequence,
    /// Homogeneous list.
    SequenceOf,
    /// Tagged union.
    Choice,
    /// Integer.
    Integer,
    /// Boolean.
    Boolean,
    /// Bit string (`[hex, bit length]` in message bodies).
    BitString,
    /// Octet string.
    OctetString,
    /// Enumeration.
    Enumerated,
    /// Object identifier.
    ObjectIdentifier,
    /// Null.
    Null,
    /// Back-reference to an enclosing type.
    Recursive,
    /// Any kind this crate does not model.
    #[serde(other)]
    Other,
}

impl TypeKind {
    /// Kinds commonly used to carry identifiers.
    pub const fn is_identifier_like(self) -> bool {
        matches!(
            self,
            Self::Integer
                | Self::Enumerated
                | Self::Sequence
                | Self::Choice
                | Self::ObjectIdentifier
                | Self::BitString
                | Self::OctetString
        )
    }
}

/// Value range of an integer type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    /// Upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

/// Constraints attached to a type node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    /// Integer range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    /// Bit or octet size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
    /// Type is extensible.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub extension_marker: bool,
    /// Enumerated values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Value>,
    /// Named bits of a bit string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named_bits: Option<Value>,
}

/// One node of a type definition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeNode {
    /// Field (or type) name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Protocol-level type name (`INTEGER`, `BIT STRING`, a referenced type).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Structural kind.
    pub kind: TypeKind,
    /// Member is optional.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
    /// Free-form annotation (`recursive reference`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Members or element type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TypeNode>,
}

impl TypeNode {
    /// A bare node of `kind`.
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: Some(name.into()),
            type_name: None,
            kind,
            optional: false,
            default: None,
            constraints: None,
            note: None,
            children: Vec::new(),
        }
    }

    /// Builder: append a child.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Visit this node and every descendant, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// First descendant (or self) named `name`.
    pub fn find(&self, name: &str) -> Option<&Self> {
        if self.name.as_deref() == Some(name) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_service_shape() {
        let node: TypeNode = serde_json::from_value(json!({
            "name": "RRCSetupRequest",
            "type": "SEQUENCE",
            "kind": "Sequence",
            "children": [
                {"name": "ue-Identity", "type": "CHOICE", "kind": "Choice", "children": [
                    {"name": "randomValue", "type": "BIT STRING", "kind": "BitString",
                     "constraints": {"size": 39}}
                ]},
                {"name": "spare", "type": "BIT STRING", "kind": "BitString", "optional": true},
                {"name": "future", "kind": "SomethingNew"}
            ]
        }))
        .unwrap();
        assert_eq!(node.children.len(), 3);
        assert_eq!(node.children[2].kind, TypeKind::Other);
        assert!(node.children[1].optional);
        let random = node.find("randomValue").unwrap();
        assert_eq!(random.constraints.as_ref().unwrap().size, Some(json!(39)));

        let mut names = Vec::new();
        node.walk(&mut |n| names.extend(n.name.as_deref()));
        assert_eq!(names.len(), 5);
    }
}
