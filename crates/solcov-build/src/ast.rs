// SPDX-License-Identifier: AGPL-3.0

//! Legacy solc AST (`name` / `attributes` / `children` tree)

use serde::{Deserialize, Deserializer, Serialize};

/// Node kinds the coverage engine distinguishes. Anything else is `Other`,
/// and the raw `name` stays available on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    SourceUnit,
    PragmaDirective,
    ContractDefinition,
    FunctionDefinition,
    Block,
    IfStatement,
    ParameterList,
    VariableDeclaration,
    Other,
}

impl NodeKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "SourceUnit" => NodeKind::SourceUnit,
            "PragmaDirective" => NodeKind::PragmaDirective,
            "ContractDefinition" => NodeKind::ContractDefinition,
            "FunctionDefinition" => NodeKind::FunctionDefinition,
            "Block" => NodeKind::Block,
            "IfStatement" => NodeKind::IfStatement,
            "ParameterList" => NodeKind::ParameterList,
            "VariableDeclaration" => NodeKind::VariableDeclaration,
            _ => NodeKind::Other,
        }
    }

    /// Declarations and control scaffolding that never count as statements
    /// of their own.
    pub fn is_scaffolding(self) -> bool {
        matches!(
            self,
            NodeKind::ContractDefinition
                | NodeKind::IfStatement
                | NodeKind::FunctionDefinition
                | NodeKind::Block
                | NodeKind::PragmaDirective
                | NodeKind::SourceUnit
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstAttributes {
    #[serde(rename = "isConstructor", default)]
    pub is_constructor: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstNode {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub src: String,
    #[serde(default, deserialize_with = "nullable")]
    pub attributes: AstAttributes,
    #[serde(default, deserialize_with = "nullable")]
    pub children: Vec<AstNode>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl AstNode {
    pub fn new(name: &str, src: &str) -> Self {
        Self {
            name: name.to_string(),
            src: src.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attributes(mut self, attributes: AstAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_children(mut self, children: Vec<AstNode>) -> Self {
        self.children = children;
        self
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_name(&self.name)
    }

    pub fn is_constructor(&self) -> bool {
        self.attributes.is_constructor.unwrap_or(false)
    }

    pub fn attribute_name(&self) -> &str {
        self.attributes.name.as_deref().unwrap_or("")
    }

    pub fn attribute_type(&self) -> &str {
        self.attributes.type_name.as_deref().unwrap_or("")
    }

    /// First node, in pre-order, whose `src` starts with `prefix`
    pub fn find_by_range_prefix(&self, prefix: &str) -> Option<&AstNode> {
        if self.src.starts_with(prefix) {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_by_range_prefix(prefix))
    }

    /// Node covering exactly `start..start + length`, in any file
    pub fn find_by_range(&self, start: i64, length: i64) -> Option<&AstNode> {
        self.find_by_range_prefix(&format!("{}:{}:", start, length))
    }

    /// Depth-first walk; returning `false` from `f` skips the node's children.
    pub fn visit<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a AstNode) -> bool,
    {
        if f(self) {
            for child in &self.children {
                child.visit(f);
            }
        }
    }

    /// Canonical input types of a `FunctionDefinition`
    pub fn parameter_types(&self) -> Vec<String> {
        self.children
            .iter()
            .find(|c| c.kind() == NodeKind::ParameterList)
            .map(|params| {
                params
                    .children
                    .iter()
                    .map(|p| canonical_type(p.attribute_type()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `name(type1,type2)` for externally callable functions, `None` for
    /// constructors, unnamed fallbacks and non-function nodes.
    pub fn canonical_signature(&self) -> Option<String> {
        if self.kind() != NodeKind::FunctionDefinition || self.is_constructor() {
            return None;
        }
        let name = self.attribute_name();
        if name.is_empty() {
            return None;
        }
        Some(format!("{}({})", name, self.parameter_types().join(",")))
    }

    /// Non-constructor function definitions, not descending into them
    pub fn function_definitions(&self) -> Vec<&AstNode> {
        let mut functions = Vec::new();
        self.visit(&mut |node| {
            if node.kind() != NodeKind::FunctionDefinition {
                return true;
            }
            if !node.is_constructor() {
                functions.push(node);
            }
            false
        });
        functions
    }
}

const DATA_LOCATIONS: &[&str] = &["memory", "storage", "calldata", "pointer", "ref"];

/// Reduce a type string from the AST to its ABI form, e.g.
/// `string memory` -> `string`, `contract Token[]` -> `address[]`.
pub fn canonical_type(type_name: &str) -> String {
    let mut tokens: Vec<&str> = type_name
        .split_whitespace()
        .filter(|t| !DATA_LOCATIONS.contains(t))
        .collect();

    // array dimensions stick to the last word: `address payable[2][]`
    let suffix = match tokens.last_mut() {
        Some(last) => {
            let word: &str = *last;
            let suffix = array_suffix(word);
            *last = &word[..word.len() - suffix.len()];
            suffix
        }
        None => "",
    };

    let base = match tokens.as_slice() {
        ["address", "payable"] | ["contract", _] => "address".to_string(),
        ["enum", _] => "uint8".to_string(),
        _ => tokens.join(" "),
    };
    format!("{}{}", base, suffix)
}

fn array_suffix(name: &str) -> &str {
    name.find('[').map_or("", |i| &name[i..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(type_name: &str) -> AstNode {
        AstNode::new("VariableDeclaration", "0:0:0").with_attributes(AstAttributes {
            type_name: Some(type_name.to_string()),
            ..Default::default()
        })
    }

    fn function(name: &str, params: Vec<AstNode>, returns: Vec<AstNode>) -> AstNode {
        AstNode::new("FunctionDefinition", "10:20:0")
            .with_attributes(AstAttributes {
                name: Some(name.to_string()),
                is_constructor: Some(false),
                ..Default::default()
            })
            .with_children(vec![
                AstNode::new("ParameterList", "12:3:0").with_children(params),
                AstNode::new("ParameterList", "16:0:0").with_children(returns),
                AstNode::new("Block", "17:13:0"),
            ])
    }

    #[test]
    fn test_node_kind() {
        assert_eq!(NodeKind::from_name("Block"), NodeKind::Block);
        assert_eq!(NodeKind::from_name("ExpressionStatement"), NodeKind::Other);
        assert!(NodeKind::IfStatement.is_scaffolding());
        assert!(!NodeKind::VariableDeclaration.is_scaffolding());
        assert!(!NodeKind::Other.is_scaffolding());
    }

    #[test]
    fn test_canonical_type() {
        assert_eq!(canonical_type("string memory"), "string");
        assert_eq!(canonical_type("uint256[] storage ref"), "uint256[]");
        assert_eq!(canonical_type("address payable"), "address");
        assert_eq!(canonical_type("contract Token"), "address");
        assert_eq!(canonical_type("enum Test.State[2]"), "uint8[2]");
        assert_eq!(canonical_type("bytes32"), "bytes32");
        assert_eq!(canonical_type("address payable[] memory"), "address[]");
        assert_eq!(canonical_type("address payable[2][]"), "address[2][]");
        assert_eq!(canonical_type("contract Token[3] calldata"), "address[3]");
    }

    #[test]
    fn test_signature_uses_inputs_only() {
        let f = function(
            "setValue",
            vec![param("string memory")],
            vec![param("bool")],
        );
        assert_eq!(f.canonical_signature().unwrap(), "setValue(string)");
    }

    #[test]
    fn test_signature_skips_constructor_and_fallback() {
        let mut ctor = function("Test", vec![], vec![]);
        ctor.attributes.is_constructor = Some(true);
        assert_eq!(ctor.canonical_signature(), None);

        let fallback = function("", vec![], vec![]);
        assert_eq!(fallback.canonical_signature(), None);
    }

    #[test]
    fn test_visit_prunes() {
        let root = AstNode::new("SourceUnit", "0:100:0").with_children(vec![
            function("a", vec![param("uint256")], vec![]),
            function("b", vec![], vec![]),
        ]);

        let mut seen = Vec::new();
        root.visit(&mut |n| {
            seen.push(n.name.clone());
            n.kind() != NodeKind::FunctionDefinition
        });
        assert_eq!(
            seen,
            vec!["SourceUnit", "FunctionDefinition", "FunctionDefinition"]
        );
        assert_eq!(root.function_definitions().len(), 2);
    }

    #[test]
    fn test_find_by_range_prefix_is_preorder() {
        let root = AstNode::new("SourceUnit", "0:100:0").with_children(vec![
            AstNode::new("ExpressionStatement", "5:10:0")
                .with_children(vec![AstNode::new("Assignment", "5:10:0")]),
        ]);
        assert_eq!(root.find_by_range(5, 10).unwrap().name, "ExpressionStatement");
        assert_eq!(root.find_by_range_prefix("0:100:").unwrap().name, "SourceUnit");
        assert!(root.find_by_range(5, 1).is_none());
    }

    #[test]
    fn test_deserialize_legacy_node() {
        let json = serde_json::json!({
            "id": 7,
            "name": "FunctionDefinition",
            "src": "1:2:0",
            "attributes": { "isConstructor": false, "name": "f", "visibility": "public" },
            "children": [
                { "name": "ParameterList", "src": "1:0:0", "attributes": null, "children": [] }
            ]
        });
        let node: AstNode = serde_json::from_value(json).unwrap();
        assert_eq!(node.id, 7);
        assert_eq!(node.attribute_name(), "f");
        assert_eq!(node.children[0].attributes, AstAttributes::default());
        assert_eq!(node.canonical_signature().unwrap(), "f()");
    }
}
