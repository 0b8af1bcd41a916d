// SPDX-License-Identifier: AGPL-3.0

#![recursion_limit = "256"]

#[cfg(test)]
mod tests {
    use serde_json::json;
    use solcov_build::{CombinedOutput, NodeKind};

    fn combined() -> CombinedOutput {
        let doc = json!({
            "contracts": {
                "token.sol:Token": {
                    "bin": "6080604052",
                    "bin-runtime": "6080604052",
                    "srcmap": "0:120:0:-",
                    "srcmap-runtime": "0:120:0:-"
                }
            },
            "sourceList": ["token.sol"],
            "sources": {
                "token.sol": {
                    "AST": {
                        "id": 1, "name": "SourceUnit", "src": "0:120:0",
                        "attributes": { "absolutePath": "token.sol" },
                        "children": [
                            { "id": 2, "name": "PragmaDirective", "src": "0:23:0",
                              "attributes": { "literals": ["solidity", "^", "0.4", ".24"] } },
                            { "id": 3, "name": "ContractDefinition", "src": "25:95:0",
                              "attributes": { "name": "Token" },
                              "children": [
                                { "id": 4, "name": "FunctionDefinition", "src": "44:30:0",
                                  "attributes": { "isConstructor": true, "name": "" },
                                  "children": [
                                    { "id": 5, "name": "ParameterList", "src": "55:2:0", "children": [] },
                                    { "id": 6, "name": "ParameterList", "src": "65:0:0", "children": [] },
                                    { "id": 7, "name": "Block", "src": "65:9:0", "children": [] }
                                  ] },
                                { "id": 8, "name": "FunctionDefinition", "src": "76:42:0",
                                  "attributes": { "isConstructor": false, "name": "transfer" },
                                  "children": [
                                    { "id": 9, "name": "ParameterList", "src": "93:28:0", "children": [
                                        { "id": 10, "name": "VariableDeclaration", "src": "94:10:0",
                                          "attributes": { "name": "to", "type": "address payable" } },
                                        { "id": 11, "name": "VariableDeclaration", "src": "106:14:0",
                                          "attributes": { "name": "amount", "type": "uint256" } }
                                    ] },
                                    { "id": 12, "name": "ParameterList", "src": "110:6:0", "children": [
                                        { "id": 13, "name": "VariableDeclaration", "src": "111:4:0",
                                          "attributes": { "name": "", "type": "bool" } }
                                    ] },
                                    { "id": 14, "name": "Block", "src": "116:2:0", "children": [] }
                                  ] }
                              ] }
                        ]
                    }
                }
            }
        });
        CombinedOutput::from_json_str(&doc.to_string()).unwrap()
    }

    #[test]
    fn test_function_signatures_from_legacy_ast() {
        let out = combined();
        let ast = out.ast("token.sol").unwrap();

        let signatures: Vec<String> = ast
            .function_definitions()
            .into_iter()
            .filter_map(|f| f.canonical_signature())
            .collect();
        assert_eq!(signatures, vec!["transfer(address,uint256)"]);
    }

    #[test]
    fn test_node_lookup_by_range() {
        let out = combined();
        let ast = out.ast("token.sol").unwrap();

        let contract = ast.find_by_range(25, 95).unwrap();
        assert_eq!(contract.kind(), NodeKind::ContractDefinition);
        assert!(contract.kind().is_scaffolding());

        let param = ast.find_by_range(106, 14).unwrap();
        assert_eq!(param.kind(), NodeKind::VariableDeclaration);
        assert_eq!(param.attribute_type(), "uint256");
        assert!(param.src.starts_with("106:14:"));
    }

    #[test]
    fn test_contract_bytecode() {
        let out = combined();
        let (index, name) = out.resolve_source("./contracts/../token.sol").unwrap();
        assert_eq!((index, name), (0, "token.sol"));

        let contracts = out.contracts_in(name);
        assert_eq!(contracts.len(), 1);
        let (key, contract) = contracts[0];
        assert_eq!(key, "token.sol:Token");
        assert_eq!(
            contract.runtime_code(key).unwrap(),
            vec![0x60, 0x80, 0x60, 0x40, 0x52]
        );
        assert_eq!(contract.constructor_code(key).unwrap().len(), 5);
    }

    #[test]
    fn test_malformed_json() {
        assert!(CombinedOutput::from_json_str("{\"contracts\": 3}").is_err());
    }
}
