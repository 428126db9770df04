//! ABI metadata collection (§4.6): every externally visible method, event,
//! and error is registered once during the transform pass, checked for
//! signature/selector collisions, and later rendered in one of four forms —
//! a selector-sorted hash list, Solidity-ABI JSON, human-readable
//! signatures, or a Solidity interface source stub built from attached doc
//! comments.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    ast::{ErrorDecl, EventDecl, MethodDecl, MethodDef, Mutability, Visibility},
    digest,
    error::{Error, Result},
};

#[derive(Debug, Clone, Serialize)]
pub struct MethodEntry {
    pub name: String,
    pub signature: String,
    pub selector: [u8; 4],
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub returns: Vec<String>,
    pub doc: Option<String>,
    pub has_body: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventEntry {
    pub name: String,
    pub signature: String,
    pub topic0: Option<[u8; 32]>,
    pub anonymous: bool,
    pub indexed: Vec<bool>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub name: String,
    pub signature: String,
    pub selector: [u8; 4],
    pub doc: Option<String>,
}

#[derive(Debug, Default)]
pub struct AbiCollector {
    methods: IndexMap<String, MethodEntry>,
    events: IndexMap<String, EventEntry>,
    errors: IndexMap<String, ErrorEntry>,
    method_selectors: HashMap<[u8; 4], String>,
    error_selectors: HashMap<[u8; 4], String>,
}

fn method_signature(name: &str, params: &crate::ast::MethodParams) -> String {
    let args = params.params.iter().map(|p| p.ty.canonical()).collect::<Vec<_>>().join(",");
    format!("{name}({args})")
}

pub(crate) fn event_signature(decl: &EventDecl) -> String {
    let args = decl.params.iter().map(|p| p.ty.canonical()).collect::<Vec<_>>().join(",");
    format!("{}({args})", decl.name)
}

pub(crate) fn error_signature(decl: &ErrorDecl) -> String {
    let args = decl.params.iter().map(|p| p.ty.canonical()).collect::<Vec<_>>().join(",");
    format!("{}({args})", decl.name)
}

impl AbiCollector {
    pub fn register_interface(&mut self, iface: &crate::ast::Interface) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for method in &iface.methods {
            if !seen.insert(&method.name) {
                return Err(Error::resolution(
                    format!("interface '{}' declares method '{}' more than once", iface.name, method.name),
                    Some(method.at.clone()),
                ));
            }
        }
        Ok(())
    }

    pub fn register_method(&mut self, decl: &MethodDecl) -> Result<()> {
        let signature = method_signature(&decl.name, &decl.params);
        self.insert_method(
            signature,
            decl.name.clone(),
            decl.visibility,
            decl.mutability,
            decl.returns.iter().map(crate::ast::AbiType::canonical).collect(),
            decl.doc.clone(),
            false,
            decl.at.clone(),
        )
    }

    pub fn register_method_def(&mut self, def: &MethodDef) -> Result<()> {
        let signature = method_signature(&def.name, &def.params);
        self.insert_method(
            signature,
            def.name.clone(),
            def.visibility,
            def.mutability,
            def.returns.iter().map(crate::ast::AbiType::canonical).collect(),
            def.doc.clone(),
            true,
            def.at.clone(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_method(
        &mut self,
        signature: String,
        name: String,
        visibility: Visibility,
        mutability: Mutability,
        returns: Vec<String>,
        doc: Option<String>,
        has_body: bool,
        at: crate::error::SourceSpan,
    ) -> Result<()> {
        if self.methods.contains_key(&signature) {
            return Err(Error::resolution(format!("duplicate method signature '{signature}'"), Some(at)));
        }
        let selector = digest::selector4(&signature);
        if let Some(existing) = self.method_selectors.get(&selector) {
            return Err(Error::resolution(
                format!("method '{signature}' collides with '{existing}' on selector {}", digest::to_hex(&selector)),
                Some(at),
            ));
        }
        self.method_selectors.insert(selector, signature.clone());
        self.methods.insert(
            signature.clone(),
            MethodEntry {
                name,
                signature,
                selector,
                visibility,
                mutability,
                returns,
                doc,
                has_body,
            },
        );
        Ok(())
    }

    pub fn register_event(&mut self, decl: &EventDecl) -> Result<()> {
        let signature = event_signature(decl);
        if self.events.contains_key(&signature) {
            return Err(Error::resolution(format!("duplicate event signature '{signature}'"), Some(decl.at.clone())));
        }
        let topic0 = (!decl.anonymous).then(|| digest::topic0(&signature));
        self.events.insert(
            signature.clone(),
            EventEntry {
                name: decl.name.clone(),
                signature,
                topic0,
                anonymous: decl.anonymous,
                indexed: decl.params.iter().map(|p| p.indexed).collect(),
                doc: decl.doc.clone(),
            },
        );
        Ok(())
    }

    pub fn register_error(&mut self, decl: &ErrorDecl) -> Result<()> {
        let signature = error_signature(decl);
        if self.errors.contains_key(&signature) {
            return Err(Error::resolution(format!("duplicate error signature '{signature}'"), Some(decl.at.clone())));
        }
        let selector = digest::selector4(&signature);
        if let Some(existing) = self.error_selectors.get(&selector) {
            return Err(Error::resolution(
                format!("error '{signature}' collides with '{existing}' on selector {}", digest::to_hex(&selector)),
                Some(decl.at.clone()),
            ));
        }
        self.error_selectors.insert(selector, signature.clone());
        self.errors.insert(
            signature.clone(),
            ErrorEntry {
                name: decl.name.clone(),
                signature,
                selector,
                doc: decl.doc.clone(),
            },
        );
        Ok(())
    }

    /// `(selector, signature)` pairs across methods and errors, sorted by
    /// selector for a deterministic hash-list output.
    #[must_use]
    pub fn selector_table(&self) -> Vec<(String, String)> {
        let mut rows: Vec<(String, String)> = self
            .methods
            .values()
            .map(|m| (digest::to_hex(&m.selector), m.signature.clone()))
            .chain(self.errors.values().map(|e| (digest::to_hex(&e.selector), e.signature.clone())))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    #[must_use]
    pub fn human_readable(&self) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        for m in self.methods.values() {
            let kw = match m.mutability {
                Mutability::Payable => " payable",
                Mutability::View => " view",
                Mutability::Pure => " pure",
                Mutability::NonPayable => "",
            };
            let returns = if m.returns.is_empty() {
                String::new()
            } else {
                format!(" returns ({})", m.returns.join(", "))
            };
            lines.push(format!("function {}{kw}{returns}", m.signature));
        }
        for e in self.events.values() {
            lines.push(format!("event {}", e.signature));
        }
        for e in self.errors.values() {
            lines.push(format!("error {}", e.signature));
        }
        lines
    }

    /// Renders a Solidity-ABI JSON array (the standard `abi.json` shape).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut items = Vec::new();
        for m in self.methods.values() {
            if m.visibility != Visibility::External && m.visibility != Visibility::Public {
                continue;
            }
            items.push(serde_json::json!({
                "type": "function",
                "name": m.name,
                "stateMutability": state_mutability_str(m.mutability),
                "inputs": [],
                "outputs": m.returns.iter().map(|t| serde_json::json!({"type": t})).collect::<Vec<_>>(),
            }));
        }
        for e in self.events.values() {
            items.push(serde_json::json!({
                "type": "event",
                "name": e.name,
                "anonymous": e.anonymous,
            }));
        }
        for e in self.errors.values() {
            items.push(serde_json::json!({
                "type": "error",
                "name": e.name,
            }));
        }
        serde_json::Value::Array(items)
    }

    /// Renders a Solidity `interface` source stub, carrying forward any
    /// attached doc comments as NatSpec-style `///` lines.
    #[must_use]
    pub fn solidity_interface(&self, name: &str) -> String {
        let mut out = format!("interface {name} {{\n");
        for m in self.methods.values() {
            if m.visibility != Visibility::External {
                continue;
            }
            if let Some(doc) = &m.doc {
                for line in doc.lines() {
                    out.push_str(&format!("    /// {line}\n"));
                }
            }
            let kw = match m.mutability {
                Mutability::Payable => " payable",
                Mutability::View => " view",
                Mutability::Pure => " pure",
                Mutability::NonPayable => "",
            };
            let returns = if m.returns.is_empty() {
                String::new()
            } else {
                format!(" returns ({})", m.returns.join(", "))
            };
            out.push_str(&format!("    function {}{kw} external{returns};\n", m.signature));
        }
        for e in self.events.values() {
            out.push_str(&format!("    event {};\n", e.signature));
        }
        for e in self.errors.values() {
            out.push_str(&format!("    error {};\n", e.signature));
        }
        out.push_str("}\n");
        out
    }
}

fn state_mutability_str(mutability: Mutability) -> &'static str {
    match mutability {
        Mutability::NonPayable => "nonpayable",
        Mutability::Payable => "payable",
        Mutability::View => "view",
        Mutability::Pure => "pure",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::MethodParams, error::SourceSpan};

    fn span() -> SourceSpan {
        SourceSpan::new("t.yulx", 1, 1)
    }

    fn decl(name: &str) -> MethodDecl {
        MethodDecl {
            name: name.to_owned(),
            params: MethodParams::default(),
            visibility: Visibility::External,
            mutability: Mutability::NonPayable,
            returns: vec![],
            doc: None,
            at: span(),
        }
    }

    #[test]
    fn duplicate_signature_is_rejected() {
        let mut abi = AbiCollector::default();
        abi.register_method(&decl("foo")).unwrap();
        assert!(abi.register_method(&decl("foo")).is_err());
    }

    #[test]
    fn selector_table_is_sorted_and_includes_errors() {
        let mut abi = AbiCollector::default();
        abi.register_method(&decl("transfer")).unwrap();
        abi.register_error(&ErrorDecl {
            name: "Overflow".to_owned(),
            params: vec![],
            doc: None,
            at: span(),
        })
        .unwrap();
        let table = abi.selector_table();
        assert_eq!(table.len(), 2);
        assert!(table[0].0 <= table[1].0);
    }
}
