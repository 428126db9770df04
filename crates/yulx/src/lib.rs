//! Front-end and middle-end for an extended Yul dialect: lexer, parser,
//! lexically-scoped symbol resolution, a lowering transform pass, and ABI
//! metadata collection, finishing in plain Yul text a downstream `solc`/
//! `yulc` run accepts unmodified.
//!
//! The pipeline is a straight line: [`parser::Parser::parse_str`] builds a
//! `Root`, [`transform::Transformer::run`] resolves and rewrites it, and
//! [`serializer::Serializer::render`] prints the result. [`compile`] wires
//! the three together and attaches [`abi::AbiCollector`] output.

pub mod abi;
pub mod ast;
pub mod builtins;
pub mod digest;
pub mod error;
pub mod evm_version;
pub mod lexer;
pub mod mangle;
pub mod parser;
pub mod scope;
pub mod semver;
pub mod serializer;
pub mod transform;

use std::rc::Rc;

pub use error::{Error, Result};
pub use transform::CompileOptions;

/// Everything a caller gets back from one [`compile`] run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompileOutput {
    /// The lowered program, rendered as plain Yul source.
    pub yul: String,
    /// Selector-sorted `(selector, signature)` pairs across methods and errors.
    pub selectors: Vec<(String, String)>,
    /// The Solidity-ABI JSON array for every external method, event, and error.
    pub abi_json: serde_json::Value,
    /// One human-readable line per ABI item (`function foo(uint256) view`, ...).
    pub human_readable: Vec<String>,
}

/// Parses, resolves, and lowers `source` into plain Yul, returning the
/// rendered program alongside its collected ABI metadata.
pub fn compile(source: &str, filename: &str, options: CompileOptions) -> Result<CompileOutput> {
    let root = parser::Parser::parse_str(source, filename)?;
    let mut transformer = transform::Transformer::new(options, Rc::from(filename));
    let lowered = transformer.run(root)?;
    let yul = serializer::Serializer::render(&lowered);
    Ok(CompileOutput {
        yul,
        selectors: transformer.abi.selector_table(),
        abi_json: transformer.abi.to_json(),
        human_readable: transformer.abi.human_readable(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_object_with_constant_folding() {
        let source = r#"
object "Main" {
    code {
        const x := 1
        const y := 2
        let z := add(x, y)
        sstore(0, z)
    }
}
"#;
        let out = compile(source, "t.yulx", CompileOptions::default()).unwrap();
        assert!(out.yul.contains("object \"Main\""));
        assert!(out.yul.contains("sstore(0, 3)"));
    }

    #[test]
    fn rejects_evm_version_pragma_above_target() {
        let source = r#"pragma evm "cancun""#;
        let mut options = CompileOptions::default();
        options.evm_version = evm_version::HardFork::Istanbul;
        assert!(compile(source, "t.yulx", options).is_err());
    }

    #[test]
    fn event_selector_is_deterministic() {
        let source = r#"
event Transfer(address indexed from, address indexed to, uint256 value)
object "Main" {
    code {
        emit Transfer(0, 0, 0, 0)
    }
}
"#;
        let out = compile(source, "t.yulx", CompileOptions::default()).unwrap();
        assert!(out.yul.len() > 0);
    }
}
