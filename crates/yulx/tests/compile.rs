//! End-to-end tests driving `yulx::compile` over small source snippets.
//! These exercise the full parse -> transform -> serialize pipeline rather
//! than any one stage in isolation.

use yulx::{compile, evm_version::HardFork, CompileOptions};

fn compile_ok(source: &str) -> yulx::CompileOutput {
    compile(source, "t.yulx", CompileOptions::default()).unwrap_or_else(|e| panic!("compile failed: {e}"))
}

#[test]
fn folds_chained_consts_through_arithmetic() {
    let out = compile_ok(
        r#"
object "Main" {
    code {
        const x := 1
        const y := 2
        let z := add(x, y)
        sstore(0, z)
    }
}
"#,
    );
    assert!(out.yul.contains("sstore(0, 3)"));
}

#[test]
fn packs_struct_initializer_into_one_word() {
    let out = compile_ok(
        r#"
struct Account {
    uint96 balance;
    address owner;
}
object "Main" {
    code {
        sstore(0, struct(Account, 0, 0))
    }
}
"#,
    );
    // Both members are zero, so the packed word folds straight to 0.
    assert!(out.yul.contains("sstore(0, 0)"));
}

#[test]
fn throw_lowers_to_selector_and_revert() {
    let out = compile_ok(
        r#"
error Overflow(uint256 code)
object "Main" {
    code {
        throw Overflow(7)
    }
}
"#,
    );
    assert!(out.yul.contains("__throw_Overflow_0"));
    assert!(out.yul.contains("revert(0, 36)") || out.yul.contains("revert(0, 0x24)"));
    assert_eq!(out.selectors.len(), 1);
}

#[test]
fn emit_lowers_to_indexed_topics_and_log_opcode() {
    let out = compile_ok(
        r#"
event Transfer(address indexed from, address indexed to, uint256 value)
object "Main" {
    code {
        emit Transfer(0, 1, 2, 100)
    }
}
"#,
    );
    assert!(out.yul.contains("__emit_Transfer_0"));
    assert!(out.yul.contains("log3"));
}

#[test]
fn keccak256_of_a_hex_literal_folds_at_compile_time() {
    let out = compile_ok(
        r#"
object "Main" {
    code {
        sstore(0, keccak256(hex"deadbeef"))
    }
}
"#,
    );
    assert!(!out.yul.contains("keccak256"));
    // Folds to the literal 256-bit digest, rendered as a plain decimal.
    assert!(out.yul.contains("sstore(0, "));
    assert!(!out.yul.contains("sstore(0, keccak256"));
}

#[test]
fn require_eq_lowers_through_shared_prelude_helper() {
    let out = compile_ok(
        r#"
object "Main" {
    code {
        require.eq(calldatasize(), 4)
    }
}
"#,
    );
    assert!(out.yul.contains("function __require(cond)"));
    assert!(out.yul.contains("__require(eq(calldatasize(), 4))"));
}

#[test]
fn evm_version_pragma_gates_on_target_fork() {
    let source = r#"
pragma evm "cancun"
object "Main" { code { } }
"#;
    let mut options = CompileOptions::default();
    options.evm_version = HardFork::Istanbul;
    assert!(compile(source, "t.yulx", options).is_err());

    let mut options = CompileOptions::default();
    options.evm_version = HardFork::Cancun;
    assert!(compile(source, "t.yulx", options).is_ok());
}

#[test]
fn method_declaration_is_collected_into_abi() {
    let out = compile_ok(
        r#"
object "Main" {
    code {
        method foo(uint256 amount) external view returns (uint256) {
            sstore(0, amount)
        }
    }
}
"#,
    );
    assert_eq!(out.selectors.len(), 1);
    assert!(out.human_readable.iter().any(|l| l.contains("foo(uint256)")));
}

#[test]
fn enum_members_auto_increment_and_fold_into_uses() {
    let out = compile_ok(
        r#"
enum Status {
    Pending,
    Active,
    Closed
}
object "Main" {
    code {
        sstore(0, Status.Active)
    }
}
"#,
    );
    assert!(out.yul.contains("sstore(0, 1)"));
}

#[test]
fn duplicate_method_selectors_are_rejected() {
    let source = r#"
object "Main" {
    code {
        method foo() external { }
        method foo() external { }
    }
}
"#;
    assert!(compile(source, "t.yulx", CompileOptions::default()).is_err());
}

#[test]
fn contract_desugars_into_creation_and_runtime_objects_with_dispatcher() {
    let out = compile_ok(
        r#"
contract Token {
    constructor(uint256 supply) {
        sstore(0, supply)
    }
    method balance() external view returns (uint256) {
        returns(0, sload(0))
    }
}
"#,
    );
    assert!(out.yul.contains(r#"object "Token""#));
    assert!(out.yul.contains(r#"object "TokenRuntime""#));
    assert!(out.yul.contains("datacopy("));
    assert!(out.yul.contains("dataoffset(\"TokenRuntime\")"));
    assert!(out.yul.contains("datasize(\"TokenRuntime\")"));
    assert!(out.yul.contains("switch"));
    assert!(out.yul.contains("stop()"));
}

#[test]
fn locked_method_wraps_invocation_in_mutex_storage_slot() {
    let out = compile_ok(
        r#"
contract Vault {
    method withdraw() external locked {
        sstore(0, 1)
    }
}
"#,
    );
    assert!(out.yul.contains("sload("));
    assert!(out.yul.contains("sstore("));
}

#[test]
fn struct_member_read_and_write_use_shift_and_mask() {
    let out = compile_ok(
        r#"
struct Account {
    uint96 balance;
    address owner;
}
object "Main" {
    code {
        let acct: Account := struct(Account, 0, 0)
        let incoming := calldataload(0)
        acct->balance := incoming
        let b := acct->balance
        sstore(0, b)
    }
}
"#,
    );
    // balance sits at shift 160, width 96: a masked shl on write, shr+and on read.
    // The assigned value is a runtime identifier, not a literal, so the shift
    // survives constant folding.
    assert!(out.yul.contains("shl(160"));
    assert!(out.yul.contains("shr(160"));
    assert!(out.yul.contains("and("));
}

#[test]
fn struct_member_or_assign_skips_the_clear_step() {
    let out = compile_ok(
        r#"
struct Account {
    uint96 balance;
    address owner;
}
object "Main" {
    code {
        let acct: Account := struct(Account, 0, 0)
        let incoming := calldataload(0)
        acct->balance |= incoming
        sstore(0, acct)
    }
}
"#,
    );
    assert!(out.yul.contains("or(acct, shl(160"));
}

#[test]
fn interface_call_thunk_marshals_selector_and_args() {
    let out = compile_ok(
        r#"
interface IERC20 {
    method transfer(address to, uint256 amount) external returns (bool)
}
object "Main" {
    code {
        let ok := call.IERC20.transfer(0x1, 0x2, 100)
        sstore(0, ok)
    }
}
"#,
    );
    assert!(out.yul.contains("function __icall_IERC20_transfer"));
    assert!(out.yul.contains("call(gas()"));
}

#[test]
fn interface_trycall_returns_success_flag_without_bubbling_revert() {
    let out = compile_ok(
        r#"
interface IERC20 {
    method transfer(address to, uint256 amount) external returns (bool)
}
object "Main" {
    code {
        let ok := trycall.IERC20.transfer(0x1, 0x2, 100)
        sstore(0, ok)
    }
}
"#,
    );
    assert!(out.yul.contains("function __itrycall_IERC20_transfer"));
    assert!(!out.yul.contains("returndatacopy"));
}

#[test]
fn interface_create_thunk_forwards_value_and_args_region() {
    let out = compile_ok(
        r#"
interface IFactory {
    constructor(uint256 seed)
}
object "Main" {
    code {
        let addr := create.IFactory(0, 0, 64)
        sstore(0, addr)
    }
}
"#,
    );
    assert!(out.yul.contains("function __icreate_IFactory"));
    assert!(out.yul.contains(":= create(value, argsOffset, argsSize)"));
}

#[test]
fn wrong_arity_interface_call_is_rejected() {
    let source = r#"
interface IERC20 {
    method transfer(address to, uint256 amount) external returns (bool)
}
object "Main" {
    code {
        let ok := call.IERC20.transfer(0x1)
        sstore(0, ok)
    }
}
"#;
    assert!(compile(source, "t.yulx", CompileOptions::default()).is_err());
}

#[test]
fn require_width_and_require_before_lower_through_shared_helper() {
    let out = compile_ok(
        r#"
object "Main" {
    code {
        require.width(5, 8)
        require.before(100)
    }
}
"#,
    );
    assert!(out.yul.contains("function __require(cond)"));
    assert!(out.yul.contains("__require(__check_int(5, 8))"));
    assert!(out.yul.contains("__require(lt(timestamp(), 100))"));
}

#[test]
fn keccak160_of_a_hex_literal_folds_to_a_twenty_byte_digest() {
    let out = compile_ok(
        r#"
object "Main" {
    code {
        sstore(0, keccak160(hex"deadbeef"))
    }
}
"#,
    );
    assert!(!out.yul.contains("keccak160"));
    assert!(out.yul.contains("sstore(0, "));
}

#[test]
fn ecrecover_lowers_through_shared_prelude_helper() {
    let out = compile_ok(
        r#"
object "Main" {
    code {
        let signer := ecrecover(1, 2, 3, 4)
        sstore(0, signer)
    }
}
"#,
    );
    assert!(out.yul.contains("function __ecrecover(hash, v, r, s)"));
    assert!(out.yul.contains("__ecrecover(1, 2, 3, 4)"));
}

#[test]
fn ecverify_rejects_a_zero_expected_address() {
    let out = compile_ok(
        r#"
object "Main" {
    code {
        let ok := ecverify(1, 2, 3, 4, 0x1234)
        sstore(0, ok)
    }
}
"#,
    );
    assert!(out.yul.contains("function __ecverify(hash, v, r, s, expected)"));
    assert!(out.yul.contains("not(iszero(expected))"));
}

#[test]
fn assert_is_dropped_without_debug_and_kept_with_debug() {
    let source = r#"
object "Main" {
    code {
        assert(eq(1, 1))
    }
}
"#;
    let release = compile(source, "t.yulx", CompileOptions::default()).unwrap();
    assert!(!release.yul.contains("__require"));

    let mut debug_options = CompileOptions::default();
    debug_options.debug = true;
    let debug = compile(source, "t.yulx", debug_options).unwrap();
    assert!(debug.yul.contains("__require"));
}

#[test]
fn debug_emits_log1_with_fixed_topic_only_when_debug_is_enabled() {
    let source = r#"
object "Main" {
    code {
        debug(42)
    }
}
"#;
    let release = compile(source, "t.yulx", CompileOptions::default()).unwrap();
    assert!(!release.yul.contains("log1"));

    let mut debug_options = CompileOptions::default();
    debug_options.debug = true;
    let debug = compile(source, "t.yulx", debug_options).unwrap();
    assert!(debug.yul.contains("log1(0, 0, "));
}
