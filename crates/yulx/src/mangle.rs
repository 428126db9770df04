//! Name mangling used when materialising library helpers into a scope that
//! already declares a colliding local (§4.4 "Dependency materialisation",
//! §9 "Shadowing restriction in emitted Yul").

/// Appends a mangling sigil to `name`, producing a fresh identifier that
/// cannot collide with user source (`$` and `.` are valid identifier
/// characters in the dialect's grammar but never chosen by hand-written
/// source for a plain local).
#[must_use]
pub fn sigil(name: &str, generation: u32) -> String {
    if generation == 0 {
        format!("{name}$")
    } else {
        format!("{name}$${generation}")
    }
}

/// Deterministic helper-function name for a synthesised interface thunk.
#[must_use]
pub fn interface_create(interface: &str) -> String {
    format!("__icreate_{interface}")
}

#[must_use]
pub fn interface_create2(interface: &str) -> String {
    format!("__icreate2_{interface}")
}

#[must_use]
pub fn interface_call(interface: &str, method: &str) -> String {
    format!("__icall_{interface}_{method}")
}

#[must_use]
pub fn interface_trycall(interface: &str, method: &str) -> String {
    format!("__itrycall_{interface}_{method}")
}

#[must_use]
pub fn emit_helper(event: &str, depth: usize) -> String {
    format!("__emit_{event}_{depth}")
}

#[must_use]
pub fn throw_helper(error: &str, depth: usize) -> String {
    format!("__throw_{error}_{depth}")
}

#[must_use]
pub fn method_helper(method: &str) -> String {
    format!("__method_{method}")
}

#[must_use]
pub fn lock_key_helper(depth: usize) -> String {
    format!("__lockkey_{depth}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigil_escalates_with_generation() {
        assert_eq!(sigil("x", 0), "x$");
        assert_eq!(sigil("x", 1), "x$$1");
        assert_eq!(sigil("x", 2), "x$$2");
    }

    #[test]
    fn thunk_names_are_deterministic() {
        assert_eq!(interface_call("IERC20", "transfer"), "__icall_IERC20_transfer");
        assert_eq!(interface_trycall("IERC20", "transfer"), "__itrycall_IERC20_transfer");
        assert_eq!(interface_create("Token"), "__icreate_Token");
        assert_eq!(interface_create2("Token"), "__icreate2_Token");
    }
}
