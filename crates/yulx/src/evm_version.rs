//! Hard-fork name table (§6).
//!
//! `EVM_VERSION` in source resolves to the active fork's ordinal; `evm`
//! pragmas record a minimum ordinal that later intrinsics (`mcopy`, `log2`,
//! the `@if gt(EVM_VERSION, ...)` preprocessor idiom) compare against.

use strum::{Display, EnumString, IntoStaticStr};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "camelCase")]
pub enum HardFork {
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    Cancun,
}

impl HardFork {
    /// The ordinal embedded in source as `EVM_VERSION`.
    #[must_use]
    pub const fn ordinal(self) -> i64 {
        match self {
            Self::Homestead => 201_603,
            Self::TangerineWhistle => 201_610,
            Self::SpuriousDragon => 201_611,
            Self::Byzantium => 201_710,
            Self::Constantinople => 201_902,
            Self::Petersburg => 201_903,
            Self::Istanbul => 201_912,
            Self::Berlin => 202_104,
            Self::London => 202_108,
            Self::Paris => 202_209,
            Self::Shanghai => 202_304,
            Self::Cancun => 300_000,
        }
    }

    /// Parses a pragma/config hard-fork name, e.g. `evm "cancun"`.
    pub fn parse(name: &str) -> Result<Self, Error> {
        name.parse::<Self>()
            .map_err(|_| Error::ty(format!("unknown hard fork name '{name}'"), None))
    }

    /// `mcopy` and `log2` (per §4.4) are native from Cancun onward.
    #[must_use]
    pub fn has_mcopy(self) -> bool {
        self >= Self::Cancun
    }
}

impl Default for HardFork {
    fn default() -> Self {
        Self::Cancun
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_are_strictly_increasing() {
        let forks = [
            HardFork::Homestead,
            HardFork::TangerineWhistle,
            HardFork::SpuriousDragon,
            HardFork::Byzantium,
            HardFork::Constantinople,
            HardFork::Petersburg,
            HardFork::Istanbul,
            HardFork::Berlin,
            HardFork::London,
            HardFork::Paris,
            HardFork::Shanghai,
            HardFork::Cancun,
        ];
        for pair in forks.windows(2) {
            assert!(pair[0].ordinal() < pair[1].ordinal());
        }
    }

    #[test]
    fn parses_camel_case_names() {
        assert_eq!(HardFork::parse("cancun").unwrap(), HardFork::Cancun);
        assert_eq!(HardFork::parse("tangerineWhistle").unwrap(), HardFork::TangerineWhistle);
        assert!(HardFork::parse("nonsense").is_err());
    }

    #[test]
    fn mcopy_available_from_cancun() {
        assert!(!HardFork::Shanghai.has_mcopy());
        assert!(HardFork::Cancun.has_mcopy());
    }
}
