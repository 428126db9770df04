//! ABI type grammar and literal value handling (§3 numeric invariants).

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::{Error, SourceSpan};

/// Base ABI type vocabulary (§3 `ABIType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AbiBase {
    Uint,
    Int,
    Address,
    Bool,
    Bytes,
    Function,
}

/// A fully parsed ABI type: base, bit width, and array-ness.
///
/// `width` is in bits; for `address`/`bool`/`function` it is fixed by the
/// base and stored for uniform layout math. `bytes` without an explicit
/// width means the dynamic `bytes` type (width == 0 is the dynamic sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AbiType {
    pub base: AbiBase,
    pub width: u16,
    pub is_array: bool,
}

impl AbiType {
    #[must_use]
    pub const fn new(base: AbiBase, width: u16, is_array: bool) -> Self {
        Self { base, width, is_array }
    }

    #[must_use]
    pub const fn uint256() -> Self {
        Self::new(AbiBase::Uint, 256, false)
    }

    /// Whether this type occupies a single fixed 32-byte slot (no offset
    /// indirection). Dynamic `bytes`/arrays are not word-fixed.
    #[must_use]
    pub const fn is_word_fixed(&self) -> bool {
        !self.is_array && !matches!((self.base, self.width), (AbiBase::Bytes, 0))
    }

    /// Canonical Solidity-ABI type name used in selector/topic preimages
    /// (§6): `uint`→`uint256`, `int`→`int256`, and the array suffix is
    /// appended after the elided base has been expanded.
    #[must_use]
    pub fn canonical(&self) -> String {
        let base = match self.base {
            AbiBase::Uint => format!("uint{}", if self.width == 0 { 256 } else { self.width }),
            AbiBase::Int => format!("int{}", if self.width == 0 { 256 } else { self.width }),
            AbiBase::Address => "address".to_owned(),
            AbiBase::Bool => "bool".to_owned(),
            AbiBase::Bytes => {
                if self.width == 0 {
                    "bytes".to_owned()
                } else {
                    format!("bytes{}", self.width / 8)
                }
            }
            AbiBase::Function => "function".to_owned(),
        };
        if self.is_array { format!("{base}[]") } else { base }
    }

    /// Bit width occupied in a packed struct / single calldata word.
    #[must_use]
    pub fn bit_width(&self) -> u16 {
        match self.base {
            AbiBase::Address => 160,
            AbiBase::Bool => 8,
            AbiBase::Function => 192,
            AbiBase::Bytes if self.width == 0 => 256,
            _ => {
                if self.width == 0 {
                    256
                } else {
                    self.width
                }
            }
        }
    }
}

/// Literal subtype (§3 `Literal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LiteralKind {
    HexNumber,
    DecimalNumber,
    StringLiteral,
    HexLiteral,
    BoolLiteral,
}

/// Optional literal unit suffix (`wei`, `gwei`, `ether`, `seconds`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LiteralUnit {
    Wei,
    Gwei,
    Ether,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl LiteralUnit {
    #[must_use]
    pub fn multiplier(self) -> BigUint {
        match self {
            Self::Wei => BigUint::one(),
            Self::Gwei => BigUint::from(1_000_000_000u64),
            Self::Ether => BigUint::from(10u64).pow(18),
            Self::Seconds => BigUint::one(),
            Self::Minutes => BigUint::from(60u64),
            Self::Hours => BigUint::from(3_600u64),
            Self::Days => BigUint::from(86_400u64),
            Self::Weeks => BigUint::from(604_800u64),
        }
    }
}

const WORD_BITS: u32 = 256;

fn two_to_the(bits: u32) -> BigUint {
    BigUint::one() << bits
}

/// A parsed literal value, fully reduced to its 256-bit unsigned domain
/// representation (§3: "negative literals are materialised as the
/// two's-complement of their magnitude modulo 2^256").
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Literal {
    pub kind: LiteralKind,
    pub unit: Option<LiteralUnit>,
    /// Original source text, preserved for faithful re-serialization.
    pub text: String,
    /// The fully reduced 256-bit unsigned value; `None` for string literals,
    /// whose payload lives in `text`.
    pub value: Option<BigUint>,
}

impl Literal {
    pub fn bool_literal(value: bool) -> Self {
        Self {
            kind: LiteralKind::BoolLiteral,
            unit: None,
            text: value.to_string(),
            value: Some(if value { BigUint::one() } else { BigUint::zero() }),
        }
    }

    pub fn number(value: BigUint) -> Self {
        Self {
            kind: LiteralKind::DecimalNumber,
            unit: None,
            text: value.to_string(),
            value: Some(value),
        }
    }

    pub fn string(text: String) -> Self {
        Self {
            kind: LiteralKind::StringLiteral,
            unit: None,
            text,
            value: None,
        }
    }

    /// Parses a decimal literal, rejecting > 77 digits (§3) and applying any
    /// unit multiplier before reducing into the 256-bit domain.
    pub fn parse_decimal(text: &str, unit: Option<LiteralUnit>, at: &SourceSpan) -> Result<Self, Error> {
        let digits: String = text.chars().filter(|c| *c != '_').collect();
        if digits.len() > 77 {
            return Err(Error::ty(
                format!("decimal literal '{text}' has more than 77 digits"),
                Some(at.clone()),
            ));
        }
        let magnitude = digits
            .parse::<BigUint>()
            .map_err(|_| Error::ty(format!("invalid decimal literal '{text}'"), Some(at.clone())))?;
        let scaled = match unit {
            Some(u) => magnitude * u.multiplier(),
            None => magnitude,
        };
        let reduced = &scaled % two_to_the(WORD_BITS);
        Ok(Self {
            kind: LiteralKind::DecimalNumber,
            unit,
            text: text.to_owned(),
            value: Some(reduced),
        })
    }

    /// Parses a hex literal (`0x...`). Unlike decimal literals, hex literals
    /// are rejected outright if they exceed the 256-bit domain (§3) rather
    /// than silently wrapping.
    pub fn parse_hex(text: &str, at: &SourceSpan) -> Result<Self, Error> {
        let digits = text.trim_start_matches("0x").trim_start_matches("0X");
        if digits.len() > 64 {
            return Err(Error::ty(
                format!("hex literal '{text}' exceeds the 256-bit domain"),
                Some(at.clone()),
            ));
        }
        let value = BigUint::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| Error::ty(format!("invalid hex literal '{text}'"), Some(at.clone())))?;
        Ok(Self {
            kind: LiteralKind::HexNumber,
            unit: None,
            text: text.to_owned(),
            value: Some(value),
        })
    }

    /// Applies unary negation, producing the two's-complement
    /// representation modulo 2^256 (§3).
    #[must_use]
    pub fn negate(mut self) -> Self {
        if let Some(v) = self.value.take() {
            let modulus = two_to_the(WORD_BITS);
            let negated = if v.is_zero() { v } else { &modulus - (v % &modulus) };
            self.value = Some(negated);
            self.text = format!("-{}", self.text);
        }
        self
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(&self.value, Some(v) if v.is_zero())
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_ref().map(|v| !v.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> SourceSpan {
        SourceSpan::new("test.yulx", 1, 1)
    }

    #[test]
    fn decimal_literal_rejects_over_77_digits() {
        let too_long = "1".repeat(78);
        assert!(Literal::parse_decimal(&too_long, None, &span()).is_err());
        let ok = "1".repeat(77);
        assert!(Literal::parse_decimal(&ok, None, &span()).is_ok());
    }

    #[test]
    fn hex_literal_rejects_over_256_bits() {
        let too_long = format!("0x{}", "f".repeat(65));
        assert!(Literal::parse_hex(&too_long, &span()).is_err());
        let ok = format!("0x{}", "f".repeat(64));
        assert!(Literal::parse_hex(&ok, &span()).is_ok());
    }

    #[test]
    fn negate_produces_twos_complement() {
        let one = Literal::parse_decimal("1", None, &span()).unwrap();
        let neg_one = one.negate();
        let expected = (BigUint::one() << WORD_BITS) - BigUint::one();
        assert_eq!(neg_one.value.unwrap(), expected);
    }

    #[test]
    fn ether_unit_scales_value() {
        let lit = Literal::parse_decimal("1", Some(LiteralUnit::Ether), &span()).unwrap();
        assert_eq!(lit.value.unwrap(), BigUint::from(10u64).pow(18));
    }

    #[test]
    fn canonical_type_names_collapse_elided_widths() {
        assert_eq!(AbiType::new(AbiBase::Uint, 0, false).canonical(), "uint256");
        assert_eq!(AbiType::new(AbiBase::Int, 0, true).canonical(), "int256[]");
        assert_eq!(AbiType::new(AbiBase::Bytes, 32 * 8, false).canonical(), "bytes32");
        assert_eq!(AbiType::new(AbiBase::Bytes, 0, false).canonical(), "bytes");
    }
}
