//! Struct bit-packing into a single 256-bit word (§5). Members are packed
//! MSB-first in declaration order; a member named `+` is padding and
//! consumes bits without binding a name. Packing fails if the total exceeds
//! 256 bits.

use crate::{
    ast::{AbiType, StructDefinition, StructMember},
    error::{Error, Result},
};

/// One packed member's position within the struct's word: `shift` is the
/// number of bits from the word's LSB to this member's low bit, and `width`
/// is its bit width.
#[derive(Debug, Clone, Copy)]
pub struct PackedField {
    pub name_index: usize,
    pub ty: AbiType,
    pub shift: u16,
    pub width: u16,
}

#[derive(Debug, Clone)]
pub struct PackedLayout {
    pub fields: Vec<PackedField>,
    pub total_bits: u16,
}

/// Computes each member's shift/width, packing MSB-first: the first
/// declared member occupies the highest bits of the word.
pub fn pack_struct(def: &StructDefinition) -> Result<PackedLayout> {
    let widths: Vec<u16> = def.members.iter().map(StructMember::bit_width_of).collect();
    let total: u32 = widths.iter().map(|w| u32::from(*w)).sum();
    if total > 256 {
        return Err(Error::ty(
            format!("struct '{}' packs {total} bits, exceeding the 256-bit word", def.name),
            Some(def.at.clone()),
        ));
    }
    let mut fields = Vec::with_capacity(def.members.len());
    let mut consumed: u32 = 0;
    for (idx, member) in def.members.iter().enumerate() {
        let width = widths[idx];
        let shift_from_top = consumed;
        consumed += u32::from(width);
        let shift = u16::try_from(256u32 - shift_from_top - u32::from(width)).unwrap_or(0);
        fields.push(PackedField {
            name_index: idx,
            ty: member.ty,
            shift,
            width,
        });
    }
    Ok(PackedLayout {
        fields,
        total_bits: u16::try_from(total).unwrap_or(256),
    })
}

impl StructMember {
    fn bit_width_of(&self) -> u16 {
        self.ty.bit_width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::AbiBase, error::SourceSpan};

    fn def(members: Vec<(&str, AbiType)>) -> StructDefinition {
        StructDefinition {
            name: "S".to_owned(),
            members: members
                .into_iter()
                .map(|(name, ty)| StructMember {
                    ty,
                    name: name.to_owned(),
                    default: None,
                })
                .collect(),
            at: SourceSpan::new("t.yulx", 1, 1),
        }
    }

    #[test]
    fn packs_msb_first() {
        let d = def(vec![
            ("a", AbiType::new(AbiBase::Uint, 128, false)),
            ("b", AbiType::new(AbiBase::Uint, 128, false)),
        ]);
        let layout = pack_struct(&d).unwrap();
        assert_eq!(layout.fields[0].shift, 128);
        assert_eq!(layout.fields[1].shift, 0);
        assert_eq!(layout.total_bits, 256);
    }

    #[test]
    fn padding_member_consumes_bits_without_a_name() {
        let d = def(vec![
            ("a", AbiType::new(AbiBase::Uint, 8, false)),
            ("+", AbiType::new(AbiBase::Uint, 248, false)),
        ]);
        let layout = pack_struct(&d).unwrap();
        assert_eq!(layout.fields[1].shift, 0);
        assert!(d.members[1].is_padding());
    }

    #[test]
    fn overflowing_struct_is_rejected() {
        let d = def(vec![
            ("a", AbiType::new(AbiBase::Uint, 200, false)),
            ("b", AbiType::new(AbiBase::Uint, 200, false)),
        ]);
        assert!(pack_struct(&d).is_err());
    }
}
