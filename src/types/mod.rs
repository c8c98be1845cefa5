// Element Types: static value-type tags carried by tensor descriptors
//
// The `Dynamic` variant is a placeholder for an element type that is not
// known yet; it unifies with every other type during inference.

use std::collections::HashMap;
use std::fmt;

lazy_static::lazy_static! {
    /// Name lookup for every element type, used by name-based dispatch
    static ref TYPES_BY_NAME: HashMap<&'static str, ElementType> = ElementType::ALL
        .iter()
        .map(|ty| (ty.name(), *ty))
        .collect();
}

/// Element type of a tensor value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    /// Not yet known
    Dynamic,
    /// Boolean
    Boolean,
    /// bfloat16
    Bf16,
    /// IEEE half precision
    F16,
    /// IEEE single precision
    F32,
    /// IEEE double precision
    F64,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
}

impl ElementType {
    /// Every element type, in declaration order
    pub const ALL: [ElementType; 14] = [
        ElementType::Dynamic,
        ElementType::Boolean,
        ElementType::Bf16,
        ElementType::F16,
        ElementType::F32,
        ElementType::F64,
        ElementType::I8,
        ElementType::I16,
        ElementType::I32,
        ElementType::I64,
        ElementType::U8,
        ElementType::U16,
        ElementType::U32,
        ElementType::U64,
    ];

    /// Look up an element type by its printed name
    pub fn from_name(name: &str) -> Option<Self> {
        TYPES_BY_NAME.get(name).copied()
    }

    /// Printed name, e.g. `boolean`, `f32`, `i64`; `?` for dynamic
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Dynamic => "?",
            ElementType::Boolean => "boolean",
            ElementType::Bf16 => "bf16",
            ElementType::F16 => "f16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
            ElementType::U64 => "u64",
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ElementType::Dynamic)
    }

    pub fn is_static(&self) -> bool {
        !self.is_dynamic()
    }

    /// Check if this is a floating-point type
    pub fn is_real(&self) -> bool {
        matches!(
            self,
            ElementType::Bf16 | ElementType::F16 | ElementType::F32 | ElementType::F64
        )
    }

    /// Check if this is an integer type
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            ElementType::I8
                | ElementType::I16
                | ElementType::I32
                | ElementType::I64
                | ElementType::U8
                | ElementType::U16
                | ElementType::U32
                | ElementType::U64
        )
    }

    pub fn is_signed(&self) -> bool {
        self.is_real()
            || matches!(
                self,
                ElementType::I8 | ElementType::I16 | ElementType::I32 | ElementType::I64
            )
    }

    /// Width in bits; 0 for dynamic
    pub fn bitwidth(&self) -> usize {
        match self {
            ElementType::Dynamic => 0,
            ElementType::Boolean | ElementType::I8 | ElementType::U8 => 8,
            ElementType::Bf16 | ElementType::F16 | ElementType::I16 | ElementType::U16 => 16,
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 32,
            ElementType::F64 | ElementType::I64 | ElementType::U64 => 64,
        }
    }

    /// Storage size of one element in bytes; 0 for dynamic
    pub fn size(&self) -> usize {
        self.bitwidth() / 8
    }

    /// Unify two element types.
    ///
    /// `Dynamic` merges with anything and yields the other side. Two static
    /// types merge only when they are equal.
    pub fn merge(a: ElementType, b: ElementType) -> Option<ElementType> {
        match (a, b) {
            (ElementType::Dynamic, other) | (other, ElementType::Dynamic) => Some(other),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }

    /// True if `merge(self, other)` would succeed
    pub fn compatible(&self, other: &ElementType) -> bool {
        ElementType::merge(*self, *other).is_some()
    }
}

impl Default for ElementType {
    fn default() -> Self {
        ElementType::Dynamic
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_registry() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(ElementType::from_name("bool"), None);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(ElementType::Boolean.size(), 1);
        assert_eq!(ElementType::Bf16.size(), 2);
        assert_eq!(ElementType::I32.size(), 4);
        assert_eq!(ElementType::F64.size(), 8);
        assert_eq!(ElementType::Dynamic.size(), 0);
    }

    #[test]
    fn test_predicates() {
        assert!(ElementType::F32.is_real());
        assert!(!ElementType::I32.is_real());
        assert!(ElementType::U16.is_integral());
        assert!(!ElementType::U16.is_signed());
        assert!(ElementType::I16.is_signed());
        assert!(!ElementType::Boolean.is_integral());
        assert!(ElementType::Dynamic.is_dynamic());
    }

    #[test]
    fn test_merge() {
        use ElementType::*;
        assert_eq!(ElementType::merge(Dynamic, F32), Some(F32));
        assert_eq!(ElementType::merge(I8, Dynamic), Some(I8));
        assert_eq!(ElementType::merge(Dynamic, Dynamic), Some(Dynamic));
        assert_eq!(ElementType::merge(Boolean, Boolean), Some(Boolean));
        assert_eq!(ElementType::merge(F32, F64), None);
        assert!(!Boolean.compatible(&I32));
    }
}
