//! Builtin type kinds, cv-qualifiers, and qualified types.

use crate::entity::EntityId;
use std::cmp::Ordering;

macro_rules! builtin_kinds {
    ($(($variant:ident, $name:literal)),* $(,)?) => {
        /// Kind of a builtin type. Each kind is a singleton within a code model.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum BuiltinKind {
            $($variant),*
        }

        impl BuiltinKind {
            /// All builtin kinds, in declaration order.
            pub const ALL: &'static [BuiltinKind] = &[$(BuiltinKind::$variant),*];

            /// Printable name of the builtin type.
            pub fn name(self) -> &'static str {
                match self {
                    $(BuiltinKind::$variant => $name),*
                }
            }
        }
    };
}

builtin_kinds! {
    (Void, "void"),
    (Bool, "bool"),
    (Char, "char"),
    (Short, "short"),
    (Int, "int"),
    (Long, "long"),
    (LongLong, "long long"),
    (Int128, "int128"),
    (SignedChar, "signed char"),
    (UnsignedChar, "unsigned char"),
    (UnsignedShort, "unsigned short"),
    (UnsignedInt, "unsigned int"),
    (UnsignedLong, "unsigned long"),
    (UnsignedLongLong, "unsigned long long"),
    (Uint128, "uint128"),
    (Float, "float"),
    (Double, "double"),
    (LongDouble, "long double"),
    (WCharT, "wchar_t"),
    (Char8T, "char8_t"),
    (Char16T, "char16_t"),
    (Char32T, "char32_t"),
    (NullptrT, "nullptr_t"),
    (ComplexChar, "char complex"),
    (ComplexShort, "short complex"),
    (ComplexInt, "int complex"),
    (ComplexLong, "long complex"),
    (ComplexLongLong, "long long complex"),
    (ComplexUnsignedChar, "unsigned char complex"),
    (ComplexUnsignedShort, "unsigned short complex"),
    (ComplexUnsignedInt, "unsigned int complex"),
    (ComplexUnsignedLong, "unsigned long complex"),
    (ComplexUnsignedLongLong, "unsigned long long complex"),
    (ComplexFloat, "float complex"),
    (ComplexDouble, "double complex"),
    (ComplexLongDouble, "long double complex"),
    (ArmSveInt8x1, "svint8x1"),
    (ArmSveInt8x2, "svint8x2"),
    (ArmSveInt8x3, "svint8x3"),
    (ArmSveInt8x4, "svint8x4"),
    (ArmSveInt16x1, "svint16x1"),
    (ArmSveInt16x2, "svint16x2"),
    (ArmSveInt16x3, "svint16x3"),
    (ArmSveInt16x4, "svint16x4"),
    (ArmSveInt32x1, "svint32x1"),
    (ArmSveInt32x2, "svint32x2"),
    (ArmSveInt32x3, "svint32x3"),
    (ArmSveInt32x4, "svint32x4"),
    (ArmSveInt64x1, "svint64x1"),
    (ArmSveInt64x2, "svint64x2"),
    (ArmSveInt64x3, "svint64x3"),
    (ArmSveInt64x4, "svint64x4"),
    (ArmSveUint8x1, "svuint8x1"),
    (ArmSveUint8x2, "svuint8x2"),
    (ArmSveUint8x3, "svuint8x3"),
    (ArmSveUint8x4, "svuint8x4"),
    (ArmSveUint16x1, "svuint16x1"),
    (ArmSveUint16x2, "svuint16x2"),
    (ArmSveUint16x3, "svuint16x3"),
    (ArmSveUint16x4, "svuint16x4"),
    (ArmSveUint32x1, "svuint32x1"),
    (ArmSveUint32x2, "svuint32x2"),
    (ArmSveUint32x3, "svuint32x3"),
    (ArmSveUint32x4, "svuint32x4"),
    (ArmSveUint64x1, "svuint64x1"),
    (ArmSveUint64x2, "svuint64x2"),
    (ArmSveUint64x3, "svuint64x3"),
    (ArmSveUint64x4, "svuint64x4"),
    (ArmSveFloat16x1, "svfloat16x1"),
    (ArmSveFloat16x2, "svfloat16x2"),
    (ArmSveFloat16x3, "svfloat16x3"),
    (ArmSveFloat16x4, "svfloat16x4"),
    (ArmSveFloat32x1, "svfloat32x1"),
    (ArmSveFloat32x2, "svfloat32x2"),
    (ArmSveFloat32x3, "svfloat32x3"),
    (ArmSveFloat32x4, "svfloat32x4"),
    (ArmSveFloat64x1, "svfloat64x1"),
    (ArmSveFloat64x2, "svfloat64x2"),
    (ArmSveFloat64x3, "svfloat64x3"),
    (ArmSveFloat64x4, "svfloat64x4"),
    (ArmSveBfloat16x1, "svbfloat16x1"),
    (ArmSveBfloat16x2, "svbfloat16x2"),
    (ArmSveBfloat16x3, "svbfloat16x3"),
    (ArmSveBfloat16x4, "svbfloat16x4"),
    (ArmSveBoolx1, "svboolx1"),
    (ArmSveBoolx2, "svboolx2"),
    (ArmSveBoolx4, "svboolx4"),
    (ArmSveCount, "svcount"),
}

impl BuiltinKind {
    /// Returns true for the integral kinds that may carry a bitfield width.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            BuiltinKind::Bool
                | BuiltinKind::Char
                | BuiltinKind::Short
                | BuiltinKind::Int
                | BuiltinKind::Long
                | BuiltinKind::LongLong
                | BuiltinKind::SignedChar
                | BuiltinKind::UnsignedChar
                | BuiltinKind::UnsignedShort
                | BuiltinKind::UnsignedInt
                | BuiltinKind::UnsignedLong
                | BuiltinKind::UnsignedLongLong
                | BuiltinKind::WCharT
                | BuiltinKind::Char16T
                | BuiltinKind::Char32T
        )
    }
}

bitflags::bitflags! {
    /// Const/volatile qualifier set of a qualified type.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Quals: u8 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
    }
}

/// A type together with its cv-qualifiers.
///
/// Held by value and registered as a use by its holder; it is not an entity
/// itself. Equality and hashing cover the type and both qualifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QualType {
    pub ty: EntityId,
    pub quals: Quals,
}

impl QualType {
    pub fn new(ty: EntityId, quals: Quals) -> Self {
        Self { ty, quals }
    }

    /// Unqualified form of a type.
    pub fn unqual(ty: EntityId) -> Self {
        Self {
            ty,
            quals: Quals::empty(),
        }
    }

    pub fn is_const(&self) -> bool {
        self.quals.contains(Quals::CONST)
    }

    pub fn is_volatile(&self) -> bool {
        self.quals.contains(Quals::VOLATILE)
    }

    pub fn with_const(mut self) -> Self {
        self.quals |= Quals::CONST;
        self
    }

    pub fn with_volatile(mut self) -> Self {
        self.quals |= Quals::VOLATILE;
        self
    }

    /// Returns this qualified type with the pointee replaced when it equals
    /// `src`, keeping the qualifiers.
    pub fn replaced(self, src: EntityId, dst: EntityId) -> Self {
        if self.ty == src {
            Self {
                ty: dst,
                quals: self.quals,
            }
        } else {
            self
        }
    }
}

impl From<EntityId> for QualType {
    fn from(ty: EntityId) -> Self {
        QualType::unqual(ty)
    }
}

// Total order used for map keys: const before non-const, then volatile
// before non-volatile, then id order.
impl Ord for QualType {
    fn cmp(&self, other: &Self) -> Ordering {
        (!self.is_const())
            .cmp(&!other.is_const())
            .then((!self.is_volatile()).cmp(&!other.is_volatile()))
            .then(self.ty.cmp(&other.ty))
    }
}

impl PartialOrd for QualType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Structural interning key of a function type: the qualified return type
/// plus the ordered list of qualified parameter types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FuncTypeKey {
    pub ret: QualType,
    pub params: Vec<QualType>,
}

/// One enumerator of an enum type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumItem {
    pub name: String,
    pub value: i64,
}

/// Payload of an enum type.
#[derive(Debug)]
pub struct EnumData {
    pub(crate) underlying: EntityId,
    pub(crate) items: Vec<EnumItem>,
}

impl EnumData {
    /// Underlying builtin type of the enum.
    pub fn underlying(&self) -> EntityId {
        self.underlying
    }

    pub fn items(&self) -> &[EnumItem] {
        &self.items
    }
}
