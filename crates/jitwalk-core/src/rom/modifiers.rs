//! Method record modifier bits.
//!
//! The low bits are the Java access flags from the class file; the high bits
//! are runtime-private flags that announce which optional sections follow the
//! bytecodes.

use bitflags::bitflags;

bitflags! {
    /// Modifier word of a method record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodModifiers: u32 {
        const PUBLIC = 0x0000_0001;
        const PRIVATE = 0x0000_0002;
        const PROTECTED = 0x0000_0004;
        const STATIC = 0x0000_0008;
        const FINAL = 0x0000_0010;
        const SYNCHRONIZED = 0x0000_0020;
        const BRIDGE = 0x0000_0040;
        const VARARGS = 0x0000_0080;
        const NATIVE = 0x0000_0100;
        const ABSTRACT = 0x0000_0400;
        const STRICT = 0x0000_0800;
        const SYNTHETIC = 0x0000_1000;
        /// Exception handler / throws table follows the generic signature
        const HAS_EXCEPTION_INFO = 0x0002_0000;
        /// Debug info (line numbers, local variables) follows the annotations
        const HAS_DEBUG_INFO = 0x0004_0000;
        const HAS_BACKWARD_BRANCHES = 0x0020_0000;
        const HAS_METHOD_PARAMETERS = 0x0080_0000;
        /// A generic signature pointer follows the extended modifiers
        const HAS_GENERIC_SIGNATURE = 0x0200_0000;
        /// An extended modifier word directly follows the bytecodes
        const HAS_EXTENDED_MODIFIERS = 0x0400_0000;
        const HAS_STACK_MAP = 0x1000_0000;
        const HAS_METHOD_ANNOTATIONS = 0x2000_0000;
        const HAS_PARAMETER_ANNOTATIONS = 0x4000_0000;
        const HAS_DEFAULT_ANNOTATION = 0x8000_0000;
    }
}

bitflags! {
    /// Extended modifier word (zero when the method has none)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExtendedModifiers: u32 {
        const HAS_METHOD_TYPE_ANNOTATIONS = 0x01;
        const HAS_CODE_TYPE_ANNOTATIONS = 0x02;
        const HAS_SCOPED_ANNOTATION = 0x04;
    }
}

impl MethodModifiers
{
    /// Interpret a raw modifier word, keeping unknown bits out.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self
    {
        Self::from_bits_truncate(raw)
    }

    /// Java-style access keywords (`public static final ...`).
    pub fn access_keywords(self) -> Vec<&'static str>
    {
        [
            (Self::PUBLIC, "public"),
            (Self::PRIVATE, "private"),
            (Self::PROTECTED, "protected"),
            (Self::STATIC, "static"),
            (Self::FINAL, "final"),
            (Self::SYNCHRONIZED, "synchronized"),
            (Self::NATIVE, "native"),
            (Self::ABSTRACT, "abstract"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, keyword)| keyword)
        .collect()
    }
}
