//! Fixed tokens of the target dialect.
//!
//! These must be reproduced bit-for-bit; the calculator's tokenizer maps
//! each of them to a single opcode.

/// Store arrow: `<value>→<address>`.
pub const ASSIGN: &str = "→";
/// Memory bank list (`⌊RAM(n)`).
pub const RAM: &str = "⌊RAM";
/// Heap data list (`⌊DAT(i)`).
pub const DAT: &str = "⌊DAT";
/// Heap block-address table (`⌊ADR(handle)`).
pub const ADR: &str = "⌊ADR";

/// Prefix of an external program invocation.
pub const PROGRAM: &str = "prgm";

/// Block closing line for `If`, `While` and `For`.
pub const END: &str = "End";
pub const ELSE: &str = "Else";

/// External allocator routines.
pub const ALLOC_STRUCT: &str = "HNALLOC";
pub const ALLOC_VECTOR: &str = "HNALLVEC";
pub const HEAP_INIT: &str = "HNINIT";
pub const HEAP_DEFRAG: &str = "HNDEFRAG";

/// Prefix of string slot names (`Chn0`..`Chn9`).
pub const STRING_SLOT: &str = "Chn";
