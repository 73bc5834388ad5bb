//! calcgen code generator: an embedded construction API that lowers
//! expressions, variables and structured control flow into line-oriented
//! calculator programs.
//!
//! # Architecture
//!
//! Everything hangs off a [`Session`], which owns three slot spaces and the
//! output buffer:
//!
//! - letter registers `A`..`Z`
//! - memory-bank scalars `⌊RAM(1)`..`⌊RAM(999)`
//! - string slots `Chn0`..`Chn9`
//!
//! Handles ([`Register`], [`Bank`], [`StrVar`], [`Struct`], [`Vector`],
//! [`Array`]) borrow the session, take their slots on construction and
//! give them back when dropped. Control-flow guards ([`Block`],
//! [`ForLoop`]) emit `End` when dropped, so target blocks nest exactly like
//! Rust scopes.
//!
//! Expressions are built with the sugar functions in [`expr`] and
//! canonicalized by [`Session::num_val`] on their way into a line.
//!
//! ## Heap
//!
//! Structs and vectors are allocated by helper programs on the target
//! (`prgmHNALLOC`, `prgmHNALLVEC`). A block handle indexes the `⌊ADR`
//! table; cells are reached through `⌊DAT`.

pub mod buffer;
pub mod expr;
pub mod flow;
pub mod memory;
pub mod planner;
pub mod session;
pub mod var;

pub use calcgen_types::{
    Dialect, ErrorCategory, ErrorCode, GenConfig, GenError, GenResult, LineSeparator, RefTag,
    RefType,
};
pub use expr::{canonical, num_val, Expr};
pub use flow::{Block, Counter, ForLoop};
pub use memory::{Array, Deref, HeapCell, Struct, StructMember, Vector};
pub use planner::SlotPlanner;
pub use session::{Listing, Session, SlotKind};
pub use var::{Bank, Const, Raw, Readable, Register, StrConst, StrVar, StringValue, Variable};
