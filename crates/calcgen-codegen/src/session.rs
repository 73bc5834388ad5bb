//! Code-generation session: the allocator context every handle borrows.
//!
//! A [`Session`] owns the three slot planners, the target buffer and the
//! configuration. Handles hold `&Session` and release their slots from
//! `Drop`, so the borrow checker guarantees that no handle outlives the
//! session it was allocated from. Interior mutability is `RefCell`-based:
//! a session is single-threaded by construction.

use std::cell::{Cell, RefCell};
use std::path::Path;

use calcgen_types::{tokens, Dialect, GenConfig, GenError, GenResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::buffer::TargetBuffer;
use crate::expr::{self, Expr};
use crate::planner::SlotPlanner;
use crate::var::{Readable, StringValue};

/// Which slot space a handle draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Register,
    Bank,
    String,
}

#[derive(Debug)]
pub struct Session {
    config: GenConfig,
    registers: RefCell<SlotPlanner>,
    bank: RefCell<SlotPlanner>,
    strings: RefCell<SlotPlanner>,
    buffer: RefCell<TargetBuffer>,
    /// Failures observed while releasing slots from `Drop`.
    release_failures: RefCell<Vec<GenError>>,
    /// Control-flow blocks currently open in the target.
    open_blocks: Cell<usize>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(GenConfig::default())
    }
}

impl Session {
    pub fn new(config: GenConfig) -> Self {
        Self {
            registers: RefCell::new(SlotPlanner::registers()),
            bank: RefCell::new(SlotPlanner::bank(config.bank_slots)),
            strings: RefCell::new(SlotPlanner::strings(config.string_slots)),
            buffer: RefCell::new(TargetBuffer::new()),
            release_failures: RefCell::new(Vec::new()),
            open_blocks: Cell::new(0),
            config,
        }
    }

    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    // ── Slots ────────────────────────────────────────────────────────────

    fn planner(&self, kind: SlotKind) -> &RefCell<SlotPlanner> {
        match kind {
            SlotKind::Register => &self.registers,
            SlotKind::Bank => &self.bank,
            SlotKind::String => &self.strings,
        }
    }

    pub fn acquire(&self, kind: SlotKind) -> GenResult<String> {
        let slot = self.planner(kind).borrow_mut().get_allocated()?;
        log::debug!("acquired {kind:?} slot {slot}");
        Ok(slot)
    }

    /// Acquire `n` consecutive slots.
    pub fn acquire_block(&self, kind: SlotKind, n: usize) -> GenResult<Vec<String>> {
        let block = self.planner(kind).borrow_mut().get_allocated_block(n)?;
        log::debug!("acquired {kind:?} block of {n} starting at {:?}", block.first());
        Ok(block)
    }

    pub fn release(&self, kind: SlotKind, slot: &str) -> GenResult<()> {
        self.planner(kind).borrow_mut().free(slot)?;
        log::debug!("released {kind:?} slot {slot}");
        Ok(())
    }

    pub fn is_allocated(&self, kind: SlotKind, slot: &str) -> bool {
        self.planner(kind).borrow().is_allocated(slot)
    }

    pub fn allocated_count(&self, kind: SlotKind) -> usize {
        self.planner(kind).borrow().allocated_count()
    }

    /// Record a release failure that happened where it could not be
    /// returned (inside `Drop`). Surfaced by [`Session::finish`].
    pub(crate) fn record_release_failure(&self, err: GenError) {
        log::warn!("scope-exit release failed: {err}");
        self.release_failures.borrow_mut().push(err);
    }

    // ── Emission ─────────────────────────────────────────────────────────

    /// Emit a pre-formatted line verbatim.
    pub fn emit(&self, line: impl Into<String>) {
        self.buffer.borrow_mut().push_line(line);
    }

    /// True while a `While`, `If` or `For` block is open, i.e. the next
    /// line may run any number of times (including zero).
    pub fn in_block(&self) -> bool {
        self.open_blocks.get() > 0
    }

    pub(crate) fn enter_block(&self) {
        self.open_blocks.set(self.open_blocks.get() + 1);
    }

    pub(crate) fn leave_block(&self) {
        self.open_blocks.set(self.open_blocks.get().saturating_sub(1));
    }

    /// Canonical text of `expr` in this session's dialect.
    pub fn num_val(&self, expr: &Expr) -> GenResult<String> {
        expr::num_val(expr, self.config.dialect)
    }

    /// `<value>→<target>`.
    pub fn assign(&self, value: &Expr, target: &str) -> GenResult<()> {
        let text = self.num_val(value)?;
        self.emit(format!("{text}{}{target}", tokens::ASSIGN));
        Ok(())
    }

    pub fn disp(&self, value: impl Into<Expr>) -> GenResult<()> {
        let text = self.num_val(&value.into())?;
        self.emit(format!("Disp {text}"));
        Ok(())
    }

    pub fn disp_text(&self, text: &impl StringValue) {
        self.emit(format!("Disp {}", text.string_text()));
    }

    pub fn input(&self, prompt: &impl StringValue, target: &impl Readable) -> GenResult<()> {
        let address = target.address()?;
        self.emit(format!("Input {},{address}", prompt.string_text()));
        Ok(())
    }

    /// Raw expression taking the integer part of `value`.
    pub fn int_part(&self, value: impl Into<Expr>) -> GenResult<Expr> {
        let text = self.num_val(&value.into())?;
        Ok(Expr::raw(format!("{}{text})", self.dialect().int_part_open())))
    }

    /// Initialise the external heap.
    pub fn init_mem(&self) {
        self.emit(format!("{}{}", tokens::PROGRAM, tokens::HEAP_INIT));
    }

    /// Compact the external heap. Block addresses stay valid through the
    /// `⌊ADR` table.
    pub fn defrag_mem(&self) {
        self.emit(format!("{}{}", tokens::PROGRAM, tokens::HEAP_DEFRAG));
    }

    // ── Output ───────────────────────────────────────────────────────────

    pub fn lines(&self) -> Vec<String> {
        self.buffer.borrow().lines().to_vec()
    }

    pub fn line_count(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// Materialized program text.
    pub fn output(&self) -> String {
        self.buffer.borrow().render(self.config.line_separator)
    }

    /// Materialized program text, or the first release failure recorded
    /// at scope exit.
    pub fn finish(&self) -> GenResult<String> {
        let failures = self.release_failures.borrow();
        if let Some(first) = failures.first() {
            return Err(GenError::ReleaseFailed {
                count: failures.len(),
                first: Box::new(first.clone()),
            });
        }
        Ok(self.output())
    }

    /// Finish and write the program to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> GenResult<()> {
        let text = self.finish()?;
        std::fs::write(path.as_ref(), text)?;
        log::debug!("wrote program to {}", path.as_ref().display());
        Ok(())
    }

    /// Hex SHA-256 of the materialized program.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.output().as_bytes()))
    }

    /// Structured snapshot for tooling.
    pub fn listing(&self) -> Listing {
        Listing {
            lines: self.lines(),
            separator: self.config.line_separator.as_str().to_string(),
            digest: self.digest(),
        }
    }
}

/// The emitted program with its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub lines: Vec<String>,
    pub separator: String,
    pub digest: String,
}

impl Listing {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(data: &str) -> Option<Self> {
        serde_json::from_str(data).ok()
    }
}
