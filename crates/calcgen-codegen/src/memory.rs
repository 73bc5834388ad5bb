//! Heap-backed handles and program calls.
//!
//! Structures and vectors live on the external heap, managed by helper
//! programs on the target (`prgmHNALLOC`, `prgmHNALLVEC`). A block is
//! reached through its entry in the `⌊ADR` table; cells are read and
//! written through `⌊DAT`. Arrays are contiguous runs of memory-bank
//! slots.

use std::cell::Cell;

use calcgen_types::{tokens, GenError, GenResult, RefTag, RefType};

use crate::expr::{add, canonical, eq, gt, mul, sub, Expr};
use crate::session::{Session, SlotKind};
use crate::var::{Bank, Readable, Register, Variable};

// ══════════════════════════════════════════════════════════════════════════════
// Program calls
// ══════════════════════════════════════════════════════════════════════════════

impl Session {
    /// Call helper program `name`.
    ///
    /// A single argument is emitted as a bare value line; several are
    /// emitted as an open list literal `{a,b,…`. When `ret` is given the
    /// call's result is stored into it.
    pub fn call(&self, name: &str, ret: Option<&dyn Readable>, args: &[Expr]) -> GenResult<()> {
        match args {
            [] => self.call_program(name, ret),
            [single] => {
                let text = self.num_val(single)?;
                let target = ret.map(|r| r.address()).transpose()?;
                self.emit(text);
                self.emit_call(name, target);
                Ok(())
            }
            many => self.call_with_list(name, ret, many),
        }
    }

    /// Like [`Session::call`] but always passes the arguments as a list.
    pub fn call_with_list(
        &self,
        name: &str,
        ret: Option<&dyn Readable>,
        args: &[Expr],
    ) -> GenResult<()> {
        let parts = args
            .iter()
            .map(|a| self.num_val(a))
            .collect::<GenResult<Vec<_>>>()?;
        let target = ret.map(|r| r.address()).transpose()?;
        self.emit(format!("{{{}", parts.join(",")));
        self.emit_call(name, target);
        Ok(())
    }

    fn call_program(&self, name: &str, ret: Option<&dyn Readable>) -> GenResult<()> {
        let target = ret.map(|r| r.address()).transpose()?;
        self.emit_call(name, target);
        Ok(())
    }

    fn emit_call(&self, name: &str, target: Option<String>) {
        log::debug!("call {}{name} -> {target:?}", tokens::PROGRAM);
        self.emit(format!("{}{name}", tokens::PROGRAM));
        if let Some(target) = target {
            self.emit(format!(
                "{}{}{target}",
                self.dialect().last_result(),
                tokens::ASSIGN
            ));
        }
    }
}

fn address_slot(base: &str) -> String {
    format!("{}({base})", tokens::ADR)
}

// ══════════════════════════════════════════════════════════════════════════════
// Heap cells
// ══════════════════════════════════════════════════════════════════════════════

/// Raw heap cell `⌊DAT(<index>)`.
#[derive(Debug)]
pub struct HeapCell<'s> {
    session: &'s Session,
    index: String,
}

impl<'s> HeapCell<'s> {
    pub fn new(session: &'s Session, index: impl Into<String>) -> Self {
        Self {
            session,
            index: index.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }
}

impl Readable for HeapCell<'_> {
    fn value(&self) -> GenResult<String> {
        Ok(format!("{}({})", tokens::DAT, self.index))
    }

    fn address(&self) -> GenResult<String> {
        self.value()
    }
}

impl<'s> Variable<'s> for HeapCell<'s> {
    fn session(&self) -> &'s Session {
        self.session
    }
}

/// One cell of a heap block: `⌊DAT(⌊ADR(<base>)+<index>)`.
#[derive(Debug)]
pub struct StructMember<'s> {
    session: &'s Session,
    base: String,
    index: String,
}

impl<'s> StructMember<'s> {
    pub fn new(session: &'s Session, base: &str, index: impl Into<Expr>) -> GenResult<Self> {
        let index = session.num_val(&index.into())?;
        Ok(Self {
            session,
            base: base.to_string(),
            index,
        })
    }

    /// Heap address of the cell.
    pub fn location(&self) -> String {
        format!("{}+{}", address_slot(&self.base), self.index)
    }

    pub fn expr(&self) -> Expr {
        Expr::var(format!("{}({})", tokens::DAT, self.location()))
    }

    /// New register holding this cell's heap address.
    pub fn reference(&self) -> GenResult<Register<'s>> {
        let reg = Register::tagged(self.session, RefType::owned().pushed(RefTag::StructMember))?;
        reg.set(Expr::raw(self.location()))?;
        Ok(reg)
    }
}

impl Readable for StructMember<'_> {
    fn value(&self) -> GenResult<String> {
        Ok(format!("{}({})", tokens::DAT, self.location()))
    }

    fn address(&self) -> GenResult<String> {
        self.value()
    }
}

impl<'s> Variable<'s> for StructMember<'s> {
    fn session(&self) -> &'s Session {
        self.session
    }
}

impl From<&StructMember<'_>> for Expr {
    fn from(member: &StructMember<'_>) -> Self {
        member.expr()
    }
}

impl From<&HeapCell<'_>> for Expr {
    fn from(cell: &HeapCell<'_>) -> Self {
        Expr::var(format!("{}({})", tokens::DAT, cell.index))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Struct
// ══════════════════════════════════════════════════════════════════════════════

/// Heap-allocated record. The carrier register holds the block handle.
#[derive(Debug)]
pub struct Struct<'s> {
    session: &'s Session,
    carrier: Register<'s>,
    members: Vec<String>,
    owner: bool,
}

impl<'s> Struct<'s> {
    /// Allocate a block holding `members` in order.
    pub fn new(session: &'s Session, members: &[(&str, Expr)]) -> GenResult<Self> {
        let carrier = Register::new(session)?;
        let values: Vec<Expr> = members.iter().map(|(_, v)| v.clone()).collect();
        session.call_with_list(tokens::ALLOC_STRUCT, Some(&carrier), &values)?;
        Ok(Self {
            session,
            carrier,
            members: members.iter().map(|(name, _)| name.to_string()).collect(),
            owner: true,
        })
    }

    /// Non-owning handle on the block whose handle is `base`.
    pub fn view(session: &'s Session, base: impl Into<Expr>, members: &[&str]) -> GenResult<Self> {
        let carrier = Register::with_value(session, base)?;
        Ok(Self {
            session,
            carrier,
            members: members.iter().map(|m| m.to_string()).collect(),
            owner: false,
        })
    }

    pub fn base(&self) -> &str {
        self.carrier.slot()
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub fn member(&self, name: &str) -> GenResult<StructMember<'s>> {
        let index = self
            .members
            .iter()
            .position(|m| m == name)
            .ok_or_else(|| GenError::UnknownMember(name.to_string()))?;
        self.member_at(index)
    }

    /// Member by position; `index` may be computed at run time.
    pub fn member_at(&self, index: impl Into<Expr>) -> GenResult<StructMember<'s>> {
        StructMember::new(self.session, self.carrier.slot(), index)
    }

    /// New bank scalar holding this struct's block handle.
    pub fn reference(&self) -> GenResult<Bank<'s>> {
        Bank::tagged(
            self.session,
            RefType::owned().pushed(RefTag::StructInstance),
            &self.carrier,
        )
    }

    /// New register holding this struct's block handle.
    pub fn register_reference(&self) -> GenResult<Register<'s>> {
        let reg = Register::tagged(
            self.session,
            RefType::owned().pushed(RefTag::StructInstance),
        )?;
        reg.set(&self.carrier)?;
        Ok(reg)
    }

    /// Fresh block with a copy of every member.
    pub fn deep_clone(&self) -> GenResult<Struct<'s>> {
        let zeros: Vec<(&str, Expr)> = self
            .members
            .iter()
            .map(|m| (m.as_str(), Expr::constant(0)))
            .collect();
        let copy = Struct::new(self.session, &zeros)?;
        if !self.members.is_empty() {
            let lp = self
                .session
                .for_loop(None, 0, self.members.len() - 1, None)?;
            copy.member_at(lp.index())?
                .set(&self.member_at(lp.index())?)?;
        }
        Ok(copy)
    }
}

impl Readable for Struct<'_> {
    fn value(&self) -> GenResult<String> {
        Ok(self.carrier.slot().to_string())
    }

    fn address(&self) -> GenResult<String> {
        Err(GenError::NoAddress("struct instance".into()))
    }
}

impl Drop for Struct<'_> {
    fn drop(&mut self) {
        if self.owner {
            self.session.emit(format!(
                "0{}{}",
                tokens::ASSIGN,
                address_slot(self.carrier.slot())
            ));
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Array
// ══════════════════════════════════════════════════════════════════════════════

/// Fixed-length run of consecutive memory-bank slots.
#[derive(Debug)]
pub struct Array<'s> {
    session: &'s Session,
    slots: Vec<String>,
}

impl<'s> Array<'s> {
    /// Allocate `len` slots and zero them with a run-time loop.
    pub fn new(session: &'s Session, len: usize) -> GenResult<Self> {
        let array = Self::allocate(session, len)?;
        array.zero_fill()?;
        Ok(array)
    }

    fn allocate(session: &'s Session, len: usize) -> GenResult<Self> {
        let slots = session.acquire_block(SlotKind::Bank, len)?;
        Ok(Self { session, slots })
    }

    fn zero_fill(&self) -> GenResult<()> {
        let (Some(first), Some(last)) = (self.slots.first(), self.slots.last()) else {
            return Ok(());
        };
        let lp = self.session.for_loop(
            None,
            Expr::constant(first),
            Expr::constant(last),
            None,
        )?;
        let cell = Bank::view(self.session, lp.counter().slot(), RefType::owned());
        cell.set(0)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// First slot of the run.
    pub fn base(&self) -> Option<&str> {
        self.slots.first().map(String::as_str)
    }

    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    /// Element view at `base + index`. The view never frees anything.
    pub fn get(&self, index: impl Into<Expr>) -> GenResult<Bank<'s>> {
        let base = self
            .base()
            .ok_or_else(|| GenError::NoValue("empty array".into()))?;
        let address = self
            .session
            .num_val(&add(Expr::constant(base), index))?;
        Ok(Bank::view(self.session, address, RefType::owned()))
    }

    /// Fresh run with every element copied.
    pub fn deep_clone(&self) -> GenResult<Array<'s>> {
        let copy = Self::allocate(self.session, self.len())?;
        if !self.is_empty() {
            let lp = self.session.for_loop(None, 0, self.len() - 1, None)?;
            copy.get(lp.index())?.set(&self.get(lp.index())?)?;
        }
        Ok(copy)
    }
}

impl Readable for Array<'_> {
    fn value(&self) -> GenResult<String> {
        Err(GenError::NoValue("array".into()))
    }

    fn address(&self) -> GenResult<String> {
        self.base()
            .map(str::to_string)
            .ok_or_else(|| GenError::NoAddress("empty array".into()))
    }
}

impl Drop for Array<'_> {
    fn drop(&mut self) {
        for slot in &self.slots {
            if let Err(err) = self.session.release(SlotKind::Bank, slot) {
                self.session.record_release_failure(err);
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Vector
// ══════════════════════════════════════════════════════════════════════════════

/// Growable heap sequence.
///
/// `head` (next free index) and `cap` (block size) are run-time bank
/// scalars. Outside any open block the generator also knows both values
/// and decides growth while emitting; inside a block, or once that
/// knowledge is lost, the decision is emitted as a run-time `If`.
#[derive(Debug)]
pub struct Vector<'s> {
    session: &'s Session,
    carrier: Register<'s>,
    head: Bank<'s>,
    cap: Bank<'s>,
    known_len: Cell<Option<usize>>,
    known_capacity: Cell<Option<usize>>,
}

impl<'s> Vector<'s> {
    pub fn new(session: &'s Session, capacity: usize) -> GenResult<Self> {
        let vector = Self::allocate(session, Expr::from(capacity))?;
        vector.known_capacity.set(Some(capacity));
        Ok(vector)
    }

    fn allocate(session: &'s Session, capacity: Expr) -> GenResult<Self> {
        let carrier = Register::new(session)?;
        session.call(tokens::ALLOC_VECTOR, Some(&carrier), &[capacity.clone()])?;
        let head = Bank::new(session)?;
        let cap = Bank::with_value(session, capacity)?;
        let known_len = (!session.in_block()).then_some(0);
        Ok(Self {
            session,
            carrier,
            head,
            cap,
            known_len: Cell::new(known_len),
            known_capacity: Cell::new(None),
        })
    }

    pub fn base(&self) -> &str {
        self.carrier.slot()
    }

    pub fn head(&self) -> &Bank<'s> {
        &self.head
    }

    /// Run-time capacity scalar.
    pub fn capacity(&self) -> &Bank<'s> {
        &self.cap
    }

    /// Length as known while generating; `None` once a push or pop was
    /// emitted inside a block.
    pub fn known_len(&self) -> Option<usize> {
        self.known_len.get()
    }

    pub fn known_capacity(&self) -> Option<usize> {
        self.known_capacity.get()
    }

    /// Element at `index`, no bounds check.
    pub fn at(&self, index: impl Into<Expr>) -> GenResult<StructMember<'s>> {
        StructMember::new(self.session, self.carrier.slot(), index)
    }

    /// `(len, capacity)` when both are known and the next line runs once.
    fn known(&self) -> Option<(usize, usize)> {
        if self.session.in_block() {
            return None;
        }
        Some((self.known_len.get()?, self.known_capacity.get()?))
    }

    fn forget(&self) {
        self.known_len.set(None);
        self.known_capacity.set(None);
    }

    pub fn push(&self, value: impl Into<Expr>) -> GenResult<()> {
        let value = value.into();
        let known = self.known();
        match known {
            Some((len, capacity)) if len == capacity => self.expand(grown(capacity))?,
            Some(_) => {}
            None => {
                let _full = self.session.if_then(eq(&self.head, &self.cap))?;
                let size = add(self.session.int_part(mul(&self.cap, 1.1))?, 1);
                self.expand(size)?;
            }
        }
        self.at(&self.head)?.set(value)?;
        self.head.increment()?;
        match known {
            Some((len, _)) => self.known_len.set(Some(len + 1)),
            None => self.forget(),
        }
        Ok(())
    }

    /// Remove the last element into a fresh bank scalar.
    ///
    /// When the length is not known while generating, the read is guarded
    /// by `If head>0` and the scalar keeps 0 for an empty vector.
    pub fn pop(&self) -> GenResult<Bank<'s>> {
        if let Some((len, _)) = self.known() {
            if len == 0 {
                return Err(GenError::Underflow);
            }
            let out = Bank::with_value(self.session, &self.at(sub(&self.head, 1))?)?;
            self.head.decrement()?;
            self.known_len.set(Some(len - 1));
            return Ok(out);
        }
        let out = Bank::new(self.session)?;
        {
            let _nonempty = self.session.if_then(gt(&self.head, 0))?;
            out.set(&self.at(sub(&self.head, 1))?)?;
            self.head.decrement()?;
        }
        self.forget();
        Ok(out)
    }

    /// Reallocate with room for `new_capacity` elements, copying the live
    /// prefix and freeing the old block.
    pub fn expand(&self, new_capacity: impl Into<Expr>) -> GenResult<()> {
        let new_capacity = canonical(&new_capacity.into())?;
        log::debug!(
            "vector {} grows {:?} -> {}",
            self.carrier.slot(),
            self.known_capacity.get(),
            new_capacity.render(self.session.dialect())
        );
        let old = Register::with_value(self.session, &self.carrier)?;
        self.session.call(
            tokens::ALLOC_VECTOR,
            Some(&self.carrier),
            &[new_capacity.clone()],
        )?;
        {
            let lp = self.session.for_loop(None, 0, sub(&self.head, 1), None)?;
            let from = StructMember::new(self.session, old.slot(), lp.index())?;
            self.at(lp.index())?.set(&from)?;
        }
        self.session
            .emit(format!("0{}{}", tokens::ASSIGN, address_slot(old.slot())));
        self.cap.set(&new_capacity)?;
        let known = match new_capacity.const_value() {
            Some(c) if !self.session.in_block() && c >= 0.0 && c.fract() == 0.0 => {
                Some(c as usize)
            }
            _ => None,
        };
        self.known_capacity.set(known);
        Ok(())
    }

    pub fn deep_clone(&self) -> GenResult<Vector<'s>> {
        let copy = Vector::allocate(self.session, self.cap.expr())?;
        {
            let lp = self.session.for_loop(None, 0, sub(&self.head, 1), None)?;
            copy.at(lp.index())?.set(&self.at(lp.index())?)?;
        }
        copy.head.set(&self.head)?;
        match self.known() {
            Some((len, capacity)) => {
                copy.known_len.set(Some(len));
                copy.known_capacity.set(Some(capacity));
            }
            None => copy.forget(),
        }
        Ok(copy)
    }
}

fn grown(capacity: usize) -> usize {
    capacity * 11 / 10 + 1
}

impl Readable for Vector<'_> {
    fn value(&self) -> GenResult<String> {
        Ok(self.carrier.slot().to_string())
    }

    fn address(&self) -> GenResult<String> {
        Err(GenError::NoAddress("vector".into()))
    }
}

impl Drop for Vector<'_> {
    fn drop(&mut self) {
        self.session.emit(format!(
            "0{}{}",
            tokens::ASSIGN,
            address_slot(self.carrier.slot())
        ));
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Dereference
// ══════════════════════════════════════════════════════════════════════════════

/// What a pointer designates once one reference layer is popped.
#[derive(Debug)]
pub enum Deref<'s> {
    Bank(Bank<'s>),
    Struct(Struct<'s>),
    Cell(HeapCell<'s>),
}

impl<'s> Deref<'s> {
    pub fn into_bank(self) -> Option<Bank<'s>> {
        match self {
            Self::Bank(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_struct(self) -> Option<Struct<'s>> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_cell(self) -> Option<HeapCell<'s>> {
        match self {
            Self::Cell(c) => Some(c),
            _ => None,
        }
    }
}

/// Dereference a pointer whose value text is `value`.
pub(crate) fn deref_value<'s>(
    session: &'s Session,
    value: String,
    ref_type: &RefType,
) -> GenResult<Deref<'s>> {
    let (rest, tag) = ref_type.popped()?;
    match tag {
        RefTag::MemoryScalar => Ok(Deref::Bank(Bank::view(session, value, rest))),
        RefTag::StructInstance => Ok(Deref::Struct(Struct::view(session, Expr::var(value), &[])?)),
        RefTag::StructMember => Ok(Deref::Cell(HeapCell::new(session, value))),
        RefTag::NoRef => Err(GenError::CannotDeref(ref_type.to_string())),
    }
}
