//! Variable model: every readable or writable location of the target.
//!
//! Slot-backed handles (registers, memory-bank scalars, string slots) take
//! their slot from the session on construction and give it back from
//! `Drop`. A pointer owns the slot that carries the address; whatever it
//! designates is reached through a view that owns nothing.

use calcgen_types::{tokens, GenError, GenResult, RefTag, RefType};

use crate::expr::{add, sub, Expr};
use crate::memory::{deref_value, Deref};
use crate::session::{Session, SlotKind};

// ══════════════════════════════════════════════════════════════════════════════
// Capabilities
// ══════════════════════════════════════════════════════════════════════════════

/// Anything that has a value form in emitted code.
pub trait Readable {
    /// How to read it.
    fn value(&self) -> GenResult<String>;

    /// How to write to it. Read-only handles fail with `NoAddress`.
    fn address(&self) -> GenResult<String>;
}

/// A writable location bound to a session.
pub trait Variable<'s>: Readable {
    fn session(&self) -> &'s Session;

    /// Emit `<value>→<address>`.
    fn set(&self, value: impl Into<Expr>) -> GenResult<()> {
        let target = self.address()?;
        self.session().assign(&value.into(), &target)
    }

    fn increment(&self) -> GenResult<()> {
        self.set(add(Expr::var(self.value()?), 1))
    }

    fn decrement(&self) -> GenResult<()> {
        self.set(sub(Expr::var(self.value()?), 1))
    }
}

/// Text form of string slots and string literals.
pub trait StringValue {
    fn string_text(&self) -> String;
}

// ══════════════════════════════════════════════════════════════════════════════
// Read-only leaves
// ══════════════════════════════════════════════════════════════════════════════

/// Numeric literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Const(String);

impl Const {
    pub fn new(value: impl std::fmt::Display) -> Self {
        Self(value.to_string())
    }
}

impl Readable for Const {
    fn value(&self) -> GenResult<String> {
        Ok(self.0.clone())
    }

    fn address(&self) -> GenResult<String> {
        Err(GenError::NoAddress(format!("constant {}", self.0)))
    }
}

/// Pre-formatted expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raw(String);

impl Raw {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl Readable for Raw {
    fn value(&self) -> GenResult<String> {
        Ok(self.0.clone())
    }

    fn address(&self) -> GenResult<String> {
        Err(GenError::NoAddress(format!("raw text {}", self.0)))
    }
}

/// Quoted string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrConst(String);

impl StrConst {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl Readable for StrConst {
    fn value(&self) -> GenResult<String> {
        Ok(self.string_text())
    }

    fn address(&self) -> GenResult<String> {
        Err(GenError::NoAddress(format!("string literal {}", self.string_text())))
    }
}

impl StringValue for StrConst {
    fn string_text(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Register
// ══════════════════════════════════════════════════════════════════════════════

/// Letter register (`A`..`Z`).
#[derive(Debug)]
pub struct Register<'s> {
    session: &'s Session,
    slot: String,
    ref_type: RefType,
}

impl<'s> Register<'s> {
    pub fn new(session: &'s Session) -> GenResult<Self> {
        Self::tagged(session, RefType::owned())
    }

    pub fn with_value(session: &'s Session, init: impl Into<Expr>) -> GenResult<Self> {
        let reg = Self::new(session)?;
        reg.set(init)?;
        Ok(reg)
    }

    /// A register carrying `ref_type`. The register still owns its own
    /// slot; the tag only describes what its value designates.
    pub fn tagged(session: &'s Session, ref_type: RefType) -> GenResult<Self> {
        let slot = session.acquire(SlotKind::Register)?;
        Ok(Self {
            session,
            slot,
            ref_type,
        })
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn ref_type(&self) -> &RefType {
        &self.ref_type
    }

    pub fn expr(&self) -> Expr {
        Expr::var(self.slot.clone())
    }

    pub fn deep_clone(&self) -> GenResult<Register<'s>> {
        let copy = Self::tagged(self.session, self.ref_type.clone())?;
        copy.set(self)?;
        Ok(copy)
    }

    /// Pop one reference layer.
    pub fn deref(&self) -> GenResult<Deref<'s>> {
        deref_value(self.session, self.slot.clone(), &self.ref_type)
    }
}

impl Readable for Register<'_> {
    fn value(&self) -> GenResult<String> {
        Ok(self.slot.clone())
    }

    fn address(&self) -> GenResult<String> {
        Ok(self.slot.clone())
    }
}

impl<'s> Variable<'s> for Register<'s> {
    fn session(&self) -> &'s Session {
        self.session
    }
}

impl Drop for Register<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.session.release(SlotKind::Register, &self.slot) {
            self.session.record_release_failure(err);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Memory bank
// ══════════════════════════════════════════════════════════════════════════════

/// Memory-bank scalar (`⌊RAM(n)`).
///
/// Either owns a bank slot, or is a view over an explicit address (another
/// handle's slot, or an address computed at run time).
#[derive(Debug)]
pub struct Bank<'s> {
    session: &'s Session,
    slot: String,
    owned: bool,
    ref_type: RefType,
}

impl<'s> Bank<'s> {
    /// A fresh zero-initialised scalar.
    pub fn new(session: &'s Session) -> GenResult<Self> {
        Self::with_value(session, 0)
    }

    pub fn with_value(session: &'s Session, init: impl Into<Expr>) -> GenResult<Self> {
        Self::allocate(session, RefType::owned(), init)
    }

    pub fn tagged(
        session: &'s Session,
        ref_type: RefType,
        init: impl Into<Expr>,
    ) -> GenResult<Self> {
        Self::allocate(session, ref_type, init)
    }

    fn allocate(session: &'s Session, ref_type: RefType, init: impl Into<Expr>) -> GenResult<Self> {
        let slot = session.acquire(SlotKind::Bank)?;
        let bank = Self {
            session,
            slot,
            owned: true,
            ref_type,
        };
        bank.set(init)?;
        Ok(bank)
    }

    /// View over `address`; allocates nothing and frees nothing.
    pub fn view(session: &'s Session, address: impl Into<String>, ref_type: RefType) -> Self {
        Self {
            session,
            slot: address.into(),
            owned: false,
            ref_type,
        }
    }

    /// Bank index (or address expression for views).
    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn ref_type(&self) -> &RefType {
        &self.ref_type
    }

    /// True for handles that borrow an address instead of owning a slot.
    pub fn is_view(&self) -> bool {
        !self.owned
    }

    pub fn expr(&self) -> Expr {
        Expr::var(self.value_text())
    }

    fn value_text(&self) -> String {
        format!("{}({})", tokens::RAM, self.slot)
    }

    /// New bank scalar holding this scalar's address.
    pub fn reference(&self) -> GenResult<Bank<'s>> {
        Self::allocate(
            self.session,
            self.ref_type.pushed(RefTag::MemoryScalar),
            Expr::raw(self.slot.clone()),
        )
    }

    /// New register holding this scalar's address.
    pub fn register_reference(&self) -> GenResult<Register<'s>> {
        let reg = Register::tagged(self.session, self.ref_type.pushed(RefTag::MemoryScalar))?;
        reg.set(Expr::raw(self.slot.clone()))?;
        Ok(reg)
    }

    pub fn deep_clone(&self) -> GenResult<Bank<'s>> {
        Self::allocate(self.session, self.ref_type.clone(), self.expr())
    }

    pub fn deref(&self) -> GenResult<Deref<'s>> {
        deref_value(self.session, self.value_text(), &self.ref_type)
    }
}

impl Readable for Bank<'_> {
    fn value(&self) -> GenResult<String> {
        Ok(self.value_text())
    }

    fn address(&self) -> GenResult<String> {
        Ok(self.value_text())
    }
}

impl<'s> Variable<'s> for Bank<'s> {
    fn session(&self) -> &'s Session {
        self.session
    }
}

impl Drop for Bank<'_> {
    fn drop(&mut self) {
        if self.is_view() {
            return;
        }
        if let Err(err) = self.session.release(SlotKind::Bank, &self.slot) {
            self.session.record_release_failure(err);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Strings
// ══════════════════════════════════════════════════════════════════════════════

/// String slot (`Chn0`..`Chn9`).
#[derive(Debug)]
pub struct StrVar<'s> {
    session: &'s Session,
    slot: String,
}

impl<'s> StrVar<'s> {
    pub fn new(session: &'s Session) -> GenResult<Self> {
        let slot = session.acquire(SlotKind::String)?;
        Ok(Self { session, slot })
    }

    pub fn with_text(session: &'s Session, text: &impl StringValue) -> GenResult<Self> {
        let var = Self::new(session)?;
        var.assign(text);
        Ok(var)
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Emit `<text>→<slot>`.
    pub fn assign(&self, text: &impl StringValue) {
        self.session
            .emit(format!("{}{}{}", text.string_text(), tokens::ASSIGN, self.slot));
    }
}

impl Readable for StrVar<'_> {
    fn value(&self) -> GenResult<String> {
        Ok(self.slot.clone())
    }

    fn address(&self) -> GenResult<String> {
        Ok(self.slot.clone())
    }
}

impl StringValue for StrVar<'_> {
    fn string_text(&self) -> String {
        self.slot.clone()
    }
}

impl Drop for StrVar<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.session.release(SlotKind::String, &self.slot) {
            self.session.record_release_failure(err);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Conversions into expression leaves
// ══════════════════════════════════════════════════════════════════════════════

impl From<&Register<'_>> for Expr {
    fn from(reg: &Register<'_>) -> Self {
        reg.expr()
    }
}

impl From<&Bank<'_>> for Expr {
    fn from(bank: &Bank<'_>) -> Self {
        bank.expr()
    }
}

impl From<Const> for Expr {
    fn from(c: Const) -> Self {
        Expr::Const(c.0)
    }
}

impl From<&Const> for Expr {
    fn from(c: &Const) -> Self {
        Expr::Const(c.0.clone())
    }
}

impl From<Raw> for Expr {
    fn from(r: Raw) -> Self {
        Expr::Raw(r.0)
    }
}

impl From<&Raw> for Expr {
    fn from(r: &Raw) -> Self {
        Expr::Raw(r.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_frees_on_drop() {
        let s = Session::default();
        {
            let a = Register::new(&s).unwrap();
            assert_eq!(a.slot(), "A");
            assert!(s.is_allocated(SlotKind::Register, "A"));
        }
        assert_eq!(s.allocated_count(SlotKind::Register), 0);
        assert!(s.finish().is_ok());
    }

    #[test]
    fn register_with_value_emits_assignment() {
        let s = Session::default();
        let a = Register::with_value(&s, 2).unwrap();
        a.increment().unwrap();
        a.decrement().unwrap();
        assert_eq!(s.lines(), vec!["2→A", "A+1→A", "A-1→A"]);
    }

    #[test]
    fn bank_is_zero_initialised() {
        let s = Session::default();
        let m = Bank::new(&s).unwrap();
        assert_eq!(m.value().unwrap(), "⌊RAM(1)");
        m.set(7).unwrap();
        assert_eq!(s.lines(), vec!["0→⌊RAM(1)", "7→⌊RAM(1)"]);
    }

    #[test]
    fn constants_have_no_address() {
        assert!(matches!(Const::new(3).address(), Err(GenError::NoAddress(_))));
        assert!(matches!(Raw::new("Rep").address(), Err(GenError::NoAddress(_))));
        assert!(matches!(StrConst::new("hi").address(), Err(GenError::NoAddress(_))));
        assert_eq!(Const::new(3).value().unwrap(), "3");
    }

    #[test]
    fn failed_init_releases_slot() {
        let s = Session::default();
        let err = Register::with_value(&s, crate::expr::div(1, 0)).unwrap_err();
        assert!(matches!(err, GenError::DivisionByZero(_)));
        assert_eq!(s.allocated_count(SlotKind::Register), 0);
        assert!(s.lines().is_empty());
    }

    #[test]
    fn deep_clone_copies_value() {
        let s = Session::default();
        let a = Bank::with_value(&s, 4).unwrap();
        let b = a.deep_clone().unwrap();
        assert_eq!(b.slot(), "2");
        assert_eq!(s.lines(), vec!["4→⌊RAM(1)", "⌊RAM(1)→⌊RAM(2)"]);
    }

    #[test]
    fn pointer_frees_its_carrier_only() {
        let s = Session::default();
        let m = Bank::new(&s).unwrap();
        {
            let p = m.register_reference().unwrap();
            assert_eq!(p.ref_type().last(), Some(RefTag::MemoryScalar));
            let q = m.reference().unwrap();
            assert!(!q.is_view());
            drop(p.deref().unwrap());
            assert!(s.is_allocated(SlotKind::Bank, "1"));
        }
        assert!(!s.is_allocated(SlotKind::Register, "A"));
        assert!(!s.is_allocated(SlotKind::Bank, "2"));
        assert!(s.is_allocated(SlotKind::Bank, "1"));
        assert!(s.finish().is_ok());
    }

    #[test]
    fn repeated_pointers_do_not_exhaust_registers() {
        let s = Session::default();
        let m = Bank::new(&s).unwrap();
        for _ in 0..40 {
            let p = m.register_reference().unwrap();
            assert_eq!(p.slot(), "A");
        }
        assert_eq!(s.allocated_count(SlotKind::Register), 0);
    }

    #[test]
    fn string_slots() {
        let s = Session::default();
        {
            let t = StrVar::with_text(&s, &StrConst::new("HELLO")).unwrap();
            s.disp_text(&t);
        }
        assert_eq!(s.lines(), vec!["\"HELLO\"→Chn0", "Disp Chn0"]);
        assert_eq!(s.allocated_count(SlotKind::String), 0);
    }
}
