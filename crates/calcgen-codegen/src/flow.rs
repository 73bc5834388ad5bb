//! Structured control flow.
//!
//! Opening a block emits its header line and returns a guard; dropping the
//! guard emits `End`. Nested guards therefore close in reverse order, and
//! every exit path out of a Rust scope closes the target block too.

use calcgen_types::{tokens, GenResult};

use crate::expr::{add, Expr};
use crate::session::Session;
use crate::var::{Register, Variable};

/// Guard for `While` and `If … Then` blocks.
#[derive(Debug)]
#[must_use = "the block closes as soon as the guard is dropped"]
pub struct Block<'s> {
    session: &'s Session,
}

impl<'s> Block<'s> {
    fn open(session: &'s Session, header: String) -> Self {
        session.emit(header);
        session.enter_block();
        Self { session }
    }
}

impl Drop for Block<'_> {
    fn drop(&mut self) {
        self.session.leave_block();
        self.session.emit(tokens::END);
    }
}

/// Loop counter of a `For` block: a temporary freed when the loop closes,
/// or a register owned by the caller.
#[derive(Debug)]
pub enum Counter<'s, 'c> {
    Temp(Register<'s>),
    Given(&'c Register<'s>),
}

impl<'s> Counter<'s, '_> {
    pub fn register(&self) -> &Register<'s> {
        match self {
            Self::Temp(reg) => reg,
            Self::Given(reg) => *reg,
        }
    }
}

/// Guard for a `For(counter,start,end[,step])` block.
#[derive(Debug)]
#[must_use = "the loop closes as soon as the guard is dropped"]
pub struct ForLoop<'s, 'c> {
    session: &'s Session,
    counter: Counter<'s, 'c>,
    end: Expr,
}

impl<'s> ForLoop<'s, '_> {
    pub fn counter(&self) -> &Register<'s> {
        self.counter.register()
    }

    /// The counter as an expression leaf.
    pub fn index(&self) -> Expr {
        self.counter().expr()
    }

    /// Leave the loop on its next test by pushing the counter past `end`.
    pub fn break_loop(&self) -> GenResult<()> {
        self.counter().set(add(&self.end, 1))
    }
}

impl Drop for ForLoop<'_, '_> {
    fn drop(&mut self) {
        self.session.leave_block();
        self.session.emit(tokens::END);
    }
}

impl Session {
    pub fn while_loop(&self, condition: impl Into<Expr>) -> GenResult<Block<'_>> {
        let cond = self.num_val(&condition.into())?;
        Ok(Block::open(self, format!("While {cond}")))
    }

    pub fn if_then(&self, condition: impl Into<Expr>) -> GenResult<Block<'_>> {
        let cond = self.num_val(&condition.into())?;
        Ok(Block::open(self, format!("If {cond}: Then")))
    }

    /// Switch the enclosing `If` block to its else branch.
    pub fn else_branch(&self) {
        self.emit(tokens::ELSE);
    }

    /// Open a counted loop. Without `counter` a temporary register is used
    /// and freed when the loop closes.
    pub fn for_loop<'s, 'c>(
        &'s self,
        counter: Option<&'c Register<'s>>,
        start: impl Into<Expr>,
        end: impl Into<Expr>,
        step: Option<Expr>,
    ) -> GenResult<ForLoop<'s, 'c>> {
        let end = end.into();
        let start_text = self.num_val(&start.into())?;
        let end_text = self.num_val(&end)?;
        let step_text = step.map(|s| self.num_val(&s)).transpose()?;
        let counter = match counter {
            Some(reg) => Counter::Given(reg),
            None => Counter::Temp(Register::new(self)?),
        };
        let step_part = step_text.map(|s| format!(",{s}")).unwrap_or_default();
        self.emit(format!(
            "For({},{start_text},{end_text}{step_part})",
            counter.register().slot()
        ));
        self.enter_block();
        Ok(ForLoop {
            session: self,
            counter,
            end,
        })
    }

    /// `For(counter,0,size)`.
    pub fn for_range<'s, 'c>(
        &'s self,
        counter: Option<&'c Register<'s>>,
        size: impl Into<Expr>,
    ) -> GenResult<ForLoop<'s, 'c>> {
        self.for_loop(counter, 0, size, None)
    }

    /// `For(counter,1,n)`: the body runs `n` times.
    pub fn for_amount<'s, 'c>(
        &'s self,
        counter: Option<&'c Register<'s>>,
        n: impl Into<Expr>,
    ) -> GenResult<ForLoop<'s, 'c>> {
        self.for_loop(counter, 1, n, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{gt, sub};
    use crate::session::SlotKind;

    #[test]
    fn nested_blocks_close_in_reverse() {
        let s = Session::default();
        {
            let _w = s.while_loop(gt(Expr::var("A"), 0)).unwrap();
            let _i = s.if_then(Expr::var("B")).unwrap();
            s.disp(1).unwrap();
            s.else_branch();
            s.disp(2).unwrap();
        }
        assert_eq!(
            s.lines(),
            vec!["While A>0", "If B: Then", "Disp 1", "Else", "Disp 2", "End", "End"]
        );
    }

    #[test]
    fn temporary_counter_is_freed() {
        let s = Session::default();
        {
            let lp = s.for_loop(None, 1, 10, Some(Expr::constant(2))).unwrap();
            assert_eq!(lp.counter().slot(), "A");
            assert_eq!(s.allocated_count(SlotKind::Register), 1);
        }
        assert_eq!(s.lines(), vec!["For(A,1,10,2)", "End"]);
        assert_eq!(s.allocated_count(SlotKind::Register), 0);
    }

    #[test]
    fn given_counter_survives_loop() {
        let s = Session::default();
        let n = Register::with_value(&s, 5).unwrap();
        let i = Register::new(&s).unwrap();
        {
            let lp = s.for_loop(Some(&i), 0, sub(&n, 1), None).unwrap();
            lp.break_loop().unwrap();
        }
        assert!(s.is_allocated(SlotKind::Register, "B"));
        assert_eq!(s.lines(), vec!["5→A", "For(B,0,A-1)", "A-1+1→B", "End"]);
    }

    #[test]
    fn failed_condition_opens_nothing() {
        let s = Session::default();
        assert!(s.while_loop(crate::expr::div(1, 0)).is_err());
        assert!(s.lines().is_empty());
        assert!(!s.in_block());
    }

    #[test]
    fn range_and_amount_bounds() {
        let s = Session::default();
        let n = Register::with_value(&s, 4).unwrap();
        {
            let lp = s.for_range(None, &n).unwrap();
            s.disp(lp.index()).unwrap();
        }
        {
            let _lp = s.for_amount(None, 3).unwrap();
            s.disp(0).unwrap();
        }
        assert_eq!(
            s.lines(),
            vec!["4→A", "For(B,0,A)", "Disp B", "End", "For(B,1,3)", "Disp 0", "End"]
        );
        assert_eq!(s.allocated_count(SlotKind::Register), 1);
    }

    #[test]
    fn open_blocks_are_counted() {
        let s = Session::default();
        assert!(!s.in_block());
        {
            let _w = s.while_loop(Expr::var("A")).unwrap();
            assert!(s.in_block());
            {
                let _lp = s.for_amount(None, 2).unwrap();
                assert!(s.in_block());
            }
            assert!(s.in_block());
        }
        assert!(!s.in_block());
    }
}
