//! Expression IR and simplifier.
//!
//! Expressions are built with the sugar constructors at the bottom of this
//! module ([`add`], [`mul`], [`eq`], ...), each of which wraps its node in a
//! [`Expr::Paren`]. Simplification walks the tree depth-first with a stack
//! of [`Frame`]s describing where each node sits, folds constants, applies
//! the identity/zero laws, and drops every parenthesis that the target's
//! precedence makes redundant. [`num_val`] is the only entry point code
//! emission uses, so structurally equal expressions always produce the same
//! text.

use std::fmt;

use calcgen_types::{Dialect, GenError, GenResult};

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

const OR: u8 = 1;
const AND: u8 = 2;
const COMPARISON: u8 = 3;
const ADDITIVE: u8 = 4;
const MULTIPLICATIVE: u8 = 5;
const ATOM: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => ADDITIVE,
            Self::Mul | Self::Div => MULTIPLICATIVE,
        }
    }
}

/// Comparison and logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
}

impl LogicOp {
    pub fn symbol(self, dialect: Dialect) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "≠",
            Self::Gt => ">",
            Self::Ge => "≥",
            Self::Lt => "<",
            Self::Le => "≤",
            Self::And => dialect.and_joiner(),
            Self::Or => dialect.or_joiner(),
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::And => AND,
            Self::Or => OR,
            _ => COMPARISON,
        }
    }
}

/// Which operand of a binary node a child is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One entry of the simplification context stack: the kind of node a child
/// is being simplified under. `Root` marks the top of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Root,
    Paren,
    Neg,
    Not,
    Arith(ArithOp, Side),
    Logic(LogicOp, Side),
}

// ══════════════════════════════════════════════════════════════════════════════
// Expr
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Const(String),
    /// Pre-formatted text, emitted verbatim.
    Raw(String),
    /// Value form of a variable (`A`, `⌊RAM(3)`, ...).
    Var(String),
    /// Arithmetic negation, rendered `0-x`.
    Neg(Box<Expr>),
    /// Logical not.
    Not(Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Logic(LogicOp, Box<Expr>, Box<Expr>),
    /// Grouping marker; removed by simplification unless required.
    Paren(Box<Expr>),
}

impl Expr {
    pub fn constant(value: impl fmt::Display) -> Self {
        Self::Const(value.to_string())
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }

    pub fn var(text: impl Into<String>) -> Self {
        Self::Var(text.into())
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Const(_) | Self::Raw(_) | Self::Var(_))
    }

    /// Numeric value of a literal constant.
    pub fn const_value(&self) -> Option<f64> {
        match self {
            Self::Const(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    fn is_literal(&self, n: f64, text: &str) -> bool {
        match self {
            Self::Const(_) => self.const_value() == Some(n),
            Self::Raw(t) | Self::Var(t) => t == text,
            _ => false,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.is_literal(0.0, "0")
    }

    pub fn is_one(&self) -> bool {
        self.is_literal(1.0, "1")
    }

    /// The expression with any grouping markers stripped.
    pub fn unparen(&self) -> &Expr {
        match self {
            Self::Paren(inner) => inner.unparen(),
            other => other,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Const(_) | Self::Raw(_) | Self::Var(_) | Self::Not(_) | Self::Paren(_) => ATOM,
            Self::Neg(_) => ADDITIVE,
            Self::Arith(op, _, _) => op.precedence(),
            Self::Logic(op, _, _) => op.precedence(),
        }
    }

    /// Simplify under the given context stack. The stack is restored before
    /// returning.
    pub fn simplified(&self, ctx: &mut Vec<Frame>) -> GenResult<Expr> {
        match self {
            Self::Const(_) | Self::Raw(_) | Self::Var(_) => Ok(self.clone()),

            Self::Neg(inner) => {
                let a = within(ctx, Frame::Neg, |ctx| inner.simplified(ctx))?;
                if let Self::Neg(x) = a.unparen() {
                    return x.simplified(ctx);
                }
                Ok(Self::Neg(Box::new(a)))
            }

            Self::Not(inner) => {
                let a = within(ctx, Frame::Not, |ctx| inner.simplified(ctx))?;
                if let Self::Not(x) = a.unparen() {
                    return x.simplified(ctx);
                }
                Ok(Self::Not(Box::new(a)))
            }

            Self::Arith(op, l, r) => {
                let a = within(ctx, Frame::Arith(*op, Side::Left), |ctx| l.simplified(ctx))?;
                let b = within(ctx, Frame::Arith(*op, Side::Right), |ctx| r.simplified(ctx))?;
                simplify_arith(*op, a, b, ctx)
            }

            Self::Logic(op, l, r) => {
                let a = within(ctx, Frame::Logic(*op, Side::Left), |ctx| l.simplified(ctx))?;
                let b = within(ctx, Frame::Logic(*op, Side::Right), |ctx| r.simplified(ctx))?;
                Ok(Self::Logic(*op, Box::new(a), Box::new(b)))
            }

            Self::Paren(inner) => {
                let a = within(ctx, Frame::Paren, |ctx| inner.simplified(ctx))?;
                if a.is_leaf() {
                    return Ok(a);
                }
                match ctx.last() {
                    Some(&parent) if needs_parens(&a, parent) => Ok(Self::Paren(Box::new(a))),
                    _ => Ok(a),
                }
            }
        }
    }

    /// Render to target text. Call on a simplified tree.
    pub fn render(&self, dialect: Dialect) -> String {
        match self {
            Self::Const(t) | Self::Raw(t) | Self::Var(t) => t.clone(),
            Self::Neg(a) => format!("0-{}", a.render(dialect)),
            Self::Not(a) => format!("{}{})", dialect.not_open(), a.render(dialect)),
            Self::Arith(op, a, b) => {
                format!("{}{}{}", a.render(dialect), op.symbol(), b.render(dialect))
            }
            Self::Logic(op, a, b) => format!(
                "{}{}{}",
                a.render(dialect),
                op.symbol(dialect),
                b.render(dialect)
            ),
            Self::Paren(a) => format!("({})", a.render(dialect)),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Dialect::default()))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Entry points
// ══════════════════════════════════════════════════════════════════════════════

/// Simplify `expr` as the root of an expression.
pub fn canonical(expr: &Expr) -> GenResult<Expr> {
    if expr.is_leaf() {
        return Ok(expr.clone());
    }
    expr.simplified(&mut vec![Frame::Root])
}

/// Canonical text of `expr`.
pub fn num_val(expr: &Expr, dialect: Dialect) -> GenResult<String> {
    Ok(canonical(expr)?.render(dialect))
}

// ══════════════════════════════════════════════════════════════════════════════
// Rules
// ══════════════════════════════════════════════════════════════════════════════

fn within<T>(
    ctx: &mut Vec<Frame>,
    frame: Frame,
    f: impl FnOnce(&mut Vec<Frame>) -> T,
) -> T {
    ctx.push(frame);
    let out = f(ctx);
    ctx.pop();
    out
}

/// An operand promoted into its parent's position must re-decide its own
/// grouping against the new parent.
fn reseat(e: Expr, ctx: &mut Vec<Frame>) -> GenResult<Expr> {
    if matches!(e, Expr::Paren(_)) {
        e.simplified(ctx)
    } else {
        Ok(e)
    }
}

fn simplify_arith(op: ArithOp, a: Expr, b: Expr, ctx: &mut Vec<Frame>) -> GenResult<Expr> {
    match op {
        ArithOp::Add => {
            if a.is_zero() {
                return reseat(b, ctx);
            }
            if b.is_zero() {
                return reseat(a, ctx);
            }
            if let Some(folded) = fold(&a, &b, |x, y| x + y) {
                return Ok(folded);
            }
        }
        ArithOp::Sub => {
            if a.is_zero() {
                return Expr::Neg(Box::new(b)).simplified(ctx);
            }
            if b.is_zero() {
                return reseat(a, ctx);
            }
            if let Some(folded) = fold(&a, &b, |x, y| x - y) {
                return Ok(folded);
            }
        }
        ArithOp::Mul => {
            if a.is_zero() || b.is_zero() {
                return Ok(Expr::constant(0));
            }
            if a.is_one() {
                return reseat(b, ctx);
            }
            if b.is_one() {
                return reseat(a, ctx);
            }
            if let Some(folded) = fold(&a, &b, |x, y| x * y) {
                return Ok(folded);
            }
        }
        ArithOp::Div => {
            if b.is_zero() {
                return Err(GenError::DivisionByZero(format!("{a}/{b}")));
            }
            if a.is_zero() {
                return Ok(Expr::constant(0));
            }
            if b.is_one() {
                return reseat(a, ctx);
            }
            if let Some(folded) = fold_division(&a, &b) {
                return Ok(folded);
            }
        }
    }
    Ok(Expr::Arith(op, Box::new(a), Box::new(b)))
}

fn fold(a: &Expr, b: &Expr, f: impl Fn(f64, f64) -> f64) -> Option<Expr> {
    let value = f(a.const_value()?, b.const_value()?);
    value.is_finite().then(|| Expr::Const(format_number(value)))
}

/// Exact division of two literals: reduce integer fractions by their GCD,
/// re-express other ratios as a small fraction when one exists.
fn fold_division(a: &Expr, b: &Expr) -> Option<Expr> {
    let (x, y) = (a.const_value()?, b.const_value()?);
    const EXACT: f64 = 9_007_199_254_740_992.0;

    if x.fract() == 0.0 && y.fract() == 0.0 && x.abs() < EXACT && y.abs() < EXACT {
        let (n, d) = (x as i64, y as i64);
        let g = gcd(n.unsigned_abs(), d.unsigned_abs()) as i64;
        return (g > 1).then(|| fraction(n / g, d / g));
    }

    let (n, d) = as_integer_ratio(x / y)?;
    (n.abs() < 100 && d.abs() < 100).then(|| fraction(n, d))
}

fn fraction(mut n: i64, mut d: i64) -> Expr {
    if d < 0 {
        n = -n;
        d = -d;
    }
    if d == 1 {
        Expr::constant(n)
    } else {
        Expr::Arith(
            ArithOp::Div,
            Box::new(Expr::constant(n)),
            Box::new(Expr::constant(d)),
        )
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Exact `numerator / denominator` form of a finite float, when it fits.
fn as_integer_ratio(x: f64) -> Option<(i64, i64)> {
    if !x.is_finite() {
        return None;
    }
    if x == 0.0 {
        return Some((0, 1));
    }
    let bits = x.to_bits();
    let negative = bits >> 63 == 1;
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & 0x000f_ffff_ffff_ffff;
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | 0x0010_0000_0000_0000, biased - 1075)
    };

    let (mut num, mut den): (u128, u128) = if exponent >= 0 {
        if exponent > 64 {
            return None;
        }
        ((mantissa as u128) << exponent, 1)
    } else {
        if exponent < -126 {
            return None;
        }
        (mantissa as u128, 1u128 << (-exponent))
    };
    let shift = num.trailing_zeros().min(den.trailing_zeros());
    num >>= shift;
    den >>= shift;

    let num = i64::try_from(num).ok()?;
    let den = i64::try_from(den).ok()?;
    Some((if negative { -num } else { num }, den))
}

/// Integers print without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn needs_parens(child: &Expr, parent: Frame) -> bool {
    let (parent_prec, side) = match parent {
        Frame::Root | Frame::Paren | Frame::Not => return false,
        // `0-x`: the operand sits right of a subtraction.
        Frame::Neg => (ADDITIVE, Side::Right),
        Frame::Arith(op, side) => (op.precedence(), side),
        Frame::Logic(op, side) => (op.precedence(), side),
    };
    let child_prec = child.precedence();
    if child_prec != parent_prec {
        return child_prec < parent_prec;
    }
    match side {
        Side::Left => false,
        Side::Right => !absorbs_right(parent, child),
    }
}

/// Whether `parent (child)` reads the same as `parent child` when the child
/// is the right operand at equal precedence.
fn absorbs_right(parent: Frame, child: &Expr) -> bool {
    match (parent, child) {
        (Frame::Arith(ArithOp::Add, _), Expr::Arith(ArithOp::Add | ArithOp::Sub, _, _))
        | (Frame::Arith(ArithOp::Add, _), Expr::Neg(_))
        | (Frame::Arith(ArithOp::Mul, _), Expr::Arith(ArithOp::Mul | ArithOp::Div, _, _))
        | (Frame::Logic(LogicOp::And, _), Expr::Logic(LogicOp::And, _, _))
        | (Frame::Logic(LogicOp::Or, _), Expr::Logic(LogicOp::Or, _, _)) => true,
        _ => false,
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Conversions
// ══════════════════════════════════════════════════════════════════════════════

macro_rules! const_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Expr {
            fn from(value: $t) -> Self {
                Expr::constant(value)
            }
        })*
    };
}

const_from!(i32, i64, u32, u64, usize);

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(format_number(value))
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::constant(u8::from(value))
    }
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Sugar
// ══════════════════════════════════════════════════════════════════════════════

fn arith(op: ArithOp, a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    paren(Expr::Arith(op, Box::new(a.into()), Box::new(b.into())))
}

fn logic(op: LogicOp, a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    paren(Expr::Logic(op, Box::new(a.into()), Box::new(b.into())))
}

pub fn paren(a: impl Into<Expr>) -> Expr {
    Expr::Paren(Box::new(a.into()))
}

pub fn add(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    arith(ArithOp::Add, a, b)
}

pub fn sub(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    arith(ArithOp::Sub, a, b)
}

pub fn mul(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    arith(ArithOp::Mul, a, b)
}

pub fn div(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    arith(ArithOp::Div, a, b)
}

pub fn neg(a: impl Into<Expr>) -> Expr {
    paren(Expr::Neg(Box::new(a.into())))
}

pub fn not(a: impl Into<Expr>) -> Expr {
    Expr::Not(Box::new(a.into()))
}

pub fn eq(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    logic(LogicOp::Eq, a, b)
}

pub fn ne(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    logic(LogicOp::Ne, a, b)
}

pub fn gt(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    logic(LogicOp::Gt, a, b)
}

pub fn ge(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    logic(LogicOp::Ge, a, b)
}

pub fn lt(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    logic(LogicOp::Lt, a, b)
}

pub fn le(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    logic(LogicOp::Le, a, b)
}

pub fn and(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    logic(LogicOp::And, a, b)
}

pub fn or(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    logic(LogicOp::Or, a, b)
}
