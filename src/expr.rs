use std::fmt;
use std::ops::Deref;
use std::ops::{Add, BitAnd, BitOr, BitXor, Mul, Neg, Not, Sub};

use fxhash::FxHashSet as HashSet;

use hashconsing::{consign, HConsed, HashConsign};

use crate::element::ElementId;
use crate::register::Register;

consign! {
    let EXPR = consign(100 * 1024 /* = capacity */) for Expr;
}

pub(crate) fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// A bitvector constant of at most 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Const {
    value: u64,
    bits: u32,
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(_ bv{} {})", self.value, self.bits)
    }
}

impl Const {
    pub fn new(value: u64, bits: u32) -> Self {
        assert!(bits > 0 && bits <= 64, "constant width {} out of range", bits);
        Self {
            value: value & mask(bits),
            bits,
        }
    }

    pub fn zero(bits: u32) -> Self {
        Self::new(0, bits)
    }

    pub fn one(bits: u32) -> Self {
        Self::new(1, bits)
    }

    pub fn ones(bits: u32) -> Self {
        Self::new(u64::MAX, bits)
    }

    pub fn from_bool(b: bool) -> Self {
        Self::new(b as u64, 1)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn signed_value(&self) -> i64 {
        let shift = 64 - self.bits;
        ((self.value << shift) as i64) >> shift
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn is_one(&self) -> bool {
        self.value == 1
    }

    pub fn is_ones(&self) -> bool {
        self.value == mask(self.bits)
    }

    fn map(self, f: impl FnOnce(u64) -> u64) -> Self {
        Self::new(f(self.value), self.bits)
    }

    fn zip(self, other: Self, f: impl FnOnce(u64, u64) -> u64) -> Self {
        debug_assert_eq!(self.bits, other.bits);
        Self::new(f(self.value, other.value), self.bits)
    }
}

/// Free variables: the value a location held before the analysis observed
/// any write to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Var {
    Register(Register),
    Memory(u64),
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Register(register) => write!(f, "init_{}", register),
            Var::Memory(address) => write!(f, "mem_{:x}", address),
        }
    }
}

impl Var {
    pub fn bits(&self) -> u32 {
        match self {
            Var::Register(register) => register.bits(),
            Var::Memory(_) => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnOp {
    Not,
    Neg,
}

impl UnOp {
    fn smt(&self) -> &'static str {
        match self {
            UnOp::Not => "bvnot",
            UnOp::Neg => "bvneg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Sar,
}

impl BinOp {
    fn smt(&self) -> &'static str {
        match self {
            BinOp::Add => "bvadd",
            BinOp::Sub => "bvsub",
            BinOp::Mul => "bvmul",
            BinOp::And => "bvand",
            BinOp::Or => "bvor",
            BinOp::Xor => "bvxor",
            BinOp::Shl => "bvshl",
            BinOp::Shr => "bvlshr",
            BinOp::Sar => "bvashr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinRel {
    Eq,
    Ult,
    Slt,
}

impl BinRel {
    fn smt(&self) -> &'static str {
        match self {
            BinRel::Eq => "=",
            BinRel::Ult => "bvult",
            BinRel::Slt => "bvslt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SymExpr(HConsed<Expr>);

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl Deref for SymExpr {
    type Target = Expr;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl From<Const> for SymExpr {
    fn from(c: Const) -> Self {
        SymExpr::val(c)
    }
}

impl From<Var> for SymExpr {
    fn from(v: Var) -> Self {
        SymExpr::var(v)
    }
}

impl From<Expr> for SymExpr {
    fn from(e: Expr) -> Self {
        Self(EXPR.mk(e))
    }
}

impl From<HConsed<Expr>> for SymExpr {
    fn from(e: HConsed<Expr>) -> Self {
        Self(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    Val(Const),
    Var(Var),
    Ref(ElementId, u32), // value written by a prior symbolic element

    UnOp(UnOp, SymExpr),            // T -> T
    BinOp(BinOp, SymExpr, SymExpr), // T * T -> T
    BinRel(BinRel, SymExpr, SymExpr), // T * T -> bv1

    IfElse(SymExpr, SymExpr, SymExpr), // bv1 * T * T -> T

    Extract(SymExpr, u32, u32), // T T[LSB..MSB) -> T
    Concat(SymExpr, SymExpr),   // HIGH * LOW -> T

    ZeroExtend(SymExpr, u32),
    SignExtend(SymExpr, u32),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Val(c) => write!(f, "{}", c),
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Ref(id, _) => write!(f, "{}", id),
            Expr::UnOp(op, e) => write!(f, "({} {})", op.smt(), e),
            Expr::BinOp(op, l, r) => write!(f, "({} {} {})", op.smt(), l, r),
            Expr::BinRel(op, l, r) => {
                write!(f, "(ite ({} {} {}) (_ bv1 1) (_ bv0 1))", op.smt(), l, r)
            }
            Expr::IfElse(c, t, e) => write!(f, "(ite (= {} (_ bv1 1)) {} {})", c, t, e),
            Expr::Extract(e, lsb, msb) => write!(f, "((_ extract {} {}) {})", msb - 1, lsb, e),
            Expr::Concat(l, r) => write!(f, "(concat {} {})", l, r),
            Expr::ZeroExtend(e, bits) => {
                write!(f, "((_ zero_extend {}) {})", bits - e.bits(), e)
            }
            Expr::SignExtend(e, bits) => {
                write!(f, "((_ sign_extend {}) {})", bits - e.bits(), e)
            }
        }
    }
}

impl SymExpr {
    pub fn val(c: Const) -> SymExpr {
        EXPR.mk(Expr::Val(c)).into()
    }

    pub fn bv(value: u64, bits: u32) -> SymExpr {
        Self::val(Const::new(value, bits))
    }

    pub fn var(var: Var) -> SymExpr {
        EXPR.mk(Expr::Var(var)).into()
    }

    pub fn reference(id: ElementId, bits: u32) -> SymExpr {
        EXPR.mk(Expr::Ref(id, bits)).into()
    }

    pub fn lift_unop(op: UnOp, v: SymExpr) -> SymExpr {
        EXPR.mk(Expr::UnOp(op, v)).into()
    }

    pub fn lift_binop(op: BinOp, l: SymExpr, r: SymExpr) -> SymExpr {
        assert_eq!(l.bits(), r.bits());

        EXPR.mk(Expr::BinOp(op, l, r)).into()
    }

    pub fn lift_binrel(op: BinRel, l: SymExpr, r: SymExpr) -> SymExpr {
        assert_eq!(l.bits(), r.bits());

        EXPR.mk(Expr::BinRel(op, l, r)).into()
    }

    pub fn not(v: SymExpr) -> SymExpr {
        if let Expr::Val(c) = &*v {
            Self::val(c.map(|v| !v))
        } else if let Expr::UnOp(UnOp::Not, vv) = &*v {
            vv.clone()
        } else {
            Self::lift_unop(UnOp::Not, v)
        }
    }

    pub fn neg(v: SymExpr) -> SymExpr {
        if let Expr::Val(c) = &*v {
            Self::val(c.map(u64::wrapping_neg))
        } else if let Expr::UnOp(UnOp::Neg, vv) = &*v {
            vv.clone()
        } else {
            Self::lift_unop(UnOp::Neg, v)
        }
    }

    pub fn and(l: SymExpr, r: SymExpr) -> SymExpr {
        assert_eq!(l.bits(), r.bits());

        if l.is_zero() || r.is_ones() {
            l
        } else if r.is_zero() || l.is_ones() {
            r
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*l, &*r) {
            Self::val(lv.zip(*rv, |a, b| a & b))
        } else {
            Self::lift_binop(BinOp::And, l, r)
        }
    }

    pub fn or(l: SymExpr, r: SymExpr) -> SymExpr {
        assert_eq!(l.bits(), r.bits());

        if l.is_zero() || r.is_ones() {
            r
        } else if r.is_zero() || l.is_ones() {
            l
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*l, &*r) {
            Self::val(lv.zip(*rv, |a, b| a | b))
        } else {
            Self::lift_binop(BinOp::Or, l, r)
        }
    }

    pub fn xor(l: SymExpr, r: SymExpr) -> SymExpr {
        assert_eq!(l.bits(), r.bits());

        if l == r {
            Self::val(Const::zero(l.bits()))
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*l, &*r) {
            Self::val(lv.zip(*rv, |a, b| a ^ b))
        } else if r.is_ones() {
            Self::not(l)
        } else if l.is_ones() {
            Self::not(r)
        } else if r.is_zero() {
            l
        } else if l.is_zero() {
            r
        } else {
            Self::lift_binop(BinOp::Xor, l, r)
        }
    }

    pub fn add(l: SymExpr, r: SymExpr) -> SymExpr {
        assert_eq!(l.bits(), r.bits());

        if l.is_zero() {
            r
        } else if r.is_zero() {
            l
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*l, &*r) {
            Self::val(lv.zip(*rv, u64::wrapping_add))
        } else {
            Self::lift_binop(BinOp::Add, l, r)
        }
    }

    pub fn sub(l: SymExpr, r: SymExpr) -> SymExpr {
        assert_eq!(l.bits(), r.bits());

        if r.is_zero() {
            l
        } else if l == r {
            Self::val(Const::zero(l.bits()))
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*l, &*r) {
            Self::val(lv.zip(*rv, u64::wrapping_sub))
        } else {
            Self::lift_binop(BinOp::Sub, l, r)
        }
    }

    pub fn mul(l: SymExpr, r: SymExpr) -> SymExpr {
        assert_eq!(l.bits(), r.bits());

        if l.is_zero() || r.is_zero() {
            Self::val(Const::zero(l.bits()))
        } else if r.is_one() {
            l
        } else if l.is_one() {
            r
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*l, &*r) {
            Self::val(lv.zip(*rv, u64::wrapping_mul))
        } else {
            Self::lift_binop(BinOp::Mul, l, r)
        }
    }

    pub fn shl(l: SymExpr, r: SymExpr) -> SymExpr {
        if r.is_zero() || l.is_zero() {
            l
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*l, &*r) {
            let bits = lv.bits();
            Self::val(if rv.value() >= bits as u64 {
                Const::zero(bits)
            } else {
                lv.map(|v| v << rv.value())
            })
        } else {
            Self::lift_binop(BinOp::Shl, l, r)
        }
    }

    pub fn shr(l: SymExpr, r: SymExpr) -> SymExpr {
        if r.is_zero() || l.is_zero() {
            l
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*l, &*r) {
            let bits = lv.bits();
            Self::val(if rv.value() >= bits as u64 {
                Const::zero(bits)
            } else {
                lv.map(|v| v >> rv.value())
            })
        } else {
            Self::lift_binop(BinOp::Shr, l, r)
        }
    }

    pub fn sar(l: SymExpr, r: SymExpr) -> SymExpr {
        if r.is_zero() || l.is_zero() {
            l
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*l, &*r) {
            let amount = rv.value().min(63) as u32;
            Self::val(Const::new((lv.signed_value() >> amount) as u64, lv.bits()))
        } else {
            Self::lift_binop(BinOp::Sar, l, r)
        }
    }

    pub fn eq(self, r: SymExpr) -> SymExpr {
        if self == r {
            Self::val(Const::from_bool(true))
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*self, &*r) {
            Self::val(Const::from_bool(lv == rv))
        } else {
            Self::lift_binrel(BinRel::Eq, self, r)
        }
    }

    pub fn ult(self, r: SymExpr) -> SymExpr {
        if self == r {
            Self::val(Const::from_bool(false))
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*self, &*r) {
            Self::val(Const::from_bool(lv.value() < rv.value()))
        } else {
            Self::lift_binrel(BinRel::Ult, self, r)
        }
    }

    pub fn slt(self, r: SymExpr) -> SymExpr {
        if self == r {
            Self::val(Const::from_bool(false))
        } else if let (Expr::Val(lv), Expr::Val(rv)) = (&*self, &*r) {
            Self::val(Const::from_bool(lv.signed_value() < rv.signed_value()))
        } else {
            Self::lift_binrel(BinRel::Slt, self, r)
        }
    }

    pub fn ite(self, texpr: SymExpr, fexpr: SymExpr) -> SymExpr {
        assert_eq!(self.bits(), 1);
        assert_eq!(texpr.bits(), fexpr.bits());

        if let Expr::Val(c) = &*self {
            if c.is_zero() {
                fexpr
            } else {
                texpr
            }
        } else if texpr == fexpr {
            texpr
        } else {
            EXPR.mk(Expr::IfElse(self, texpr, fexpr)).into()
        }
    }

    pub fn extract(self, lsb: u32, msb: u32) -> SymExpr {
        assert!(msb > lsb && msb <= self.bits());

        if (msb - lsb) == self.bits() {
            return self;
        }

        match &*self {
            Expr::Val(c) => Self::val(Const::new(c.value() >> lsb, msb - lsb)),
            Expr::Extract(inner, ilsb, _) => {
                inner.clone().extract(lsb + ilsb, msb + ilsb)
            }
            Expr::Concat(high, low) => {
                let split = low.bits();
                if msb <= split {
                    low.clone().extract(lsb, msb)
                } else if lsb >= split {
                    high.clone().extract(lsb - split, msb - split)
                } else {
                    EXPR.mk(Expr::Extract(self.clone(), lsb, msb)).into()
                }
            }
            Expr::ZeroExtend(inner, _) if msb <= inner.bits() => {
                inner.clone().extract(lsb, msb)
            }
            Expr::SignExtend(inner, _) if msb <= inner.bits() => {
                inner.clone().extract(lsb, msb)
            }
            _ => EXPR.mk(Expr::Extract(self.clone(), lsb, msb)).into(),
        }
    }

    pub fn extract_low(self, bits: u32) -> SymExpr {
        self.extract(0, bits)
    }

    pub fn extract_high(self, bits: u32) -> SymExpr {
        let width = self.bits();
        self.extract(width - bits, width)
    }

    pub fn concat(self, r: SymExpr) -> SymExpr {
        let l = self;
        let bits = l.bits() + r.bits();

        match (&*l, &*r) {
            (Expr::Val(lv), Expr::Val(rv)) if bits <= 64 => {
                Self::val(Const::new((lv.value() << rv.bits()) | rv.value(), bits))
            }
            (Expr::Extract(le, llsb, lmsb), Expr::Extract(re, rlsb, rmsb))
                if le == re && *rmsb == *llsb =>
            {
                le.clone().extract(*rlsb, *lmsb)
            }
            _ => EXPR.mk(Expr::Concat(l, r)).into(),
        }
    }

    pub fn zero_extend(self, bits: u32) -> SymExpr {
        assert!(bits >= self.bits());

        if bits == self.bits() {
            self
        } else if let (Expr::Val(c), true) = (&*self, bits <= 64) {
            Self::val(Const::new(c.value(), bits))
        } else {
            EXPR.mk(Expr::ZeroExtend(self, bits)).into()
        }
    }

    pub fn sign_extend(self, bits: u32) -> SymExpr {
        assert!(bits >= self.bits());

        if bits == self.bits() {
            self
        } else if let (Expr::Val(c), true) = (&*self, bits <= 64) {
            Self::val(Const::new(c.signed_value() as u64, bits))
        } else {
            EXPR.mk(Expr::SignExtend(self, bits)).into()
        }
    }

    pub fn bits(&self) -> u32 {
        match &**self {
            Expr::Val(c) => c.bits(),
            Expr::Var(v) => v.bits(),
            Expr::Ref(_, bits) => *bits,
            Expr::UnOp(_, v) | Expr::BinOp(_, v, _) => v.bits(),
            Expr::BinRel(_, _, _) => 1,
            Expr::IfElse(_, t, _) => t.bits(),
            Expr::Extract(_, lsb, msb) => msb - lsb,
            Expr::Concat(l, r) => l.bits() + r.bits(),
            Expr::ZeroExtend(_, bits) | Expr::SignExtend(_, bits) => *bits,
        }
    }

    pub fn as_const(&self) -> Option<Const> {
        if let Expr::Val(c) = &**self {
            Some(*c)
        } else {
            None
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(&**self, Expr::Val(c) if c.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(&**self, Expr::Val(c) if c.is_one())
    }

    pub fn is_ones(&self) -> bool {
        matches!(&**self, Expr::Val(c) if c.is_ones())
    }

    /// Symbolic elements this expression reads, in first-seen order.
    pub fn references(&self) -> Vec<ElementId> {
        let mut seen = HashSet::default();
        let mut refs = Vec::new();
        let mut stack = vec![self];

        while let Some(expr) = stack.pop() {
            match &**expr {
                Expr::Val(_) | Expr::Var(_) => (),
                Expr::Ref(id, _) => {
                    if seen.insert(*id) {
                        refs.push(*id);
                    }
                }
                Expr::UnOp(_, e)
                | Expr::Extract(e, _, _)
                | Expr::ZeroExtend(e, _)
                | Expr::SignExtend(e, _) => stack.push(e),
                Expr::BinOp(_, l, r) | Expr::BinRel(_, l, r) | Expr::Concat(l, r) => {
                    stack.push(r);
                    stack.push(l);
                }
                Expr::IfElse(c, t, e) => {
                    stack.push(e);
                    stack.push(t);
                    stack.push(c);
                }
            }
        }

        refs
    }
}

impl Add for &'_ SymExpr {
    type Output = SymExpr;

    fn add(self, rhs: Self) -> Self::Output {
        SymExpr::add(self.clone(), rhs.clone())
    }
}

impl Add for SymExpr {
    type Output = SymExpr;

    fn add(self, rhs: Self) -> Self::Output {
        SymExpr::add(self, rhs)
    }
}

impl Sub for &'_ SymExpr {
    type Output = SymExpr;

    fn sub(self, rhs: Self) -> Self::Output {
        SymExpr::sub(self.clone(), rhs.clone())
    }
}

impl Sub for SymExpr {
    type Output = SymExpr;

    fn sub(self, rhs: Self) -> Self::Output {
        SymExpr::sub(self, rhs)
    }
}

impl Mul for SymExpr {
    type Output = SymExpr;

    fn mul(self, rhs: Self) -> Self::Output {
        SymExpr::mul(self, rhs)
    }
}

impl BitAnd for &'_ SymExpr {
    type Output = SymExpr;

    fn bitand(self, rhs: Self) -> Self::Output {
        SymExpr::and(self.clone(), rhs.clone())
    }
}

impl BitAnd for SymExpr {
    type Output = SymExpr;

    fn bitand(self, rhs: Self) -> Self::Output {
        SymExpr::and(self, rhs)
    }
}

impl BitOr for SymExpr {
    type Output = SymExpr;

    fn bitor(self, rhs: Self) -> Self::Output {
        SymExpr::or(self, rhs)
    }
}

impl BitXor for &'_ SymExpr {
    type Output = SymExpr;

    fn bitxor(self, rhs: Self) -> Self::Output {
        SymExpr::xor(self.clone(), rhs.clone())
    }
}

impl BitXor for SymExpr {
    type Output = SymExpr;

    fn bitxor(self, rhs: Self) -> Self::Output {
        SymExpr::xor(self, rhs)
    }
}

impl Neg for SymExpr {
    type Output = SymExpr;

    fn neg(self) -> Self::Output {
        SymExpr::neg(self)
    }
}

impl Not for SymExpr {
    type Output = SymExpr;

    fn not(self) -> Self::Output {
        SymExpr::not(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_is_hash_consed() {
        let rsp = SymExpr::var(Var::Register(Register::Rsp));
        let a = SymExpr::add(rsp.clone(), SymExpr::bv(8, 64));
        let b = SymExpr::add(rsp, SymExpr::bv(8, 64));

        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), "(bvadd init_rsp (_ bv8 64))");
    }

    #[test]
    fn constants_fold_with_wrapping() {
        let e = SymExpr::bv(u64::MAX, 64) + SymExpr::bv(2, 64);
        assert_eq!(e.as_const(), Some(Const::new(1, 64)));

        let e = SymExpr::bv(0xff, 8) + SymExpr::bv(1, 8);
        assert!(e.is_zero());

        let e = SymExpr::bv(0x80, 8).sign_extend(16);
        assert_eq!(e.as_const(), Some(Const::new(0xff80, 16)));
    }

    #[test]
    fn adjacent_extracts_collapse() {
        let r = SymExpr::reference(ElementId::new(7), 32);
        let bytes = (0..4)
            .map(|i| r.clone().extract(i * 8, i * 8 + 8))
            .collect::<Vec<_>>();

        let joined = bytes
            .into_iter()
            .reduce(|acc, byte| byte.concat(acc))
            .unwrap();

        assert_eq!(joined, r);
    }

    #[test]
    fn extract_through_concat_and_extend() {
        let hi = SymExpr::var(Var::Memory(0x11));
        let lo = SymExpr::var(Var::Memory(0x10));
        let word = hi.clone().concat(lo.clone());

        assert_eq!(word.clone().extract(0, 8), lo);
        assert_eq!(word.clone().extract(8, 16), hi);
        assert_eq!(word.clone().zero_extend(64).extract_low(16), word);
        assert_eq!(word.bits(), 16);
    }

    #[test]
    fn relations_are_single_bit() {
        let x = SymExpr::var(Var::Register(Register::Rax));
        let zf = x.clone().eq(SymExpr::bv(0, 64));

        assert_eq!(zf.bits(), 1);
        assert_eq!(
            zf.to_string(),
            "(ite (= init_rax (_ bv0 64)) (_ bv1 1) (_ bv0 1))"
        );
        assert_eq!(x.clone().eq(x).as_const(), Some(Const::from_bool(true)));
    }

    #[test]
    fn references_are_deduplicated() {
        let a = SymExpr::reference(ElementId::new(1), 64);
        let b = SymExpr::reference(ElementId::new(2), 64);
        let e = (&a + &b) ^ a.clone();

        assert_eq!(e.references(), vec![ElementId::new(1), ElementId::new(2)]);
    }
}
