use crate::expr::SymExpr;

pub fn bv(value: u64, bits: u32) -> SymExpr {
    SymExpr::bv(value, bits)
}

pub fn bvadd(l: SymExpr, r: SymExpr) -> SymExpr {
    SymExpr::add(l, r)
}

pub fn bvsub(l: SymExpr, r: SymExpr) -> SymExpr {
    SymExpr::sub(l, r)
}

pub fn bvand(l: SymExpr, r: SymExpr) -> SymExpr {
    SymExpr::and(l, r)
}

pub fn bvor(l: SymExpr, r: SymExpr) -> SymExpr {
    SymExpr::or(l, r)
}

pub fn bvxor(l: SymExpr, r: SymExpr) -> SymExpr {
    SymExpr::xor(l, r)
}

pub fn bvnot(e: SymExpr) -> SymExpr {
    SymExpr::not(e)
}

pub fn bvneg(e: SymExpr) -> SymExpr {
    SymExpr::neg(e)
}

pub fn bvult(l: SymExpr, r: SymExpr) -> SymExpr {
    l.ult(r)
}

/// `((_ extract high low) e)`; both bounds inclusive, as in SMT-LIB2.
pub fn extract(high: u32, low: u32, e: SymExpr) -> SymExpr {
    e.extract(low, high + 1)
}

pub fn concat(high: SymExpr, low: SymExpr) -> SymExpr {
    high.concat(low)
}

/// Zero-extends `e` by `bits` additional bits.
pub fn zx(bits: u32, e: SymExpr) -> SymExpr {
    let width = e.bits();
    e.zero_extend(width + bits)
}

/// Sign-extends `e` by `bits` additional bits.
pub fn sx(bits: u32, e: SymExpr) -> SymExpr {
    let width = e.bits();
    e.sign_extend(width + bits)
}

pub fn equal(l: SymExpr, r: SymExpr) -> SymExpr {
    l.eq(r)
}

pub fn ite(cond: SymExpr, texpr: SymExpr, fexpr: SymExpr) -> SymExpr {
    cond.ite(texpr, fexpr)
}
