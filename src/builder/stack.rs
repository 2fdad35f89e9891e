use crate::element::SymbolicElement;
use crate::expr::SymExpr;
use crate::processor::{Error, Transaction};
use crate::register::Register;
use crate::smt::{bv, bvadd, bvsub};

/// The stack pointer as it was before an instruction touched the stack.
pub(crate) struct StackPointer {
    value: SymExpr,
    tainted: bool,
}

impl StackPointer {
    pub(crate) fn capture(tx: &Transaction<'_>) -> Self {
        let sp = Register::STACK_POINTER;
        Self {
            value: tx.register_value(sp),
            tainted: tx.is_reg_tainted(sp),
        }
    }
}

/// `rsp := rsp + size`, after a value has been popped.
pub(crate) fn release(
    tx: &mut Transaction<'_>,
    sp: StackPointer,
    size: usize,
) -> Result<SymbolicElement, Error> {
    adjust(tx, sp, size, bvadd)
}

/// `rsp := rsp - size`, after a value has been pushed.
pub(crate) fn reserve(
    tx: &mut Transaction<'_>,
    sp: StackPointer,
    size: usize,
) -> Result<SymbolicElement, Error> {
    adjust(tx, sp, size, bvsub)
}

fn adjust(
    tx: &mut Transaction<'_>,
    sp: StackPointer,
    size: usize,
    op: fn(SymExpr, SymExpr) -> SymExpr,
) -> Result<SymbolicElement, Error> {
    let register = Register::STACK_POINTER;
    let offset = bv(size as u64, register.bits());

    let mut se = tx
        .create_reg_se(op(sp.value, offset), register)?
        .with_comment("Aligns stack");

    // only the pre-instruction pointer, never the moved value
    se.set_taint(sp.tainted);

    Ok(se)
}
