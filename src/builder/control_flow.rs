use crate::element::SymbolicElement;
use crate::processor::{Error, Transaction};
use crate::register::Register;
use crate::smt::bv;

/// The program-counter update ending every lifted instruction.
///
/// The fall-through address is a constant, so the element is never tainted
/// whatever the instruction read.
pub fn rip(tx: &mut Transaction<'_>, next_address: u64) -> Result<SymbolicElement, Error> {
    let pc = Register::PROGRAM_COUNTER;
    let mut se = tx
        .create_reg_se(bv(next_address, pc.bits()), pc)?
        .with_comment("Program counter");
    se.set_taint(false);
    Ok(se)
}
