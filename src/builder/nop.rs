use super::Semantics;

use crate::inst::Inst;
use crate::operand::Operand;
use crate::processor::{Error, Transaction};

/// `nop`: no effect besides the program counter update.
///
/// The multi-byte encodings carry a register or memory operand that is
/// never accessed.
pub const NOP: Semantics = Semantics::new("nop").reg(ignore).mem(ignore).none(ignore);

fn ignore(_tx: &mut Transaction<'_>, _operands: &[Operand], _inst: &mut Inst) -> Result<(), Error> {
    Ok(())
}
