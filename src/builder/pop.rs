use super::stack::{self, StackPointer};
use super::{same_width, Semantics};

use crate::inst::Inst;
use crate::operand::Operand;
use crate::processor::{Error, Transaction};
use crate::register::Register;

/// `pop`: loads the value at the top of the stack into the destination, then
/// releases the popped width.
///
/// Operands are `[destination, stack slot]`, where the stack slot is the
/// memory operand `[rsp]` resolved by the decoder. A popped value has no
/// immediate or operand-less form.
pub const POP: Semantics = Semantics::new("pop").reg(reg).mem(mem);

fn reg(tx: &mut Transaction<'_>, operands: &[Operand], inst: &mut Inst) -> Result<(), Error> {
    let dst = tx.register_operand(operands, 0)?;
    let src = tx.memory_operand(operands, 1)?;
    same_width(src.size, dst.size)?;

    let sp = StackPointer::capture(tx);
    let prior = tx.is_reg_tainted(dst.register);

    let expr = tx.build_symbolic_mem_operand(src.address, src.size)?;
    let mut se = tx.create_reg_se(expr, dst.register)?;
    se.or_taint(prior);
    tx.assignment_spread_taint_mem_reg(&mut se, src.address, dst.register, src.size);
    inst.add_element(se);

    // `pop rsp` leaves the popped value in place of the incremented pointer
    if dst.register != Register::STACK_POINTER {
        inst.add_element(stack::release(tx, sp, src.size)?);
    }

    Ok(())
}

fn mem(tx: &mut Transaction<'_>, operands: &[Operand], inst: &mut Inst) -> Result<(), Error> {
    let dst = tx.memory_operand(operands, 0)?;
    let src = tx.memory_operand(operands, 1)?;
    same_width(src.size, dst.size)?;

    let sp = StackPointer::capture(tx);

    let expr = tx.build_symbolic_mem_operand(src.address, src.size)?;
    let mut se = tx.create_mem_se(expr, dst.address)?;
    tx.assignment_spread_taint_mem_mem(&mut se, dst.address, src.address, src.size);
    inst.add_element(se);

    inst.add_element(stack::release(tx, sp, src.size)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::builder::{Error as LiftError, Lifter, OperandShape};
    use crate::expr::{SymExpr, Var};
    use crate::operand::{DecodedInst, ThreadId};
    use crate::processor::Session;
    use crate::smt::{bv, bvadd};

    fn pop_rax() -> DecodedInst {
        DecodedInst::new(ThreadId(0), 0x401000, "pop rax")
            .with_operands([
                Operand::register(Register::Rax, 8),
                Operand::memory(0x1000, 8),
            ])
            .with_length(1)
    }

    #[test]
    fn pop_register_from_tainted_stack() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.concretize_register(Register::Rsp, 0x1000);
        ap.taint_memory(0x1000, 8);

        let inst = Lifter::x86_64().lift(&mut ap, &pop_rax()).unwrap();
        let elements = inst.elements();
        assert_eq!(elements.len(), 3);

        let primary = &elements[0];
        assert_eq!(primary.destination().register(), Some(Register::Rax));
        assert!(primary.is_tainted());
        assert_eq!(
            primary.expression(),
            &SymExpr::var(Var::Memory(0x1007))
                .concat(SymExpr::var(Var::Memory(0x1006)))
                .concat(SymExpr::var(Var::Memory(0x1005)))
                .concat(SymExpr::var(Var::Memory(0x1004)))
                .concat(SymExpr::var(Var::Memory(0x1003)))
                .concat(SymExpr::var(Var::Memory(0x1002)))
                .concat(SymExpr::var(Var::Memory(0x1001)))
                .concat(SymExpr::var(Var::Memory(0x1000)))
        );

        let align = &elements[1];
        assert_eq!(align.destination().register(), Some(Register::Rsp));
        assert_eq!(align.expression(), &bv(0x1008, 64));
        assert_eq!(align.comment(), Some("Aligns stack"));
        assert!(!align.is_tainted());

        assert!(elements[2].destination().is_control_flow());
        assert_eq!(elements[2].expression(), &bv(0x401001, 64));

        assert!(ap.is_reg_tainted(Register::Rax));
        assert!(!ap.is_reg_tainted(Register::Rsp));
        assert_eq!(ap.register_expr(Register::Rax), primary.reference());
        assert_eq!(ap.number_of_expressions(), 3);
    }

    #[test]
    fn pop_symbolic_stack_pointer() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.taint_register(Register::Rsp);

        let inst = Lifter::x86_64().lift(&mut ap, &pop_rax()).unwrap();
        let align = &inst.elements()[1];

        assert_eq!(
            align.expression(),
            &bvadd(SymExpr::var(Var::Register(Register::Rsp)), bv(8, 64))
        );
        assert!(align.is_tainted());
        assert!(!inst.elements()[0].is_tainted());
        assert_eq!(align.to_string(), format!("{} = (bvadd init_rsp (_ bv8 64)) ; Aligns stack", align.id()));
    }

    #[test]
    fn pop_memory_destination() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.concretize_register(Register::Rsp, 0x1000);
        ap.concretize_memory(0x1000, &[0xef, 0xbe]);
        ap.taint_memory(0x1001, 1);

        let inst = DecodedInst::new(ThreadId(0), 0x401000, "pop word [rbx]")
            .with_operands([Operand::memory(0x8000, 2), Operand::memory(0x1000, 2)])
            .with_length(3);

        let inst = Lifter::x86_64().lift(&mut ap, &inst).unwrap();
        let primary = &inst.elements()[0];

        assert_eq!(primary.expression(), &bv(0xbeef, 16));
        assert!(primary.is_tainted());
        assert!(!ap.is_mem_tainted(0x8000, 1));
        assert!(ap.is_mem_tainted(0x8001, 1));
        assert_eq!(ap.memory_expr(0x8000, 2), Some(primary.reference()));
        assert_eq!(inst.elements()[1].expression(), &bv(0x1002, 64));
        assert!(!inst.elements()[1].is_tainted());
        assert!(!ap.is_reg_tainted(Register::Rsp));
    }

    #[test]
    fn pop_keeps_prior_destination_taint() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.concretize_register(Register::Rsp, 0x1000);
        ap.taint_register(Register::Rax);

        let inst = Lifter::x86_64().lift(&mut ap, &pop_rax()).unwrap();

        assert!(inst.elements()[0].is_tainted());
        assert!(!inst.elements()[1].is_tainted());
        assert!(ap.is_reg_tainted(Register::Rax));
        assert!(!ap.is_mem_tainted(0x1000, 8));
    }

    #[test]
    fn pop_into_stack_pointer_keeps_popped_value() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.concretize_register(Register::Rsp, 0x1000);
        ap.concretize_memory(0x1000, &0x5000u64.to_le_bytes());
        ap.taint_memory(0x1000, 8);

        let inst = DecodedInst::new(ThreadId(0), 0x401000, "pop rsp")
            .with_operands([
                Operand::register(Register::Rsp, 8),
                Operand::memory(0x1000, 8),
            ])
            .with_length(1);

        let inst = Lifter::x86_64().lift(&mut ap, &inst).unwrap();
        let elements = inst.elements();
        assert_eq!(elements.len(), 2);

        assert_eq!(elements[0].destination().register(), Some(Register::Rsp));
        assert_eq!(elements[0].expression(), &bv(0x5000, 64));
        assert!(elements[0].is_tainted());
        assert!(elements[1].destination().is_control_flow());

        assert_eq!(ap.register_expr(Register::Rsp), elements[0].reference());
        assert!(ap.is_reg_tainted(Register::Rsp));
    }

    #[test]
    fn stack_adjustment_ignores_popped_taint() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.concretize_register(Register::Rsp, 0x1000);
        ap.taint_memory(0x1000, 8);

        let inst = DecodedInst::new(ThreadId(0), 0x401000, "pop qword [rbx]")
            .with_operands([Operand::memory(0x8000, 8), Operand::memory(0x1000, 8)])
            .with_length(2);

        let inst = Lifter::x86_64().lift(&mut ap, &inst).unwrap();

        assert!(inst.elements()[0].is_tainted());
        assert!(ap.is_mem_tainted(0x8000, 8));
        assert!(!inst.elements()[1].is_tainted());
        assert_eq!(inst.elements()[1].expression(), &bv(0x1008, 64));
    }

    #[test]
    fn pop_immediate_is_rejected_without_side_effects() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.concretize_register(Register::Rsp, 0x1000);

        let inst = DecodedInst::new(ThreadId(0), 0x401000, "pop 1")
            .with_operands([Operand::immediate(1, 8), Operand::memory(0x1000, 8)])
            .with_length(2);

        assert!(matches!(
            Lifter::x86_64().lift(&mut ap, &inst),
            Err(LiftError::UnsupportedOperandShape {
                shape: OperandShape::ImmediateOperand,
                ..
            })
        ));

        let inst = DecodedInst::new(ThreadId(0), 0x401000, "pop")
            .with_operands([])
            .with_length(1);

        assert!(matches!(
            Lifter::x86_64().lift(&mut ap, &inst),
            Err(LiftError::UnsupportedOperandShape {
                shape: OperandShape::NoOperand,
                ..
            })
        ));

        assert_eq!(ap.register_expr(Register::Rsp), bv(0x1000, 64));
        assert_eq!(ap.register_expr(Register::Rip), SymExpr::var(Var::Register(Register::Rip)));
        assert_eq!(ap.number_of_expressions(), 0);
    }

    #[test]
    fn pop_width_mismatch_is_an_invalid_operand() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();

        let inst = DecodedInst::new(ThreadId(0), 0x401000, "pop ax")
            .with_operands([Operand::register(Register::Rax, 2), Operand::memory(0x1000, 8)])
            .with_length(2);

        assert!(matches!(
            Lifter::x86_64().lift(&mut ap, &inst),
            Err(LiftError::InvalidOperand {
                source: Error::SizeMismatch { read: 8, write: 2 },
                ..
            })
        ));
    }
}
