use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use fugue_symtaint::builder::Lifter;
use fugue_symtaint::operand::{DecodedInst, Operand, ThreadId};
use fugue_symtaint::processor::Session;
use fugue_symtaint::register::Register;

fn pop_rax() -> DecodedInst {
    DecodedInst::new(ThreadId(0), 0x400000, "pop rax")
        .with_operands([Operand::register(Register::Rax, 8), Operand::memory(0x1000, 8)])
        .with_length(1)
}

fn add_rax_rbx() -> DecodedInst {
    DecodedInst::new(ThreadId(0), 0x400000, "add rax, rbx")
        .with_operands([Operand::register(Register::Rax, 8), Operand::register(Register::Rbx, 8)])
        .with_length(3)
}

fn lift(c: &mut Criterion) {
    let lifter = Lifter::x86_64();

    for (name, inst) in [("pop_reg", pop_rax()), ("add_reg_reg", add_rax_rbx())] {
        c.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let session = Session::new();
                    session.processor(ThreadId(0)).map(|mut ap| {
                        ap.concretize_register(Register::Rsp, 0x1000);
                        ap.taint_memory(0x1000, 8);
                        ap
                    })
                },
                |ap| {
                    let mut ap = ap.expect("failed to create processor");
                    lifter
                        .lift(&mut ap, &inst)
                        .expect("failed to lift instruction")
                },
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, lift);
criterion_main!(benches);
