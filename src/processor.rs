use std::mem;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::Arc;

use fnv::FnvHashSet as HashSet;

use log::trace;

use parking_lot::{Mutex, MutexGuard};

use thiserror::Error;

use crate::config::{Config, UnknownMemory};
use crate::element::{Destination, ElementId, SymbolicElement};
use crate::expr::SymExpr;
use crate::operand::{
    ImmediateOperand, MemoryOperand, Operand, OperandKind, RegisterOperand, SourceOperand,
    ThreadId,
};
use crate::register::Register;
use crate::state::{RegisterFile, SharedMemory};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid register identifier {0}")]
    InvalidRegister(u64),
    #[error("invalid access of {size} bytes to register {register}")]
    InvalidRegisterSize { register: Register, size: usize },
    #[error("flag {0} cannot be used as an instruction operand")]
    FlagOperand(Register),
    #[error("missing operand {0}")]
    MissingOperand(usize),
    #[error("operand {index} is {found}; expected {expected}")]
    OperandKind {
        index: usize,
        expected: OperandKind,
        found: OperandKind,
    },
    #[error("memory access of {size} bytes at {address:#x} is outside of the address space")]
    AddressOutOfRange { address: u64, size: usize },
    #[error("unsupported operand size of {0} bytes; maximum supported is {1} bytes")]
    UnsupportedOperandSize(usize, usize),
    #[error("read of untracked memory at {0:#x}")]
    UntrackedMemory(u64),
    #[error("operand width mismatch: {read} bytes read, {write} bytes written")]
    SizeMismatch { read: usize, write: usize },
    #[error("thread {0} already has a live processor")]
    ThreadInUse(ThreadId),
}

#[derive(Debug)]
struct Shared {
    config: Config,
    memory: Mutex<SharedMemory>,
    elements: AtomicU64,
    expressions: AtomicU64,
    threads: Mutex<HashSet<ThreadId>>,
}

/// An analysis session: the lifetime of one analysed process.
///
/// Owns everything shared between the threads of the target: memory
/// (symbolic bytes and taint) behind a single lock, the element id
/// allocator and the statistics counter. Each target thread is lifted
/// through its own [`AnalysisProcessor`].
#[derive(Debug, Clone)]
pub struct Session(Arc<Shared>);

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::new_with(Config::default())
    }

    pub fn new_with(config: Config) -> Self {
        Self(Arc::new(Shared {
            config,
            memory: Mutex::new(SharedMemory::default()),
            elements: AtomicU64::new(0),
            expressions: AtomicU64::new(0),
            threads: Mutex::new(HashSet::default()),
        }))
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    /// Creates the processor for `thread_id`. At most one processor per
    /// thread is live at any time.
    pub fn processor(&self, thread_id: ThreadId) -> Result<AnalysisProcessor, Error> {
        if !self.0.threads.lock().insert(thread_id) {
            return Err(Error::ThreadInUse(thread_id));
        }

        Ok(AnalysisProcessor {
            thread_id,
            session: self.clone(),
            registers: RegisterFile::default(),
        })
    }

    /// Total symbolic expressions produced by committed lifts.
    pub fn number_of_expressions(&self) -> u64 {
        self.0.expressions.load(SeqCst)
    }

    pub fn with_memory<R, F: FnOnce(&SharedMemory) -> R>(&self, f: F) -> R {
        f(&self.0.memory.lock())
    }
}

/// Symbolic and taint state of a single analysed thread.
#[derive(Debug)]
pub struct AnalysisProcessor {
    thread_id: ThreadId,
    session: Session,
    registers: RegisterFile,
}

impl Drop for AnalysisProcessor {
    fn drop(&mut self) {
        self.session.0.threads.lock().remove(&self.thread_id);
    }
}

impl AnalysisProcessor {
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Opens a transaction for lifting one instruction. The shared memory
    /// stays locked until the transaction is committed or dropped.
    pub fn begin(&mut self) -> Transaction<'_> {
        let shared = &*self.session.0;
        Transaction {
            thread_id: self.thread_id,
            config: &shared.config,
            registers: &mut self.registers,
            memory: shared.memory.lock(),
            elements: &shared.elements,
            journal: Vec::new(),
            read_taint: false,
            committed: false,
        }
    }

    pub fn inc_number_of_expressions(&self, count: usize) {
        self.session.0.expressions.fetch_add(count as u64, SeqCst);
    }

    pub fn number_of_expressions(&self) -> u64 {
        self.session.number_of_expressions()
    }

    pub fn register_expr(&self, register: Register) -> SymExpr {
        self.registers.read(register)
    }

    pub fn memory_expr(&self, address: u64, size: usize) -> Option<SymExpr> {
        self.session.0.memory.lock().symbolic.read_expr(address, size)
    }

    pub fn is_reg_tainted(&self, register: Register) -> bool {
        self.registers.taint.is_tainted(register)
    }

    pub fn is_mem_tainted(&self, address: u64, size: usize) -> bool {
        self.session.0.memory.lock().taint.is_tainted(address, size)
    }

    pub fn taint_register(&mut self, register: Register) {
        self.registers.taint.set(register, true);
    }

    pub fn untaint_register(&mut self, register: Register) {
        self.registers.taint.set(register, false);
    }

    pub fn taint_memory(&self, address: u64, size: usize) {
        self.set_memory_taint(address, size, true)
    }

    pub fn untaint_memory(&self, address: u64, size: usize) {
        self.set_memory_taint(address, size, false)
    }

    fn set_memory_taint(&self, address: u64, size: usize, tainted: bool) {
        let mut memory = self.session.0.memory.lock();
        for i in 0..size as u64 {
            memory.taint.set_byte(address.wrapping_add(i), tainted);
        }
    }

    /// Binds `register` to a concrete value without producing an element.
    pub fn concretize_register(&mut self, register: Register, value: u64) {
        self.registers
            .bind(register, Some(SymExpr::bv(value, register.bits())));
    }

    /// Stores concrete bytes without producing an element.
    pub fn concretize_memory(&self, address: u64, bytes: &[u8]) {
        self.session.0.memory.lock().symbolic.write_bytes(address, bytes);
    }
}

#[derive(Debug)]
enum Undo {
    Register(Register, Option<SymExpr>),
    RegisterTaint(Register, bool),
    Memory(u64, Option<SymExpr>),
    MemoryTaint(u64, bool),
}

/// The processor as seen by instruction semantics while lifting one
/// instruction.
///
/// Element taint at creation is the OR of the taint of every location read
/// through the transaction since the previous element was created. Taint
/// spreading only ever adds taint to a destination.
///
/// Dropping an uncommitted transaction restores every register binding,
/// memory byte and taint bit it changed.
pub struct Transaction<'a> {
    thread_id: ThreadId,
    config: &'a Config,
    registers: &'a mut RegisterFile,
    memory: MutexGuard<'a, SharedMemory>,
    elements: &'a AtomicU64,
    journal: Vec<Undo>,
    read_taint: bool,
    committed: bool,
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

impl<'a> Transaction<'a> {
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn commit(mut self) {
        trace!(
            "thread {}: committing {} state changes",
            self.thread_id,
            self.journal.len()
        );
        self.journal.clear();
        self.committed = true;
    }

    fn rollback(&mut self) {
        let journal = mem::take(&mut self.journal);
        if journal.is_empty() {
            return;
        }

        trace!(
            "thread {}: rolling back {} state changes",
            self.thread_id,
            journal.len()
        );

        for undo in journal.into_iter().rev() {
            match undo {
                Undo::Register(register, expr) => {
                    self.registers.bind(register, expr);
                }
                Undo::RegisterTaint(register, tainted) => {
                    self.registers.taint.set(register, tainted);
                }
                Undo::Memory(address, expr) => {
                    self.memory.symbolic.set_byte(address, expr);
                }
                Undo::MemoryTaint(address, tainted) => {
                    self.memory.taint.set_byte(address, tainted);
                }
            }
        }
    }

    fn operand(operands: &[Operand], index: usize) -> Result<&Operand, Error> {
        operands.get(index).ok_or(Error::MissingOperand(index))
    }

    fn check_size(&self, size: usize) -> Result<(), Error> {
        let limit = self.config.operand_size_limit();
        if size == 0 || size > limit {
            Err(Error::UnsupportedOperandSize(size, limit))
        } else {
            Ok(())
        }
    }

    fn check_register(&self, register: Register, size: usize) -> Result<(), Error> {
        if register.is_flag() {
            return Err(Error::FlagOperand(register));
        }

        self.check_size(size)?;

        if matches!(size, 1 | 2 | 4 | 8) && size <= register.bytes() {
            Ok(())
        } else {
            Err(Error::InvalidRegisterSize { register, size })
        }
    }

    fn check_memory(&self, address: u64, size: usize) -> Result<(), Error> {
        self.check_size(size)?;

        if self.config.contains(address, size) {
            Ok(())
        } else {
            Err(Error::AddressOutOfRange { address, size })
        }
    }

    pub fn register_operand(
        &self,
        operands: &[Operand],
        index: usize,
    ) -> Result<RegisterOperand, Error> {
        let operand = Self::operand(operands, index)?;
        if operand.kind() != OperandKind::Register {
            return Err(Error::OperandKind {
                index,
                expected: OperandKind::Register,
                found: operand.kind(),
            });
        }

        let register =
            Register::from_id(operand.value()).ok_or(Error::InvalidRegister(operand.value()))?;
        self.check_register(register, operand.size())?;

        Ok(RegisterOperand {
            register,
            size: operand.size(),
        })
    }

    pub fn memory_operand(
        &self,
        operands: &[Operand],
        index: usize,
    ) -> Result<MemoryOperand, Error> {
        let operand = Self::operand(operands, index)?;
        if operand.kind() != OperandKind::Memory {
            return Err(Error::OperandKind {
                index,
                expected: OperandKind::Memory,
                found: operand.kind(),
            });
        }

        self.check_memory(operand.value(), operand.size())?;

        Ok(MemoryOperand {
            address: operand.value(),
            size: operand.size(),
        })
    }

    pub fn immediate_operand(
        &self,
        operands: &[Operand],
        index: usize,
    ) -> Result<ImmediateOperand, Error> {
        let operand = Self::operand(operands, index)?;
        if operand.kind() != OperandKind::Immediate {
            return Err(Error::OperandKind {
                index,
                expected: OperandKind::Immediate,
                found: operand.kind(),
            });
        }

        self.check_size(operand.size())?;

        Ok(ImmediateOperand {
            value: operand.value(),
            size: operand.size(),
        })
    }

    /// Resolves a readable operand of any kind.
    pub fn source_operand(
        &self,
        operands: &[Operand],
        index: usize,
    ) -> Result<SourceOperand, Error> {
        match Self::operand(operands, index)?.kind() {
            OperandKind::Register => self
                .register_operand(operands, index)
                .map(SourceOperand::Register),
            OperandKind::Memory => self
                .memory_operand(operands, index)
                .map(SourceOperand::Memory),
            OperandKind::Immediate => self
                .immediate_operand(operands, index)
                .map(SourceOperand::Immediate),
            OperandKind::None => Err(Error::MissingOperand(index)),
        }
    }

    /// The current value of `register`, truncated to `size` bytes.
    pub fn build_symbolic_reg_operand(
        &mut self,
        register: Register,
        size: usize,
    ) -> Result<SymExpr, Error> {
        let expr = self.registers.read(register);
        let bits = if register.is_flag() {
            1
        } else {
            self.check_register(register, size)?;
            size as u32 * 8
        };

        self.read_taint |= self.registers.taint.is_tainted(register);

        Ok(expr.extract_low(bits))
    }

    /// The current value of the `size` bytes at `address`.
    pub fn build_symbolic_mem_operand(
        &mut self,
        address: u64,
        size: usize,
    ) -> Result<SymExpr, Error> {
        self.check_memory(address, size)?;

        if self.config.unknown_memory == UnknownMemory::Reject {
            if let Some(untracked) = self.memory.symbolic.untracked(address, size) {
                return Err(Error::UntrackedMemory(untracked));
            }
        }

        let expr = self
            .memory
            .symbolic
            .read_expr(address, size)
            .ok_or(Error::UnsupportedOperandSize(size, self.config.operand_size_limit()))?;

        self.read_taint |= self.memory.taint.is_tainted(address, size);

        Ok(expr)
    }

    pub fn build_symbolic_imm_operand(&self, value: u64, size: usize) -> Result<SymExpr, Error> {
        self.check_size(size)?;
        Ok(SymExpr::bv(value, size as u32 * 8))
    }

    pub fn build_symbolic_operand(&mut self, operand: &SourceOperand) -> Result<SymExpr, Error> {
        match operand {
            SourceOperand::Register(op) => self.build_symbolic_reg_operand(op.register, op.size),
            SourceOperand::Memory(op) => self.build_symbolic_mem_operand(op.address, op.size),
            SourceOperand::Immediate(op) => self.build_symbolic_imm_operand(op.value, op.size),
        }
    }

    fn next_element_id(&self) -> ElementId {
        ElementId::new(self.elements.fetch_add(1, SeqCst))
    }

    /// Binds `expr` as the new value of `register`.
    ///
    /// Narrower writes follow x86-64: 32-bit values zero-extend, 8 and 16-bit
    /// values keep the untouched upper bits of the register.
    pub fn create_reg_se(
        &mut self,
        expr: SymExpr,
        register: Register,
    ) -> Result<SymbolicElement, Error> {
        let bits = expr.bits();
        let full = register.bits();

        let value = if bits == full {
            expr
        } else if bits == 32 && full == 64 {
            expr.zero_extend(full)
        } else if (bits == 8 || bits == 16) && full == 64 {
            self.registers.read(register).extract(bits, full).concat(expr)
        } else {
            return Err(Error::InvalidRegisterSize {
                register,
                size: (bits / 8) as usize,
            });
        };

        let id = self.next_element_id();
        let tainted = mem::take(&mut self.read_taint);
        let destination = Destination::Register {
            register,
            bits: full,
        };

        let se = SymbolicElement::new(id, destination, value, tainted);

        trace!("thread {}: {} ({})", self.thread_id, se, register);

        let previous = self.registers.bind(register, Some(se.reference()));
        self.journal.push(Undo::Register(register, previous));

        Ok(se)
    }

    /// Binds `expr` as the new value of the bytes starting at `address`.
    pub fn create_mem_se(
        &mut self,
        expr: SymExpr,
        address: u64,
    ) -> Result<SymbolicElement, Error> {
        let bits = expr.bits();
        let size = (bits / 8) as usize;

        if bits % 8 != 0 {
            return Err(Error::UnsupportedOperandSize(size, self.config.operand_size_limit()));
        }

        self.check_memory(address, size)?;

        let id = self.next_element_id();
        let tainted = mem::take(&mut self.read_taint);
        let destination = Destination::Memory { address, size };

        let se = SymbolicElement::new(id, destination, expr, tainted);

        trace!("thread {}: {} ([{:#x}])", self.thread_id, se, address);

        let previous = self.memory.symbolic.write_expr(address, &se.reference());
        self.journal.extend(
            previous
                .into_iter()
                .enumerate()
                .map(|(i, expr)| Undo::Memory(address.wrapping_add(i as u64), expr)),
        );

        Ok(se)
    }

    pub fn is_reg_tainted(&self, register: Register) -> bool {
        self.registers.taint.is_tainted(register)
    }

    pub fn is_mem_tainted(&self, address: u64, size: usize) -> bool {
        self.memory.taint.is_tainted(address, size)
    }

    /// The current full-width value of `register`. Unlike
    /// [`build_symbolic_reg_operand`](Self::build_symbolic_reg_operand) the
    /// read does not contribute to the taint of the next element.
    pub fn register_value(&self, register: Register) -> SymExpr {
        self.registers.read(register)
    }

    fn taint_register(&mut self, register: Register) {
        let previous = self.registers.taint.set(register, true);
        if !previous {
            self.journal.push(Undo::RegisterTaint(register, previous));
        }
    }

    fn taint_memory_byte(&mut self, address: u64) {
        let previous = self.memory.taint.set_byte(address, true);
        if !previous {
            self.journal.push(Undo::MemoryTaint(address, previous));
        }
    }

    /// ORs the taint of the `size` bytes at `src` into `dst` and `se`.
    pub fn assignment_spread_taint_mem_reg(
        &mut self,
        se: &mut SymbolicElement,
        src: u64,
        dst: Register,
        size: usize,
    ) {
        let tainted = self.is_mem_tainted(src, size);
        if tainted {
            self.taint_register(dst);
        }
        se.or_taint(tainted);
    }

    /// ORs the taint of each byte at `src` into the matching byte at `dst`,
    /// and the taint of the whole source range into `se`.
    pub fn assignment_spread_taint_mem_mem(
        &mut self,
        se: &mut SymbolicElement,
        dst: u64,
        src: u64,
        size: usize,
    ) {
        let mut tainted = false;
        for i in 0..size as u64 {
            if self.memory.taint.is_byte_tainted(src.wrapping_add(i)) {
                self.taint_memory_byte(dst.wrapping_add(i));
                tainted = true;
            }
        }
        se.or_taint(tainted);
    }

    /// ORs the taint of `src` into `dst` and `se`.
    pub fn assignment_spread_taint_reg_reg(
        &mut self,
        se: &mut SymbolicElement,
        src: Register,
        dst: Register,
    ) {
        let tainted = self.is_reg_tainted(src);
        if tainted {
            self.taint_register(dst);
        }
        se.or_taint(tainted);
    }

    /// ORs the taint of `src` into the `size` bytes at `dst` and into `se`.
    pub fn assignment_spread_taint_reg_mem(
        &mut self,
        se: &mut SymbolicElement,
        src: Register,
        dst: u64,
        size: usize,
    ) {
        let tainted = self.is_reg_tainted(src);
        if tainted {
            for i in 0..size as u64 {
                self.taint_memory_byte(dst.wrapping_add(i));
            }
        }
        se.or_taint(tainted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::expr::Var;

    #[test]
    fn one_processor_per_thread() {
        let session = Session::new();
        let first = session.processor(ThreadId(1)).unwrap();

        assert!(matches!(
            session.processor(ThreadId(1)),
            Err(Error::ThreadInUse(ThreadId(1)))
        ));

        drop(first);
        assert!(session.processor(ThreadId(1)).is_ok());
    }

    #[test]
    fn element_taint_follows_reads() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.taint_memory(0x1000, 8);

        let mut tx = ap.begin();
        let value = tx.build_symbolic_mem_operand(0x1000, 8).unwrap();
        let se = tx.create_reg_se(value, Register::Rax).unwrap();
        assert!(se.is_tainted());

        let rbx = tx.build_symbolic_reg_operand(Register::Rbx, 8).unwrap();
        let se = tx.create_reg_se(rbx, Register::Rcx).unwrap();
        assert!(!se.is_tainted());
        tx.commit();
    }

    #[test]
    fn narrow_register_writes_merge() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.concretize_register(Register::Rax, 0x1122_3344_5566_7788);

        let mut tx = ap.begin();
        let se = tx
            .create_reg_se(SymExpr::bv(0xaabb, 16), Register::Rax)
            .unwrap();
        assert_eq!(se.expression(), &SymExpr::bv(0x1122_3344_5566_aabb, 64));

        let se = tx
            .create_reg_se(SymExpr::bv(0xdead_beef, 32), Register::Rbx)
            .unwrap();
        assert_eq!(se.expression(), &SymExpr::bv(0xdead_beef, 64));
        tx.commit();

        assert_eq!(ap.register_expr(Register::Rbx), se.reference());
    }

    #[test]
    fn dropped_transaction_restores_state() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.taint_register(Register::Rsi);

        {
            let mut tx = ap.begin();
            let rsi = tx.build_symbolic_reg_operand(Register::Rsi, 8).unwrap();
            let mut se = tx.create_mem_se(rsi, 0x2000).unwrap();
            tx.assignment_spread_taint_reg_mem(&mut se, Register::Rsi, 0x2000, 8);

            let mut se = tx.create_reg_se(SymExpr::bv(1, 64), Register::Rdi).unwrap();
            tx.assignment_spread_taint_reg_reg(&mut se, Register::Rsi, Register::Rdi);

            assert!(tx.is_mem_tainted(0x2000, 8));
            assert!(tx.is_reg_tainted(Register::Rdi));
        }

        assert!(!ap.is_mem_tainted(0x2000, 8));
        assert!(!ap.is_reg_tainted(Register::Rdi));
        assert_eq!(
            ap.register_expr(Register::Rdi),
            SymExpr::var(Var::Register(Register::Rdi))
        );
        assert_eq!(
            ap.memory_expr(0x2000, 1),
            Some(SymExpr::var(Var::Memory(0x2000)))
        );
        session.with_memory(|memory| assert_eq!(memory.symbolic().number_of_pages(), 0));
    }

    #[test]
    fn strict_memory_rejects_untracked_reads() {
        let session = Session::new_with(Config::default().with_unknown_memory(UnknownMemory::Reject));
        let mut ap = session.processor(ThreadId(0)).unwrap();
        ap.concretize_memory(0x3000, &[1, 2, 3]);

        let mut tx = ap.begin();
        assert!(tx.build_symbolic_mem_operand(0x3000, 2).is_ok());
        assert!(matches!(
            tx.build_symbolic_mem_operand(0x3000, 4),
            Err(Error::UntrackedMemory(0x3003))
        ));
    }

    #[test]
    fn operand_resolution_validates_identifiers() {
        let session = Session::new();
        let mut ap = session.processor(ThreadId(0)).unwrap();
        let tx = ap.begin();

        let operands = [
            Operand::new(OperandKind::Register, 999, 8),
            Operand::register(Register::Rax, 3),
            Operand::register(Register::Zf, 1),
            Operand::memory(u64::MAX, 8),
        ];

        assert!(matches!(
            tx.register_operand(&operands, 0),
            Err(Error::InvalidRegister(999))
        ));
        assert!(matches!(
            tx.register_operand(&operands, 1),
            Err(Error::InvalidRegisterSize { .. })
        ));
        assert!(matches!(
            tx.register_operand(&operands, 2),
            Err(Error::FlagOperand(Register::Zf))
        ));
        assert!(matches!(
            tx.memory_operand(&operands, 3),
            Err(Error::AddressOutOfRange { .. })
        ));
        assert!(matches!(
            tx.memory_operand(&operands, 4),
            Err(Error::MissingOperand(4))
        ));
        assert!(matches!(
            tx.immediate_operand(&operands, 0),
            Err(Error::OperandKind { index: 0, .. })
        ));
    }
}
