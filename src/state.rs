use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use fnv::FnvHashMap as HashMap;

use itertools::Itertools;

use crate::expr::{SymExpr, Var};
use crate::register::Register;
use crate::taint::{MemoryTaint, RegisterTaint};

const PAGE_SIZE: usize = 4096;
const LAST_PAGE: u64 = u64::MAX / PAGE_SIZE as u64;

#[derive(Debug, Clone)]
#[repr(transparent)]
struct Page {
    expressions: Box<[Option<SymExpr>]>,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            expressions: vec![None; PAGE_SIZE].into_boxed_slice(),
        }
    }
}

impl Index<usize> for Page {
    type Output = Option<SymExpr>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.expressions[index]
    }
}

impl IndexMut<usize> for Page {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.expressions[index]
    }
}

impl Page {
    fn new() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.expressions.iter().all(Option::is_none)
    }
}

/// Flat symbolic memory, stored byte-wise in pages of optional expressions.
///
/// A byte with no tracked write reads as its initial-memory variable.
#[derive(Debug, Clone, Default)]
pub struct SymbolicMemory {
    pages: BTreeMap<u64, Page>,
}

impl SymbolicMemory {
    fn locate(address: u64) -> (u64, usize) {
        let page_size = PAGE_SIZE as u64;
        (address / page_size, (address % page_size) as usize)
    }

    pub fn byte(&self, address: u64) -> Option<&SymExpr> {
        let (page, offset) = Self::locate(address);
        self.pages.get(&page).and_then(|p| p[offset].as_ref())
    }

    /// Replaces the tracked expression of one byte, returning the previous one.
    pub fn set_byte(&mut self, address: u64, expr: Option<SymExpr>) -> Option<SymExpr> {
        let (page, offset) = Self::locate(address);
        match expr {
            Some(expr) => {
                let page = self.pages.entry(page).or_insert_with(Page::new);
                page[offset].replace(expr)
            }
            None => {
                let previous = self
                    .pages
                    .get_mut(&page)
                    .and_then(|p| p[offset].take());

                if self.pages.get(&page).map(Page::is_empty).unwrap_or(false) {
                    self.pages.remove(&page);
                }

                previous
            }
        }
    }

    pub fn is_tracked(&self, address: u64, length: usize) -> bool {
        (0..length as u64).all(|i| self.byte(address.wrapping_add(i)).is_some())
    }

    pub fn untracked(&self, address: u64, length: usize) -> Option<u64> {
        (0..length as u64)
            .map(|i| address.wrapping_add(i))
            .find(|a| self.byte(*a).is_none())
    }

    /// Little-endian read of `length` bytes; untracked bytes read as their
    /// initial-memory variable.
    pub fn read_expr(&self, address: u64, length: usize) -> Option<SymExpr> {
        (0..length as u64)
            .map(|i| {
                let at = address.wrapping_add(i);
                self.byte(at)
                    .cloned()
                    .unwrap_or_else(|| SymExpr::var(Var::Memory(at)))
            })
            .reduce(|acc, byte| byte.concat(acc))
    }

    /// Little-endian write of `expr`; returns the previous expression of
    /// every byte written, lowest address first.
    pub fn write_expr(&mut self, address: u64, expr: &SymExpr) -> Vec<Option<SymExpr>> {
        debug_assert_eq!(expr.bits() % 8, 0);
        let bytes = expr.bits() / 8;

        (0..bytes)
            .map(|i| {
                let lsb = i * 8;
                let byte = expr.clone().extract(lsb, lsb + 8);
                self.set_byte(address.wrapping_add(i as u64), Some(byte))
            })
            .collect()
    }

    /// Writes concrete bytes page by page, returning the previous
    /// expression of every byte written.
    pub fn write_bytes(&mut self, address: u64, values: &[u8]) -> Vec<Option<SymExpr>> {
        let mut previous = Vec::with_capacity(values.len());
        if values.is_empty() {
            return previous;
        }

        let (mut page, offset) = Self::locate(address);

        // first page starts at an offset
        let (head, rest) = values.split_at(values.len().min(PAGE_SIZE - offset));
        self.write_page(page, offset, head.iter().copied(), &mut previous);

        for chunk in rest.iter().copied().chunks(PAGE_SIZE).into_iter() {
            page = (page + 1) & LAST_PAGE;
            self.write_page(page, 0, chunk, &mut previous);
        }

        previous
    }

    fn write_page<I: Iterator<Item = u8>>(
        &mut self,
        page: u64,
        offset: usize,
        values: I,
        previous: &mut Vec<Option<SymExpr>>,
    ) {
        let page = self.pages.entry(page).or_insert_with(Page::new);
        for (slot, value) in page.expressions[offset..].iter_mut().zip(values) {
            previous.push(slot.replace(SymExpr::bv(value as u64, 8)));
        }
    }

    pub fn number_of_pages(&self) -> usize {
        self.pages.len()
    }
}

/// Memory state shared by every thread of an analysed process.
#[derive(Debug, Clone, Default)]
pub struct SharedMemory {
    pub(crate) symbolic: SymbolicMemory,
    pub(crate) taint: MemoryTaint,
}

impl SharedMemory {
    pub fn symbolic(&self) -> &SymbolicMemory {
        &self.symbolic
    }

    pub fn taint(&self) -> &MemoryTaint {
        &self.taint
    }
}

/// Register state private to one analysed thread. Registers bind to the
/// expression of the element that last wrote them.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    bindings: HashMap<Register, SymExpr>,
    pub(crate) taint: RegisterTaint,
}

impl RegisterFile {
    /// The current full-width value of `register`.
    pub fn read(&self, register: Register) -> SymExpr {
        self.bindings
            .get(&register)
            .cloned()
            .unwrap_or_else(|| SymExpr::var(Var::Register(register)))
    }

    pub fn is_bound(&self, register: Register) -> bool {
        self.bindings.contains_key(&register)
    }

    /// Rebinds `register`, returning its previous binding.
    pub fn bind(&mut self, register: Register, expr: Option<SymExpr>) -> Option<SymExpr> {
        match expr {
            Some(expr) => {
                debug_assert_eq!(expr.bits(), register.bits());
                self.bindings.insert(register, expr)
            }
            None => self.bindings.remove(&register),
        }
    }

    pub fn taint(&self) -> &RegisterTaint {
        &self.taint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::element::ElementId;

    #[test]
    fn untracked_bytes_read_as_initial_memory() {
        let memory = SymbolicMemory::default();
        let e = memory.read_expr(0x1000, 2).unwrap();

        assert_eq!(
            e,
            SymExpr::var(Var::Memory(0x1001)).concat(SymExpr::var(Var::Memory(0x1000)))
        );
        assert_eq!(memory.untracked(0x1000, 2), Some(0x1000));
    }

    #[test]
    fn write_then_read_recovers_reference() {
        let mut memory = SymbolicMemory::default();
        let value = SymExpr::reference(ElementId::new(3), 64);

        let previous = memory.write_expr(0x1ffc, &value);
        assert_eq!(previous.len(), 8);
        assert!(previous.iter().all(Option::is_none));
        assert_eq!(memory.number_of_pages(), 2);

        assert_eq!(memory.read_expr(0x1ffc, 8), Some(value.clone()));
        assert_eq!(memory.read_expr(0x1ffc, 4), Some(value.extract_low(32)));
        assert!(memory.is_tracked(0x1ffc, 8));
    }

    #[test]
    fn concrete_bytes_are_little_endian() {
        let mut memory = SymbolicMemory::default();
        memory.write_bytes(0x10, &[0x08, 0x10, 0x00, 0x00]);

        assert_eq!(memory.read_expr(0x10, 4), Some(SymExpr::bv(0x1008, 32)));
    }

    #[test]
    fn concrete_writes_span_pages() {
        let mut memory = SymbolicMemory::default();
        let values = (0..5000u32).map(|i| i as u8).collect::<Vec<_>>();

        let previous = memory.write_bytes(0xff0, &values);
        assert_eq!(previous.len(), values.len());
        assert_eq!(memory.number_of_pages(), 3);

        assert_eq!(memory.byte(0xff0), Some(&SymExpr::bv(0, 8)));
        assert_eq!(memory.byte(0x1000), Some(&SymExpr::bv(0x10, 8)));
        assert_eq!(memory.byte(0xff0 + 4999), Some(&SymExpr::bv((4999 % 256) as u64, 8)));
        assert!(memory.byte(0xff0 + 5000).is_none());

        let previous = memory.write_bytes(0xff8, &[0xaa; 16]);
        assert!(previous.iter().all(Option::is_some));
    }

    #[test]
    fn clearing_bytes_releases_pages() {
        let mut memory = SymbolicMemory::default();
        memory.set_byte(0x20, Some(SymExpr::bv(1, 8)));
        assert_eq!(memory.number_of_pages(), 1);

        assert_eq!(memory.set_byte(0x20, None), Some(SymExpr::bv(1, 8)));
        assert_eq!(memory.number_of_pages(), 0);
    }

    #[test]
    fn registers_default_to_initial_variables() {
        let mut registers = RegisterFile::default();
        assert_eq!(registers.read(Register::Rsp), SymExpr::var(Var::Register(Register::Rsp)));

        registers.bind(Register::Rsp, Some(SymExpr::bv(0x1000, 64)));
        assert_eq!(registers.read(Register::Rsp), SymExpr::bv(0x1000, 64));
        assert!(registers.is_bound(Register::Rsp));
    }
}
