use fnv::FnvHashSet;
use fxhash::FxHashSet;

use crate::register::Register;

#[derive(Debug, Clone, Default)]
pub struct RegisterTaint {
    tainted: FnvHashSet<Register>,
}

impl RegisterTaint {
    pub fn is_tainted(&self, register: Register) -> bool {
        self.tainted.contains(&register)
    }

    /// Sets the taint of `register`, returning its previous taint.
    pub fn set(&mut self, register: Register, tainted: bool) -> bool {
        if tainted {
            !self.tainted.insert(register)
        } else {
            self.tainted.remove(&register)
        }
    }

    pub fn tainted(&self) -> impl Iterator<Item = Register> + '_ {
        self.tainted.iter().copied()
    }
}

/// Byte-granular memory taint; a sized access is tainted if any of its
/// bytes is.
#[derive(Debug, Clone, Default)]
pub struct MemoryTaint {
    tainted: FxHashSet<u64>,
}

impl MemoryTaint {
    pub fn is_byte_tainted(&self, address: u64) -> bool {
        self.tainted.contains(&address)
    }

    pub fn is_tainted(&self, address: u64, size: usize) -> bool {
        (0..size as u64).any(|i| self.is_byte_tainted(address.wrapping_add(i)))
    }

    /// Sets the taint of the byte at `address`, returning its previous taint.
    pub fn set_byte(&mut self, address: u64, tainted: bool) -> bool {
        if tainted {
            !self.tainted.insert(address)
        } else {
            self.tainted.remove(&address)
        }
    }

    pub fn len(&self) -> usize {
        self.tainted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tainted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_set_reports_previous() {
        let mut taint = RegisterTaint::default();
        assert!(!taint.set(Register::Rax, true));
        assert!(taint.set(Register::Rax, true));
        assert!(taint.is_tainted(Register::Rax));
        assert!(taint.set(Register::Rax, false));
        assert!(!taint.is_tainted(Register::Rax));
    }

    #[test]
    fn any_tainted_byte_taints_the_range() {
        let mut taint = MemoryTaint::default();
        taint.set_byte(0x1003, true);

        assert!(taint.is_tainted(0x1000, 8));
        assert!(!taint.is_tainted(0x1004, 4));
        assert!(!taint.is_tainted(0x1000, 3));
        assert_eq!(taint.len(), 1);
    }
}
