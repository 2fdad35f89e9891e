use std::fmt;

use itertools::Itertools;

use crate::element::SymbolicElement;
use crate::operand::ThreadId;

/// The symbolic effects of one lifted machine instruction, in effect order.
#[derive(Debug, Clone)]
pub struct Inst {
    thread_id: ThreadId,
    address: u64,
    disassembly: String,
    elements: Vec<SymbolicElement>,
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {:#x}: {}", self.thread_id, self.address, self.disassembly)?;
        write!(
            f,
            "{}",
            self.elements
                .iter()
                .format_with("\n", |e, f| f(&format_args!("\t-> {}", e)))
        )
    }
}

impl Inst {
    pub fn new<S: Into<String>>(thread_id: ThreadId, address: u64, disassembly: S) -> Self {
        Self {
            thread_id,
            address,
            disassembly: disassembly.into(),
            elements: Vec::new(),
        }
    }

    pub fn add_element(&mut self, element: SymbolicElement) {
        self.elements.push(element);
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn disassembly(&self) -> &str {
        &self.disassembly
    }

    pub fn elements(&self) -> &[SymbolicElement] {
        &self.elements
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolicElement> {
        self.elements.iter()
    }

    pub fn number_of_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The terminal control-flow element, if the record is complete.
    pub fn control_flow(&self) -> Option<&SymbolicElement> {
        self.elements
            .last()
            .filter(|e| e.destination().is_control_flow())
    }
}

impl<'a> IntoIterator for &'a Inst {
    type Item = &'a SymbolicElement;
    type IntoIter = std::slice::Iter<'a, SymbolicElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}
