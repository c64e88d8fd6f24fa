//! Per-element availability lattice.
//!
//! Ordered `Unknown ⊑ {Yes, No} ⊑ Partial`, with `Unknown` represented as
//! absence. The lattice is finite and the merge monotone, which is what lets
//! the on-demand dataflow terminate on cyclic CFGs.

/// Whether an element is initialized at a program point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiKind {
    No,
    Yes,
    Partial,
}

/// Lattice merge over two optional kinds.
pub fn merge_kinds(a: Option<DiKind>, b: Option<DiKind>) -> Option<DiKind> {
    let Some(k1) = a else {
        return b;
    };

    // Partial absorbs everything.
    if k1 == DiKind::Partial {
        return Some(k1);
    }

    let Some(k2) = b else {
        return Some(k1);
    };

    // Yes and No disagree into Partial.
    if k1 != k2 {
        return Some(DiKind::Partial);
    }

    Some(k1)
}

/// A dense vector of optional `DiKind`s, two bits per element:
///
/// ```text
///   T,T -> Unknown
///   F,F -> No
///   F,T -> Yes
///   T,F -> Partial
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilitySet {
    bits: Vec<u64>,
    len: u32,
}

impl AvailabilitySet {
    /// Creates a set of `num_elements` all-Unknown entries.
    pub fn new(num_elements: u32) -> Self {
        let words = (num_elements as usize * 2).div_ceil(64);
        Self {
            bits: vec![!0u64; words],
            len: num_elements,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    fn bit(&self, index: usize) -> bool {
        self.bits[index / 64] >> (index % 64) & 1 != 0
    }

    fn set_bit(&mut self, index: usize, value: bool) {
        let mask = 1u64 << (index % 64);
        if value {
            self.bits[index / 64] |= mask;
        } else {
            self.bits[index / 64] &= !mask;
        }
    }

    /// The element's kind; panics on Unknown.
    pub fn get(&self, element: u32) -> DiKind {
        self.get_conditional(element)
            .unwrap_or_else(|| panic!("element {} is unknown", element))
    }

    pub fn get_conditional(&self, element: u32) -> Option<DiKind> {
        assert!(element < self.len, "element {} out of range", element);
        let index = element as usize * 2;
        match (self.bit(index), self.bit(index + 1)) {
            (true, true) => None,
            (false, false) => Some(DiKind::No),
            (false, true) => Some(DiKind::Yes),
            (true, false) => Some(DiKind::Partial),
        }
    }

    pub fn set(&mut self, element: u32, kind: DiKind) {
        assert!(element < self.len, "element {} out of range", element);
        let index = element as usize * 2;
        let (b1, b2) = match kind {
            DiKind::No => (false, false),
            DiKind::Yes => (false, true),
            DiKind::Partial => (true, false),
        };
        self.set_bit(index, b1);
        self.set_bit(index + 1, b2);
    }

    pub fn set_conditional(&mut self, element: u32, kind: Option<DiKind>) {
        match kind {
            Some(kind) => self.set(element, kind),
            None => {
                let index = element as usize * 2;
                self.set_bit(index, true);
                self.set_bit(index + 1, true);
            }
        }
    }

    pub fn contains_unknown(&self) -> bool {
        (0..self.len).any(|i| self.get_conditional(i).is_none())
    }

    pub fn is_all(&self, kind: DiKind) -> bool {
        (0..self.len).all(|i| self.get_conditional(i) == Some(kind))
    }

    pub fn has_any(&self, kind: DiKind) -> bool {
        (0..self.len).any(|i| self.get_conditional(i) == Some(kind))
    }

    pub fn is_all_yes(&self) -> bool {
        self.is_all(DiKind::Yes)
    }

    pub fn is_all_no(&self) -> bool {
        self.is_all(DiKind::No)
    }

    /// Switches any still-Unknown element to `kind`.
    pub fn change_unset_to(&mut self, kind: DiKind) {
        for i in 0..self.len {
            if self.get_conditional(i).is_none() {
                self.set(i, kind);
            }
        }
    }

    /// Elementwise `self = merge(self, other)`.
    pub fn merge_in(&mut self, other: &AvailabilitySet) {
        assert_eq!(self.len, other.len, "availability length mismatch");
        for i in 0..self.len {
            self.set_conditional(i, merge_kinds(self.get_conditional(i), other.get_conditional(i)));
        }
    }
}

#[cfg(test)]
#[path = "../tests/t_lattice.rs"]
mod tests;
