//! Hidden-layer accumulator for one perspective.

use super::network::HIDDEN;

/// Accumulated hidden-layer activations for one perspective.
///
/// Arithmetic wraps, so the result of adding and removing a set of weight
/// rows does not depend on the order they are applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(64))]
pub struct Accumulator {
    pub(crate) vals: [i16; HIDDEN],
}

impl Accumulator {
    /// All-zero accumulator.
    pub const ZERO: Accumulator = Accumulator { vals: [0; HIDDEN] };

    /// Copy `HIDDEN` values out of `slice`.
    pub(crate) fn from_slice(slice: &[i16]) -> Self {
        let mut acc = Self::ZERO;
        acc.vals.copy_from_slice(slice);
        acc
    }

    /// Add a weight row (piece placed on a square).
    #[inline]
    pub(crate) fn add(&mut self, row: &Accumulator) {
        for (acc, &w) in self.vals.iter_mut().zip(&row.vals) {
            *acc = acc.wrapping_add(w);
        }
    }

    /// Remove a weight row (piece removed from a square).
    #[inline]
    pub(crate) fn sub(&mut self, row: &Accumulator) {
        for (acc, &w) in self.vals.iter_mut().zip(&row.vals) {
            *acc = acc.wrapping_sub(w);
        }
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_sub_restores() {
        let mut row = Accumulator::ZERO;
        row.vals[0] = 7;
        row.vals[HIDDEN - 1] = -3;

        let mut acc = Accumulator::ZERO;
        acc.add(&row);
        assert_eq!(acc.vals[0], 7);
        acc.sub(&row);
        assert_eq!(acc, Accumulator::ZERO);
    }
}
