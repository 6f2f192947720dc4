//! Low-discrepancy sub-pixel jitter sequence
//!
//! Temporal passes shift their sampling grid by a small per-frame offset so
//! that accumulated history covers sub-pixel positions evenly. The offsets
//! come from a Halton sequence: the radical inverse of an advancing index in
//! two coprime bases (conventionally 2 and 3, one per axis), centered around
//! zero. The sequence is deterministic and restartable from any index, and is
//! consumed through a finite cyclic window so accumulation windows repeat
//! predictably instead of drifting.

/// Centered radical-inverse ("Van der Corput") value of `index` in `base`
///
/// Returns a value in `(-0.5, 0.5)` for `index >= 1`; index 0 maps to the
/// degenerate -0.5 corner and is skipped by [`JitterSequence`].
pub fn halton_offset(index: u32, base: u32) -> f32 {
    debug_assert!(base >= 2, "radical inverse needs a base of at least 2");
    let mut result = 0.0f32;
    let mut fraction = 1.0f32;
    let mut i = index;
    while i > 0 {
        fraction /= base as f32;
        result += fraction * (i % base) as f32;
        i /= base;
    }
    result - 0.5
}

/// A restartable 2D jitter sequence over bases 2 and 3
///
/// Holds a monotonically advancing index that wraps modulo the configured
/// sequence length. State is owned by a single consumer; concurrent consumers
/// each need their own sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitterSequence {
    base_x: u32,
    base_y: u32,
    length: u32,
    index: u32,
}

impl JitterSequence {
    /// Creates a sequence of the given cycle length over bases 2 and 3
    ///
    /// # Panics
    /// Panics if `length` is zero.
    pub fn new(length: u32) -> Self {
        Self::with_bases(2, 3, length)
    }

    /// Creates a sequence with explicit per-axis bases
    ///
    /// The bases should be coprime, otherwise the combined 2D points
    /// correlate along a diagonal.
    pub fn with_bases(base_x: u32, base_y: u32, length: u32) -> Self {
        assert!(length > 0, "jitter sequence length must be non-zero");
        Self {
            base_x,
            base_y,
            length,
            index: 0,
        }
    }

    /// The cycle length after which offsets repeat
    pub fn length(&self) -> u32 {
        self.length
    }

    /// The current position within the cycle
    pub fn position(&self) -> u32 {
        self.index % self.length
    }

    /// Returns the next `(x, y)` offset pair and advances the sequence
    ///
    /// Both components lie in `(-0.5, 0.5)`.
    pub fn next_offset(&mut self) -> (f32, f32) {
        // Offset by one so the degenerate zeroth radical inverse never
        // appears in the cycle.
        let i = self.index % self.length + 1;
        self.index = self.index.wrapping_add(1);
        (halton_offset(i, self.base_x), halton_offset(i, self.base_y))
    }

    /// Restarts the sequence at an arbitrary index
    pub fn restart_at(&mut self, index: u32) {
        self.index = index;
    }

    /// Generates `count` consecutive offset pairs starting at `start`
    ///
    /// Purely a function of its arguments; the same call always yields the
    /// same points.
    pub fn generate(base_x: u32, base_y: u32, start: u32, count: usize) -> Vec<(f32, f32)> {
        (0..count)
            .map(|k| {
                let i = start.wrapping_add(k as u32);
                (halton_offset(i, base_x), halton_offset(i, base_y))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_radical_inverse_values() {
        // Base 2: 1 -> 0.5, 2 -> 0.25, 3 -> 0.75, centered by -0.5
        assert_eq!(halton_offset(1, 2), 0.0);
        assert_eq!(halton_offset(2, 2), -0.25);
        assert_eq!(halton_offset(3, 2), 0.25);
        // Base 3: 1 -> 1/3
        assert!((halton_offset(1, 3) - (1.0 / 3.0 - 0.5)).abs() < 1e-6);
        assert!((halton_offset(2, 3) - (2.0 / 3.0 - 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_offsets_stay_centered() {
        for index in 1..10_000 {
            for base in [2, 3] {
                let offset = halton_offset(index, base);
                assert!(offset > -0.5 && offset < 0.5, "index {index} base {base}: {offset}");
            }
        }
    }

    #[test]
    fn test_sequence_is_deterministic() {
        let first = JitterSequence::generate(2, 3, 1, 64);
        let second = JitterSequence::generate(2, 3, 1, 64);
        assert_eq!(first, second);

        let mut streaming = JitterSequence::new(64);
        let streamed: Vec<_> = (0..64).map(|_| streaming.next_offset()).collect();
        assert_eq!(streamed, first);
    }

    #[test]
    fn test_cycles_after_exactly_length_calls() {
        let mut sequence = JitterSequence::new(8);
        let first = sequence.next_offset();
        for _ in 0..7 {
            sequence.next_offset();
        }
        assert_eq!(sequence.next_offset(), first);
        assert_eq!(sequence.position(), 1);
    }

    #[test]
    fn test_restart_replays_from_index() {
        let mut sequence = JitterSequence::new(32);
        let head: Vec<_> = (0..5).map(|_| sequence.next_offset()).collect();
        sequence.restart_at(0);
        let replay: Vec<_> = (0..5).map(|_| sequence.next_offset()).collect();
        assert_eq!(head, replay);

        sequence.restart_at(3);
        assert_eq!(sequence.next_offset(), head[3]);
    }

    #[test]
    fn test_batch_matches_streaming_window() {
        let batch = JitterSequence::generate(2, 3, 1, 16);
        let mut streaming = JitterSequence::with_bases(2, 3, 16);
        for (k, &expected) in batch.iter().enumerate() {
            assert_eq!(streaming.next_offset(), expected, "mismatch at offset {k}");
        }
    }
}
