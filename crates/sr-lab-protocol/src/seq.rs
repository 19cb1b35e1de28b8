//! Modular sequence-number arithmetic shared by both window implementations.
//!
//! Sequence numbers live in `[0, 2W)`. With the space twice the window size,
//! any number the receiver can see is either inside `[base, base + W)` (new)
//! or inside `[base - W, base)` (already delivered), never both.

/// Sequence space for a window of `W` packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    window: u32,
}

impl SeqSpace {
    /// `window` must be non-zero; `ProtocolConfig::validate` enforces that.
    pub fn new(window: u32) -> Self {
        debug_assert!(window > 0);
        Self { window }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn modulus(&self) -> u32 {
        self.window * 2
    }

    pub fn next(&self, seq: u32) -> u32 {
        (seq + 1) % self.modulus()
    }

    /// Forward distance from `from` to `to`, in `[0, modulus)`.
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        let m = i64::from(self.modulus());
        (i64::from(to) - i64::from(from)).rem_euclid(m) as u32
    }

    /// `true` when `seq` falls in the `W` numbers starting at `base`.
    pub fn in_window(&self, base: u32, seq: u32) -> bool {
        self.distance(base, seq) < self.window
    }

    /// Validate a sequence number read off the wire.
    pub fn from_wire(&self, raw: i32) -> Option<u32> {
        u32::try_from(raw).ok().filter(|&s| s < self.modulus())
    }

    /// Offset of a wire sequence number relative to `base`, or `None` if the
    /// number is not part of the space at all.
    pub fn offset(&self, base: u32, raw: i32) -> Option<u32> {
        self.from_wire(raw).map(|seq| self.distance(base, seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_wraps_at_twice_the_window() {
        let space = SeqSpace::new(6);
        assert_eq!(space.modulus(), 12);
        assert_eq!(space.next(0), 1);
        assert_eq!(space.next(10), 11);
        assert_eq!(space.next(11), 0);
    }

    #[test]
    fn distance_is_forward_and_wraps() {
        let space = SeqSpace::new(6);
        assert_eq!(space.distance(0, 0), 0);
        assert_eq!(space.distance(3, 5), 2);
        assert_eq!(space.distance(10, 1), 3);
        assert_eq!(space.distance(1, 10), 9);
    }

    #[test]
    fn window_membership_across_the_wrap() {
        let space = SeqSpace::new(4);
        // base 6 in a space of 8: window is {6, 7, 0, 1}
        for seq in [6, 7, 0, 1] {
            assert!(space.in_window(6, seq), "{seq} should be in window");
        }
        for seq in [2, 3, 4, 5] {
            assert!(!space.in_window(6, seq), "{seq} should be outside window");
        }
    }

    #[test]
    fn new_and_stale_numbers_never_alias() {
        // With a space of exactly 2W, the W numbers behind the base are never
        // inside the window, whatever the base.
        let space = SeqSpace::new(5);
        for base in 0..space.modulus() {
            for back in 1..=space.window() {
                let stale = (base + space.modulus() - back) % space.modulus();
                assert!(!space.in_window(base, stale));
            }
        }
    }

    #[test]
    fn wire_values_outside_the_space_are_rejected() {
        let space = SeqSpace::new(6);
        assert_eq!(space.from_wire(11), Some(11));
        assert_eq!(space.from_wire(12), None);
        assert_eq!(space.from_wire(-1), None);
        assert_eq!(space.offset(10, 2), Some(4));
        assert_eq!(space.offset(0, 99), None);
    }
}
