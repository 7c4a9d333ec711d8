//! Analysis window functions

use std::f32::consts::PI;

/// Window applied to each analysis block before the forward transform
///
/// Periodic definitions (denominator `N`, not `N - 1`) so that Hann sums to
/// a constant at 50% overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    Rectangle,
    #[default]
    Hann,
    Hamming,
}

impl Window {
    /// Window coefficient at `index` for a block of `len` samples
    pub fn coefficient(&self, index: usize, len: usize) -> f32 {
        if len <= 1 {
            return 1.0;
        }
        let phase = (2.0 * PI * index as f32) / len as f32;
        match self {
            Window::Rectangle => 1.0,
            Window::Hann => 0.5 - 0.5 * phase.cos(),
            Window::Hamming => 0.54 - 0.46 * phase.cos(),
        }
    }

    /// Precomputed coefficient table for a block of `len` samples
    pub fn table(&self, len: usize) -> Vec<f32> {
        (0..len).map(|i| self.coefficient(i, len)).collect()
    }

    /// Gain of the two-block 50%-overlap average for this window
    ///
    /// Rectangle reconstructs at unity; Hann and Hamming sum to a constant
    /// at half-block shift, and the averaging divides that constant by two.
    pub fn overlap_average_gain(&self) -> f32 {
        match self {
            Window::Rectangle => 1.0,
            Window::Hann => 0.5,
            Window::Hamming => 0.54,
        }
    }

    /// Names in item-list order, as exposed by FX window parameters
    pub const NAMES: [&'static str; 3] = ["rectangle", "hann", "hamming"];

    /// Map an item index (from an ITEMS parameter) back to a window
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Window::Rectangle,
            2 => Window::Hamming,
            _ => Window::Hann,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_sums_to_one_at_half_shift() {
        let len = 256;
        let table = Window::Hann.table(len);
        for i in 0..len / 2 {
            let sum = table[i] + table[i + len / 2];
            assert!((sum - 1.0).abs() < 1e-6, "index {i}: sum {sum}");
        }
    }

    #[test]
    fn rectangle_is_unity() {
        assert!(Window::Rectangle.table(64).iter().all(|&c| c == 1.0));
    }

    #[test]
    fn index_round_trip() {
        assert_eq!(Window::from_index(0), Window::Rectangle);
        assert_eq!(Window::from_index(1), Window::Hann);
        assert_eq!(Window::from_index(2), Window::Hamming);
    }
}
