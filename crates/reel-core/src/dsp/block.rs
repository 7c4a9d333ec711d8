//! Block accumulation with 50% overlap
//!
//! Incoming samples arrive in arbitrary-sized chunks; analysis wants
//! fixed-size windowed blocks that overlap by half. [`BlockBuffer`] bridges
//! the two: it keeps a rolling tail of `size / 2` samples so every input
//! sample appears in exactly two emitted blocks.

use super::Window;

pub struct BlockBuffer {
    size: usize,
    hop: usize,
    window: Vec<f32>,
    pending: Vec<f32>,
    /// Scratch for the windowed copy handed to the callback
    block: Vec<f32>,
}

impl BlockBuffer {
    /// Create a buffer emitting blocks of `size` samples at 50% overlap
    ///
    /// `size` must be even; the hop is `size / 2`.
    pub fn new(size: usize, window: Window) -> Self {
        debug_assert!(size >= 2 && size % 2 == 0, "block size must be even");
        Self {
            size,
            hop: size / 2,
            window: window.table(size),
            pending: Vec::with_capacity(size * 2),
            block: vec![0.0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of buffered samples not yet part of an emitted block start
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed samples, invoking `on_block` for every completed windowed block
    pub fn push(&mut self, samples: &[f32], mut on_block: impl FnMut(&[f32])) {
        self.pending.extend_from_slice(samples);

        while self.pending.len() >= self.size {
            self.block.copy_from_slice(&self.pending[..self.size]);
            for (dst, w) in self.block.iter_mut().zip(&self.window) {
                *dst *= *w;
            }
            on_block(&self.block);
            self.pending.drain(..self.hop);
        }
    }

    /// Discard buffered input (used on rewind)
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_overlapping_blocks() {
        let mut buf = BlockBuffer::new(8, Window::Rectangle);
        let input: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let mut blocks: Vec<Vec<f32>> = Vec::new();
        buf.push(&input, |b| blocks.push(b.to_vec()));

        // 20 samples, block 8, hop 4: blocks start at 0, 4, 8, 12
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], (0..8).map(|i| i as f32).collect::<Vec<_>>());
        assert_eq!(blocks[1][0], 4.0);
        assert_eq!(blocks[3][7], 19.0);
    }

    #[test]
    fn handles_fragmented_input() {
        let mut whole = BlockBuffer::new(16, Window::Hann);
        let mut split = BlockBuffer::new(16, Window::Hann);
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.1).sin()).collect();

        let mut a: Vec<Vec<f32>> = Vec::new();
        whole.push(&input, |b| a.push(b.to_vec()));

        let mut b: Vec<Vec<f32>> = Vec::new();
        for chunk in input.chunks(5) {
            split.push(chunk, |blk| b.push(blk.to_vec()));
        }

        assert_eq!(a, b);
    }

    #[test]
    fn window_is_applied() {
        let mut buf = BlockBuffer::new(8, Window::Hann);
        let mut blocks: Vec<Vec<f32>> = Vec::new();
        buf.push(&[1.0; 8], |b| blocks.push(b.to_vec()));
        assert_eq!(blocks.len(), 1);
        // Periodic Hann starts at zero
        assert!(blocks[0][0].abs() < 1e-7);
        assert!((blocks[0][4] - 1.0).abs() < 1e-6);
    }
}
