// ============================================================================
// FRAME — per-render scratch context: backend + scratch pool
// ============================================================================
//
// `apply` is the ping-pong step every sub-pipeline is built from: the pass
// reads `[work, extra..]` into a fresh scratch buffer, which then becomes
// `work`; the previous buffer goes back to the pool.
// ============================================================================

use super::pool::ScratchPool;
use crate::error::Result;
use crate::passes::{Axis, Pass, PassBackend};

pub struct Frame<'a, B: PassBackend> {
    pub backend: &'a mut B,
    pool: &'a mut ScratchPool<B::Target>,
}

/// Sigma used for a blur of `radius` pixels.
pub fn sigma_for(radius: u32) -> f32 {
    (radius as f32 * 0.5).max(0.5)
}

impl<'a, B: PassBackend> Frame<'a, B> {
    pub fn new(backend: &'a mut B, pool: &'a mut ScratchPool<B::Target>) -> Self {
        Self { backend, pool }
    }

    pub fn size(&self, t: &B::Target) -> (u32, u32) {
        self.backend.target_size(t)
    }

    pub fn acquire(&mut self, width: u32, height: u32) -> Result<B::Target> {
        self.pool.acquire(self.backend, width, height)
    }

    pub fn release(&mut self, t: B::Target) {
        let (w, h) = self.backend.target_size(&t);
        self.pool.release(t, w, h);
    }

    pub fn release_all(&mut self, ts: impl IntoIterator<Item = B::Target>) {
        for t in ts {
            self.release(t);
        }
    }

    pub fn run(&mut self, pass: &Pass, inputs: &[&B::Target], output: &mut B::Target) -> Result<()> {
        self.backend.run(pass, inputs, output)
    }

    /// Run `pass` into a new `width × height` scratch buffer.
    pub fn run_new(&mut self, pass: &Pass, inputs: &[&B::Target], width: u32, height: u32) -> Result<B::Target> {
        let mut out = self.acquire(width, height)?;
        if let Err(e) = self.backend.run(pass, inputs, &mut out) {
            self.release(out);
            return Err(e);
        }
        Ok(out)
    }

    pub fn copy_of(&mut self, src: &B::Target) -> Result<B::Target> {
        let (w, h) = self.size(src);
        self.run_new(&Pass::Copy, &[src], w, h)
    }

    /// Replace `work` with `pass([work, extra..])`.
    pub fn apply(&mut self, work: &mut B::Target, pass: &Pass, extra: &[&B::Target]) -> Result<()> {
        let (w, h) = self.size(work);
        let mut out = self.acquire(w, h)?;
        let result = {
            let mut inputs: Vec<&B::Target> = Vec::with_capacity(extra.len() + 1);
            inputs.push(work);
            inputs.extend_from_slice(extra);
            self.backend.run(pass, &inputs, &mut out)
        };
        if let Err(e) = result {
            self.release(out);
            return Err(e);
        }
        std::mem::swap(work, &mut out);
        self.release(out);
        Ok(())
    }

    /// Like [`Frame::apply`] for two-input passes whose second input is `work`
    /// itself (seamless blends without a contrast image).
    pub fn apply_self_paired(&mut self, work: &mut B::Target, pass: &Pass) -> Result<()> {
        let (w, h) = self.size(work);
        let mut out = self.acquire(w, h)?;
        if let Err(e) = self.backend.run(pass, &[&*work, &*work], &mut out) {
            self.release(out);
            return Err(e);
        }
        std::mem::swap(work, &mut out);
        self.release(out);
        Ok(())
    }

    /// Separable Gaussian in place.  Radius 0 does nothing.
    pub fn blur(&mut self, work: &mut B::Target, radius: u32) -> Result<()> {
        if radius == 0 {
            return Ok(());
        }
        let sigma = sigma_for(radius);
        for axis in [Axis::Horizontal, Axis::Vertical] {
            self.apply(work, &Pass::GaussianBlur { radius, sigma, axis }, &[])?;
        }
        Ok(())
    }

    pub fn blurred_copy(&mut self, src: &B::Target, radius: u32) -> Result<B::Target> {
        let mut out = self.copy_of(src)?;
        if let Err(e) = self.blur(&mut out, radius) {
            self.release(out);
            return Err(e);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::ops::CpuBackend;

    #[test]
    fn apply_swaps_and_recycles() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let mut work = PixelBuffer::filled(4, 4, [0.2, 0.4, 0.6, 1.0]).unwrap();
        frame
            .apply(&mut work, &Pass::InvertComponents { components: [true; 3] }, &[])
            .unwrap();
        assert!((work.get(0, 0)[0] - 0.8).abs() < 1e-3);
        drop(frame);
        assert_eq!(pool.pooled_count(), 1);
    }

    #[test]
    fn failed_pass_returns_scratch() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let mut work = PixelBuffer::filled(2, 2, [0.0; 4]).unwrap();
        assert!(frame.apply(&mut work, &Pass::Sharpen { amount: 1.0 }, &[]).is_err());
        drop(frame);
        assert_eq!(pool.pooled_count(), 1);
    }
}
