// ============================================================================
// PIPELINE ERRORS
// ============================================================================

use crate::channel::TextureChannel;

/// Everything the derivation core can fail with.
///
/// Errors are local to one orchestrator call: nothing is rolled back, but staged
/// cross-channel writes are only committed when the whole call succeeded.
#[derive(Debug)]
pub enum PipelineError {
    /// A render target or scratch buffer could not be allocated.  Fatal for the
    /// current operation.
    Allocation {
        width: u32,
        height: u32,
        reason: String,
    },
    /// The material mask image has more distinct colors than the index allows.
    TooManyMaterials { found: usize, limit: usize },
    /// A configured input source or command makes no sense (cycles, references
    /// to Material/Grunge, zero-sized resize...).
    InvalidInput(String),
    /// A pass was invoked with fewer inputs than it reads.
    PassInputs {
        pass: &'static str,
        expected: usize,
        got: usize,
    },
    /// A channel has no buffer where one was required.
    MissingTarget(TextureChannel),
    /// Buffer readback (GPU → CPU) failed.
    Readback(String),
    /// Any other GPU-side failure.
    Gpu(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Allocation { width, height, reason } => {
                write!(f, "Failed to allocate {}x{} render target: {}", width, height, reason)
            }
            PipelineError::TooManyMaterials { found, limit } => write!(
                f,
                "Material mask has {} distinct colors (limit is {})",
                found, limit
            ),
            PipelineError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            PipelineError::PassInputs { pass, expected, got } => write!(
                f,
                "Pass {} needs {} input(s), got {}",
                pass, expected, got
            ),
            PipelineError::MissingTarget(ch) => write!(f, "Channel {} has no buffer", ch),
            PipelineError::Readback(e) => write!(f, "Readback failed: {}", e),
            PipelineError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<wgpu::BufferAsyncError> for PipelineError {
    fn from(e: wgpu::BufferAsyncError) -> Self {
        PipelineError::Readback(e.to_string())
    }
}

impl From<std::sync::mpsc::RecvError> for PipelineError {
    fn from(e: std::sync::mpsc::RecvError) -> Self {
        PipelineError::Readback(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
