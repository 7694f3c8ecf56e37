/// Pool-level failure causes.
///
/// Pool operations return `anyhow::Result`; when the root cause is one of these,
/// callers can recover it with `err.downcast_ref::<PoolError>()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("vertex format has no attributes")]
    EmptyFormat,

    #[error("vertex stride {0} is not a multiple of 4 bytes")]
    UnalignedStride(u64),

    #[error("vertex stride {stride} is smaller than the attribute footprint ({required} bytes)")]
    StrideTooSmall { stride: u64, required: u64 },

    #[error("model vertex format does not match the pool (pool stride {expected}, model stride {found})")]
    FormatMismatch { expected: u64, found: u64 },

    #[error("vertex type is {vertex_size} bytes but the format stride is {stride}")]
    VertexSizeMismatch { vertex_size: u64, stride: u64 },

    #[error("write of {len} bytes at offset {offset} runs past the mapped region end ({end})")]
    WriteOutOfBounds { offset: u64, len: u64, end: u64 },

    #[error("pool vertex range exceeds the signed 32-bit base vertex range")]
    VertexRangeOverflow,
}
