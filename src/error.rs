use thiserror::Error;

/// Library-internal error kinds that can legitimately arise from malformed
/// on-disk data or OS-level I/O failures. Programmer errors (an empty key,
/// an over-budget block) are `assert!`/`debug_assert!` panics instead, per
/// the crate's error-handling design, and are not represented here.
#[derive(Error, Debug)]
pub enum LsmError {
    #[error("malformed block: declared data length does not match remaining bytes")]
    MalformedBlock,

    #[error("malformed block meta: truncated record in meta stream")]
    MalformedBlockMeta,

    #[error("failed to read block {block_idx} of sst {sst_id}: {source}")]
    ReadBlock {
        sst_id: u32,
        block_idx: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create sst file {path}: {source}")]
    FileCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open sst file {path}: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write sst file {path}: {source}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fsync sst file {path}: {source}")]
    FileSync {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
