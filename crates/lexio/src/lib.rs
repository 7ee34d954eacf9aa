//! Lexio vocabulary sync framework.
#![warn(clippy::pedantic, missing_docs)]

pub use async_trait::async_trait;
pub use eyre;
pub use lexio_common::{
    provider::{ProviderKind, ProviderSet},
    source::{QueryApi, WordSource},
    word::{SentencePair, WordGroup, WordRecord},
};
pub use lexio_pipeline::{
    audio::{
        audio_cache_dir, audio_file_name, AudioDownloadJob, AudioDownloadOptions, AudioItem,
        AudioTick,
    },
    fetch::{FetchEvent, WordFetchJob, WordFetchOptions},
    media::{ByteStream, HttpMediaSource, MediaError, MediaSource},
    query::{QueryEvent, QueryOutcome, WordQueryJob, WordQueryOptions},
    release::{ReleaseCheckJob, ReleaseEvent, LATEST_RELEASE_API},
};
pub use lexio_pool::{scoped, RateLimiter, TaskOutput, TaskPool};
pub use lexio_worker::{
    manager::{JobEvent, JobManager, JobManagerOptions, JobOutcome},
    Job, JobContext,
};
