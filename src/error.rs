//! Error types for hybrid-lru
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// hybrid-lru 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, rejected at construction time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The value computer failed for a key. Nothing is cached for the key;
    /// a later compute retries from scratch.
    #[error("Computation failed: {0}")]
    Compute(#[source] anyhow::Error),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Compute(_))
    }

    /// Compute 에러 생성 헬퍼 (waiter 측, 원본 에러는 computing caller가 소유)
    pub(crate) fn computation(message: impl Into<String>) -> Self {
        Error::Compute(anyhow::anyhow!(message.into()))
    }
}
