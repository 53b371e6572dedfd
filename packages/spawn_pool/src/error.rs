use std::fmt::Debug;

use thiserror::Error;

use crate::FactoryError;

/// Errors that can occur when setting up or using a [`Pooler`][crate::Pooler].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A pool kind cannot produce the instances it needs, either because it has no payload
    /// template, because it is configured more than once or because its template failed to
    /// create a payload.
    ///
    /// Only the pool kind named in the error is affected; other kinds remain usable.
    #[error("pool '{kind}' is misconfigured: {problem}")]
    Configuration {
        /// The pool kind that is misconfigured, formatted with its `Debug` representation.
        kind: String,

        /// A human-readable description of the problem.
        problem: String,

        /// The error raised by the payload template, if the problem originated there.
        #[source]
        source: Option<FactoryError>,
    },

    /// The operation referenced a pool kind that was never configured.
    #[error("pool '{kind}' does not exist")]
    UnknownPool {
        /// The pool kind that was requested, formatted with its `Debug` representation.
        kind: String,
    },
}

impl Error {
    pub(crate) fn configuration(kind: impl Debug, problem: impl Into<String>) -> Self {
        Self::Configuration {
            kind: format!("{kind:?}"),
            problem: problem.into(),
            source: None,
        }
    }

    pub(crate) fn factory_failed(kind: impl Debug, source: FactoryError) -> Self {
        Self::Configuration {
            kind: format!("{kind:?}"),
            problem: "the payload template failed to create a payload".to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn unknown_pool(kind: impl Debug) -> Self {
        Self::UnknownPool {
            kind: format!("{kind:?}"),
        }
    }
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::error::Error as _;
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn unknown_pool_names_the_kind() {
        let error = Error::unknown_pool("Bullets");

        assert_eq!(error.to_string(), "pool '\"Bullets\"' does not exist");
        assert!(error.source().is_none());
    }

    #[test]
    fn factory_failure_keeps_source() {
        let error = Error::factory_failed(7_u8, "out of sprites".into());

        assert!(error.to_string().contains("pool '7' is misconfigured"));

        let source = error.source().expect("factory failures carry their source");
        assert_eq!(source.to_string(), "out of sprites");
    }
}
