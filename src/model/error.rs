use thiserror::Error;

/// The standard result type used throughout the application.
pub type StdResult<T> = Result<T, anyhow::Error>;

/// Fetcher error
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FetcherError {
    /// The repository identifier is not of the form `org/name`
    #[error("Invalid repository identifier: {0}")]
    InvalidRepository(String),

    /// The page number is not 1-based
    #[error("Invalid page number: {0}, pages are numbered from 1")]
    InvalidPage(u32),

    /// The API rejected the call because the rate limit is exhausted
    #[error("Throttled by the API on page {page} (status {status})")]
    Throttled { page: u32, status: u16 },

    /// The call did not reach the API or the connection failed
    #[error("Transport error on page {page}: {message}")]
    Transport { page: u32, message: String },

    /// The response body could not be decoded into issues
    #[error("Decoding error on page {page}: {message}")]
    Decode { page: u32, message: String },

    /// The API answered with a non successful status
    #[error("Remote error on page {page} (status {status}): {message}")]
    Remote {
        page: u32,
        status: u16,
        message: String,
    },
}

impl FetcherError {
    /// Checks whether an error returned by a fetcher is a throttling response.
    pub fn is_throttled(error: &anyhow::Error) -> bool {
        matches!(
            error.downcast_ref::<FetcherError>(),
            Some(FetcherError::Throttled { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn throttled_error_is_detected_through_anyhow() {
        let error: anyhow::Error = FetcherError::Throttled {
            page: 3,
            status: 403,
        }
        .into();

        assert!(FetcherError::is_throttled(&error));
    }

    #[test]
    fn throttled_error_is_detected_below_context() {
        let error = anyhow::Error::from(FetcherError::Throttled {
            page: 3,
            status: 429,
        })
        .context("Fetching page 3");

        assert!(FetcherError::is_throttled(&error));
    }

    #[test]
    fn other_errors_are_not_throttled() {
        let decode: anyhow::Error = FetcherError::Decode {
            page: 4,
            message: "missing field `title`".to_string(),
        }
        .into();
        let opaque = anyhow!("Connection reset");

        assert!(!FetcherError::is_throttled(&decode));
        assert!(!FetcherError::is_throttled(&opaque));
    }
}
