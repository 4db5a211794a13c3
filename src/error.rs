use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatroError {
    #[error("request for {month} {year} failed: {reason}")]
    Fetch {
        year: i32,
        month: String,
        reason: String,
    },
    #[error("source answered {status} for {month} {year}")]
    HttpStatus {
        year: i32,
        month: String,
        status: u16,
    },
    #[error("month markup unusable: {0}")]
    Parse(String),
    #[error("unknown month name in banner: {0}")]
    UnknownMonth(String),
    #[error("gregorian date could not be resolved: {0}")]
    Resolve(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("another sync pass holds {0}")]
    SyncLocked(String),
}

impl PatroError {
    /// Failures the orchestrator may retry; everything scraped from the
    /// source falls in this bucket.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. }
                | Self::HttpStatus { .. }
                | Self::Parse(_)
                | Self::UnknownMonth(_)
                | Self::Resolve(_)
        )
    }

    pub fn code(&self) -> PatroErrorCode {
        match self {
            Self::Fetch { .. } | Self::HttpStatus { .. } => PatroErrorCode::E001Fetch,
            Self::Parse(_) | Self::UnknownMonth(_) => PatroErrorCode::E002Parse,
            Self::Resolve(_) => PatroErrorCode::E003Resolve,
            Self::InvalidConfig(_) => PatroErrorCode::E005ConfigInvalid,
            Self::SyncLocked(_) => PatroErrorCode::E006Locked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatroErrorCode {
    E001Fetch,
    E002Parse,
    E003Resolve,
    E004StoreLine,
    E005ConfigInvalid,
    E006Locked,
}

impl PatroErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Fetch => "E001_FETCH",
            Self::E002Parse => "E002_PARSE",
            Self::E003Resolve => "E003_RESOLVE",
            Self::E004StoreLine => "E004_STORE_LINE",
            Self::E005ConfigInvalid => "E005_CONFIG_INVALID",
            Self::E006Locked => "E006_LOCKED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_failures_are_transient() {
        let err = PatroError::HttpStatus {
            year: 2081,
            month: "Magh".into(),
            status: 503,
        };
        assert!(err.is_transient());
        assert_eq!(err.code().as_str(), "E001_FETCH");
        assert!(PatroError::UnknownMonth("Foo".into()).is_transient());
    }

    #[test]
    fn config_and_lock_failures_are_not_transient() {
        assert!(!PatroError::InvalidConfig("x".into()).is_transient());
        assert!(!PatroError::SyncLocked("/tmp/.sync.lock".into()).is_transient());
    }
}
