//! Process exit codes
//!
//! Every command returns one of these; scripts can branch on the code
//! instead of parsing stderr.

use rstore_core::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments or an unusable local path
    UsageError = 2,
    /// Backend or network failure, including failed uploads
    NetworkError = 3,
    NotFound = 4,
    ConfigError = 5,
    /// No pooled client could be obtained
    Unavailable = 6,
}

impl ExitCode {
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => ExitCode::NotFound,
            ErrorKind::Transport | ErrorKind::ConnectFailed | ErrorKind::WriteFinalization => {
                ExitCode::NetworkError
            }
            ErrorKind::PoolExhausted | ErrorKind::PoolClosed => ExitCode::Unavailable,
            ErrorKind::Config => ExitCode::ConfigError,
            ErrorKind::Io | ErrorKind::Other => ExitCode::GeneralError,
        }
    }

    pub fn from_error(error: &Error) -> Self {
        Self::from_kind(error.kind())
    }

    /// Classify an error raised at the binary edge
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        error
            .downcast_ref::<Error>()
            .map(Self::from_error)
            .unwrap_or(ExitCode::GeneralError)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_from_error() {
        assert_eq!(ExitCode::from_error(&Error::NotFound("a".into())), ExitCode::NotFound);
        assert_eq!(
            ExitCode::from_error(&Error::Transport("reset".into())),
            ExitCode::NetworkError
        );
        assert_eq!(
            ExitCode::from_error(&Error::WriteFinalization {
                key: "a".into(),
                message: "boom".into()
            }),
            ExitCode::NetworkError
        );
        assert_eq!(ExitCode::from_error(&Error::PoolClosed), ExitCode::Unavailable);
        assert_eq!(
            ExitCode::from_error(&Error::Config("bucket must be set".into())),
            ExitCode::ConfigError
        );
    }

    #[test]
    fn test_from_anyhow_sees_through_context() {
        let result: std::result::Result<(), Error> = Err(Error::Config("bucket must be set".into()));
        let err = result.context("Invalid config").unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err), ExitCode::ConfigError);

        let other = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::from_anyhow(&other), ExitCode::GeneralError);
    }

    #[test]
    fn test_codes() {
        assert_eq!(ExitCode::Success.as_u8(), 0);
        assert_eq!(ExitCode::UsageError.as_u8(), 2);
        assert_eq!(ExitCode::Unavailable.as_u8(), 6);
    }
}
