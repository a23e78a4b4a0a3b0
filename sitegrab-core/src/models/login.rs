//! Login state and result types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

// ============================================================================
// Login Status
// ============================================================================

/// Authentication state of a site.
///
/// `Unknown` until the first attempt, `Pending` while an attempt runs, then
/// `LoggedIn` or `LoggedOut`. A forced attempt moves either terminal state
/// back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    /// No attempt made yet.
    #[default]
    Unknown,
    /// An attempt is in flight.
    Pending,
    /// The last attempt failed.
    LoggedOut,
    /// The last attempt succeeded, or the site needs no login.
    LoggedIn,
}

impl LoginStatus {
    /// Numeric code, matching the order above.
    pub fn code(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Pending => 1,
            Self::LoggedOut => 2,
            Self::LoggedIn => 3,
        }
    }

    /// Parses a numeric code.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownCode`] for codes above 3.
    pub fn from_code(code: u8) -> Result<Self, CoreError> {
        match code {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Pending),
            2 => Ok(Self::LoggedOut),
            3 => Ok(Self::LoggedIn),
            _ => Err(CoreError::UnknownCode {
                kind: "login status",
                code,
            }),
        }
    }

    /// Returns true once an attempt has concluded.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::LoggedIn | Self::LoggedOut)
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::LoggedOut => "logged out",
            Self::LoggedIn => "logged in",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Login Result
// ============================================================================

/// Outcome reported with every login notification.
///
/// `Impossible` doubles as "already in the desired state": both meanings
/// share code 2 and are exposed as [`LoginResult::IMPOSSIBLE`] and
/// [`LoginResult::ALREADY`]. Neither is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginResult {
    /// The attempt succeeded.
    Success,
    /// The attempt was made and rejected.
    Error,
    /// No attempt was needed or possible.
    Impossible,
}

impl LoginResult {
    /// Login is unsupported or unnecessary.
    pub const IMPOSSIBLE: LoginResult = LoginResult::Impossible;

    /// Site is already in the requested state.
    pub const ALREADY: LoginResult = LoginResult::Impossible;

    /// Numeric code. `IMPOSSIBLE` and `ALREADY` both map to 2.
    pub fn code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Error => 1,
            Self::Impossible => 2,
        }
    }

    /// Only [`LoginResult::Error`] is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for LoginResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Impossible => "impossible",
        };
        f.write_str(label)
    }
}
