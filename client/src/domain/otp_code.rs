//! One-time code value type.

use std::fmt;

/// Number of digits in a one-time code.
pub const OTP_CODE_LENGTH: usize = 6;

/// Validation errors returned by [`OtpCode::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpCodeValidationError {
    /// The code is not exactly [`OTP_CODE_LENGTH`] characters long.
    WrongLength {
        /// Number of characters supplied.
        actual: usize,
    },
    /// The code contains something other than ASCII digits.
    NonDigit,
}

impl fmt::Display for OtpCodeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength { actual } => write!(
                f,
                "verification code must be exactly {OTP_CODE_LENGTH} digits (got {actual})"
            ),
            Self::NonDigit => write!(f, "verification code may only contain digits"),
        }
    }
}

impl std::error::Error for OtpCodeValidationError {}

/// Six-digit one-time code entered by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Validate raw user input.
    ///
    /// Input is taken as-is: surrounding whitespace counts as a non-digit.
    ///
    /// # Examples
    /// ```
    /// use verification_client::domain::OtpCode;
    ///
    /// assert!(OtpCode::parse("123456").is_ok());
    /// assert!(OtpCode::parse("12a456").is_err());
    /// assert!(OtpCode::parse("12345").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, OtpCodeValidationError> {
        if !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(OtpCodeValidationError::NonDigit);
        }
        if raw.len() != OTP_CODE_LENGTH {
            return Err(OtpCodeValidationError::WrongLength { actual: raw.len() });
        }
        Ok(Self(raw.to_owned()))
    }

    /// Digits as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for OtpCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}
