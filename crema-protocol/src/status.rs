//! Reply status codes

/// Status carried in characters 8..10 of every reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Status {
    None = 0x00,
    Success = 0x01,
    CrcError = 0x11,
    UnknownType = 0x12,
    ExecuteTimeout = 0x13,
    BlockNrError = 0x14,
    VersionMismatch = 0x15,
    NoValidRecipe = 0x16,
    RecipeNotActive = 0x17,
    NoZeroCross = 0x18,
    WrongVersion = 0x19,
    ImageNotValid = 0x1A,
    VerifyError = 0x1B,
    ErasePageError = 0x1C,
    CreateRollbackError = 0x1D,
    ImageTooBig = 0x1E,
    ImageCorrupt = 0x1F,
}

impl Status {
    /// Wire value
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire value
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::None,
            0x01 => Self::Success,
            0x11 => Self::CrcError,
            0x12 => Self::UnknownType,
            0x13 => Self::ExecuteTimeout,
            0x14 => Self::BlockNrError,
            0x15 => Self::VersionMismatch,
            0x16 => Self::NoValidRecipe,
            0x17 => Self::RecipeNotActive,
            0x18 => Self::NoZeroCross,
            0x19 => Self::WrongVersion,
            0x1A => Self::ImageNotValid,
            0x1B => Self::VerifyError,
            0x1C => Self::ErasePageError,
            0x1D => Self::CreateRollbackError,
            0x1E => Self::ImageTooBig,
            0x1F => Self::ImageCorrupt,
            _ => return None,
        })
    }

    /// True for every status except `None` and `Success`
    pub const fn is_error(self) -> bool {
        !matches!(self, Self::None | Self::Success)
    }
}

impl From<crate::hex::FieldError> for Status {
    fn from(_: crate::hex::FieldError) -> Self {
        // A payload that does not decode is treated like a type we do not know
        Status::UnknownType
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for code in 0..=0xFF {
            if let Some(status) = Status::from_u8(code) {
                assert_eq!(status.code(), code);
            }
        }
        assert_eq!(Status::from_u8(0x02), None);
        assert_eq!(Status::from_u8(0x20), None);
    }

    #[test]
    fn test_error_classification() {
        assert!(!Status::Success.is_error());
        assert!(!Status::None.is_error());
        assert!(Status::CrcError.is_error());
        assert!(Status::ImageCorrupt.is_error());
    }
}
