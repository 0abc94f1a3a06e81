//! Error category classification

use super::codes::ErrorCode;

/// Domain of an error code, taken from its leading digit.
///
/// Unassigned ranges fold into [`ErrorCategory::General`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    General,
    Auth,
    Permission,
    Order,
    /// Products and their cards
    Product,
    /// Storage and internal failures; logged at error level
    System,
}

impl ErrorCategory {
    pub fn from_code(code: u16) -> Self {
        match code {
            1000..2000 => Self::Auth,
            2000..3000 => Self::Permission,
            4000..5000 => Self::Order,
            6000..7000 => Self::Product,
            9000.. => Self::System,
            _ => Self::General,
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
