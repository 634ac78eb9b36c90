//! Command outcomes: the status line that terminates every AT reply.
//!
//! A reply ends in exactly one status line:
//!
//! - `OK`
//! - `ERROR`
//! - `+CME ERROR: <code-or-name>` / `+CMS ERROR: <code-or-name>`
//!
//! The leading `+` on family errors is optional. A family error's field is
//! first read as an integer and otherwise looked up by name in the family's
//! table; codes without a table entry are preserved numerically.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tables::{CME_ERRORS, CMS_ERRORS};

/// One of the two vendor error families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorFamily {
    /// Mobile equipment errors.
    Cme,
    /// Message service errors.
    Cms,
}

impl ErrorFamily {
    /// The status line prefix for this family, without the leading `+`.
    pub fn prefix(self) -> &'static str {
        match self {
            ErrorFamily::Cme => "CME",
            ErrorFamily::Cms => "CMS",
        }
    }

    /// Every `(code, name)` pair defined for this family, in code order.
    pub fn entries(self) -> &'static [(u16, &'static str)] {
        match self {
            ErrorFamily::Cme => CME_ERRORS,
            ErrorFamily::Cms => CMS_ERRORS,
        }
    }

    /// Look up the symbolic name of a code.
    pub fn name(self, code: u16) -> Option<&'static str> {
        self.entries()
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| *name)
    }

    /// Look up the code of a symbolic name.
    pub fn code(self, name: &str) -> Option<u16> {
        self.entries()
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(code, _)| *code)
    }
}

/// The outcome of a command.
///
/// Equality is structural: two family errors are equal when both the family
/// and the code match, however the code was spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    /// `OK`.
    Ok,
    /// A bare `ERROR`.
    GenericError,
    /// A `CME`/`CMS` error carrying its numeric code.
    FamilyError { family: ErrorFamily, code: u16 },
}

impl ResultCode {
    /// Shorthand for a `+CME ERROR` result.
    pub fn cme(code: u16) -> Self {
        ResultCode::FamilyError {
            family: ErrorFamily::Cme,
            code,
        }
    }

    /// Shorthand for a `+CMS ERROR` result.
    pub fn cms(code: u16) -> Self {
        ResultCode::FamilyError {
            family: ErrorFamily::Cms,
            code,
        }
    }

    /// Parse a single status line with its terminator already removed.
    ///
    /// Returns `None` if the line is not a status line, including family
    /// errors whose field is neither an integer nor a known name.
    pub fn parse(line: &str) -> Option<Self> {
        if line == "OK" {
            return Some(ResultCode::Ok);
        }

        let line = line.strip_prefix('+').unwrap_or(line);
        if line == "ERROR" {
            return Some(ResultCode::GenericError);
        }

        let family = if line.starts_with(ErrorFamily::Cme.prefix()) {
            ErrorFamily::Cme
        } else if line.starts_with(ErrorFamily::Cms.prefix()) {
            ErrorFamily::Cms
        } else {
            return None;
        };

        let (head, field) = line.split_once(':')?;
        if head.trim_end() != format!("{} ERROR", family.prefix()) {
            return None;
        }

        let field = field.trim();
        let code = match field.parse::<u16>() {
            Ok(code) => code,
            Err(_) => family.code(field)?,
        };

        Some(ResultCode::FamilyError { family, code })
    }

    /// Whether this is `OK`.
    pub fn is_ok(&self) -> bool {
        matches!(self, ResultCode::Ok)
    }

    /// The symbolic name of a family error, if the table has one.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            ResultCode::FamilyError { family, code } => family.name(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Ok => write!(f, "OK"),
            ResultCode::GenericError => write!(f, "ERROR"),
            ResultCode::FamilyError { family, code } => match family.name(*code) {
                Some(name) => write!(f, "+{} ERROR: {}", family.prefix(), name),
                None => write!(f, "+{} ERROR: {}", family.prefix(), code),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_and_generic() {
        assert_eq!(ResultCode::parse("OK"), Some(ResultCode::Ok));
        assert_eq!(ResultCode::parse("ERROR"), Some(ResultCode::GenericError));
        assert_eq!(ResultCode::parse("+ERROR"), Some(ResultCode::GenericError));
        assert_eq!(ResultCode::parse("OKAY"), None);
        assert_eq!(ResultCode::parse("#XSOCKET: 1,1"), None);
    }

    #[test]
    fn test_parse_family_code_and_name_agree() {
        let by_code = ResultCode::parse("+CME ERROR: 11").unwrap();
        let by_name = ResultCode::parse("+CME ERROR: SIM_PIN_REQUIRED").unwrap();
        assert_eq!(by_code, ResultCode::cme(11));
        assert_eq!(by_code, by_name);

        assert_eq!(ResultCode::parse("CMS ERROR: 500"), Some(ResultCode::cms(500)));
    }

    #[test]
    fn test_parse_unknown_code_is_preserved() {
        let result = ResultCode::parse("+CME ERROR: 999").unwrap();
        assert_eq!(result, ResultCode::cme(999));
        assert_eq!(result.name(), None);
        assert_eq!(result.to_string(), "+CME ERROR: 999");
    }

    #[test]
    fn test_parse_unknown_name_is_rejected() {
        assert_eq!(ResultCode::parse("+CME ERROR: NOT_A_REAL_ERROR"), None);
        assert_eq!(ResultCode::parse("+CME ERROR"), None);
        assert_eq!(ResultCode::parse("+CMEX ERROR: 3"), None);
    }

    #[test]
    fn test_families_are_distinct() {
        assert_ne!(ResultCode::cme(10), ResultCode::cms(10));
        assert_ne!(ResultCode::cme(10), ResultCode::GenericError);
    }

    #[test]
    fn test_table_round_trip() {
        for family in [ErrorFamily::Cme, ErrorFamily::Cms] {
            for &(code, name) in family.entries() {
                assert_eq!(family.name(family.code(name).unwrap()), Some(name));
                assert_eq!(family.code(family.name(code).unwrap()), Some(code));
            }
        }
    }

    #[test]
    fn test_display_uses_names() {
        assert_eq!(ResultCode::Ok.to_string(), "OK");
        assert_eq!(
            ResultCode::cms(310).to_string(),
            "+CMS ERROR: SIM_NOT_INSERTED"
        );
        assert_eq!(ResultCode::cme(11).name(), Some("SIM_PIN_REQUIRED"));
    }
}
