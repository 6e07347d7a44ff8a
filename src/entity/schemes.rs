/*!
This modules gives the tooling necessary to parse a scheme tag, such as `"B-PATIENT"`, into its
prefix and its label.
*/
use enum_iterator::Sequence;
use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

/// Tag emitted for tokens outside of any entity.
pub(crate) const OUTSIDE: &str = "O";

/// Char separating the prefix from the label.
pub(crate) const DELIMITER: char = '-';

#[derive(Debug, PartialEq, Hash, Clone, Copy, Sequence, Eq)]
/// Prefix represent an annotation specifying the place of a token in a chunk. The BIOES letters
/// `E` and `S` are accepted when parsing and are read as `L` and `U`.
pub enum Prefix {
    /// Begin
    B,
    /// Inside
    I,
    /// Last
    L,
    /// Unit
    U,
    /// Outside
    O,
}

impl Prefix {
    /// Does this prefix close the currently open span?
    pub(crate) fn is_last(&self) -> bool {
        matches!(self, Prefix::L)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::B => "B",
            Prefix::I => "I",
            Prefix::L => "L",
            Prefix::U => "U",
            Prefix::O => "O",
        }
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Could not parse the string into a `Prefix`
pub struct PrefixError(String);

impl Display for PrefixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Could not parse the following string into a Prefix: {}",
            self.0
        )
    }
}

impl Error for PrefixError {}

impl FromStr for Prefix {
    type Err = PrefixError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(Prefix::B),
            "I" => Ok(Prefix::I),
            "L" | "E" => Ok(Prefix::L),
            "U" | "S" => Ok(Prefix::U),
            "O" => Ok(Prefix::O),
            _ => Err(PrefixError(String::from(s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A tag string lacks the expected `PREFIX-LABEL` shape.
pub struct InvalidTagFormatError(pub(crate) String);

impl InvalidTagFormatError {
    /// The offending tag.
    pub fn tag(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InvalidTagFormatError {
    fn from(value: &str) -> Self {
        InvalidTagFormatError(String::from(value))
    }
}

impl Display for InvalidTagFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid entity format: \"{}\". Expected a tag shaped like `PREFIX{}LABEL`",
            self.0, DELIMITER
        )
    }
}

impl Error for InvalidTagFormatError {}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
/// A parsed scheme tag, borrowing its label from the raw tag.
pub(crate) struct SchemeTag<'a> {
    /// The prefix, such as `B`, `I`, `O`, etc.
    pub(crate) prefix: Prefix,
    /// The label, such as `"PATIENT"`, `"DATE"`
    pub(crate) label: &'a str,
}

impl<'a> SchemeTag<'a> {
    /// Splits the tag on its first delimiter. The label keeps any further delimiter, so
    /// `"B-ID-NUM"` has the label `"ID-NUM"`. An unknown prefix is read as `I`, so the token
    /// continues the open span of its label.
    pub(crate) fn parse(raw: &'a str) -> Result<Self, InvalidTagFormatError> {
        let (prefix, label) = raw
            .split_once(DELIMITER)
            .ok_or_else(|| InvalidTagFormatError::from(raw))?;
        if label.is_empty() {
            return Err(InvalidTagFormatError::from(raw));
        }
        let prefix = Prefix::from_str(prefix).unwrap_or_else(|e| {
            log::debug!("{}, reading tag {} as a continuation", e, raw);
            Prefix::I
        });
        Ok(SchemeTag { prefix, label })
    }
}

/// Does this tag or label carry a scheme prefix?
#[inline]
pub(crate) fn has_delimiter(raw: &str) -> bool {
    raw.contains(DELIMITER)
}
