//! Server version parsing.
//!
//! `SELECT VERSION()` returns strings such as `5.7.26-log` or
//! `10.6.12-MariaDB-1:10.6.12+maria~ubu2004`. Everything after the first `-`
//! is a build description and is dropped.

/// Error returned when a version string has no usable numeric components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    /// Version string is empty.
    Empty,
    /// A dot-separated piece does not start with a digit.
    NotNumeric(String),
    /// A component does not fit in `u32`.
    OutOfRange(String),
}

impl std::fmt::Display for VersionParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionParseError::Empty => write!(f, "empty version string"),
            VersionParseError::NotNumeric(piece) => {
                write!(f, "version component '{}' is not numeric", piece)
            }
            VersionParseError::OutOfRange(piece) => {
                write!(f, "version component '{}' is out of range", piece)
            }
        }
    }
}

impl std::error::Error for VersionParseError {}

/// Parsed server version: at least one numeric component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    components: Vec<u32>,
}

impl ServerVersion {
    /// Parses a raw `VERSION()` string.
    ///
    /// Splits on `-` and keeps the first segment, splits that on `.` and takes
    /// the leading digits of each piece (`26a` → 26).
    pub fn parse(raw: &str) -> Result<Self, VersionParseError> {
        if raw.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let head = raw.split('-').next().unwrap_or(raw);
        let components = head
            .split('.')
            .map(leading_number)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }

    /// Builds a version from known components. Returns `None` if empty.
    pub fn from_components(components: Vec<u32>) -> Option<Self> {
        if components.is_empty() {
            None
        } else {
            Some(Self { components })
        }
    }

    pub fn major(&self) -> u32 {
        self.components[0]
    }

    /// Whether `SHOW GLOBAL STATUS` should be used for slow query counts.
    ///
    /// Only the major and the third component are compared (`major >= 5` and
    /// `third >= 2`); the minor component is ignored. A missing third
    /// component counts as 0.
    pub fn has_global_status(&self) -> bool {
        let third = self.components.get(2).copied().unwrap_or(0);
        self.major() >= 5 && third >= 2
    }

    /// Components rendered as decimal strings, as stored under `version`.
    pub fn components_as_strings(&self) -> Vec<String> {
        self.components.iter().map(u32::to_string).collect()
    }
}

impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.components_as_strings().join("."))
    }
}

fn leading_number(piece: &str) -> Result<u32, VersionParseError> {
    let end = piece
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(piece.len());
    let digits = &piece[..end];
    if digits.is_empty() {
        return Err(VersionParseError::NotNumeric(piece.to_string()));
    }
    digits
        .parse::<u32>()
        .map_err(|_| VersionParseError::OutOfRange(piece.to_string()))
}
