use std::error::Error;
use std::fmt::{Arguments, Display};
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Trait used when visiting all the log-record's key-value pairs
///
/// The `key` argument is `Some(key)` for normal values, and `None`
/// for members of an array.  `kv_null` is a key with presence but no
/// value.  Anything that needs formatting is passed to `kv_fmt` as
/// `format_args!` output so that the logger can format it directly
/// without an intermediate allocation.  An array is opened with
/// `kv_arr`, followed by its members, and then closed with
/// `kv_arrend` using the same key.
///
/// There is no way to terminate the visit early.  If the visitor hits
/// an error, it should record it and ignore any further calls.
pub trait LogVisitor {
    fn kv_u64(&mut self, key: Option<&str>, val: u64);
    fn kv_null(&mut self, key: Option<&str>);
    fn kv_str(&mut self, key: Option<&str>, val: &str);
    fn kv_fmt(&mut self, key: Option<&str>, val: &Arguments<'_>);
    fn kv_arr(&mut self, key: Option<&str>);
    fn kv_arrend(&mut self, key: Option<&str>);
}

/// Log record that is passed to a logger
pub struct LogRecord<'a> {
    /// Span identifier.  For records about a thunk this is the raw
    /// value of its most recent [`ActionKey`], otherwise 0.
    ///
    /// [`ActionKey`]: struct.ActionKey.html
    pub id: LogID,
    /// Logging level
    pub level: LogLevel,
    /// Logging target, or ""
    pub target: &'a str,
    /// Freeform formatted text
    pub fmt: Arguments<'a>,
    /// Key-value pairs.  Call this with your own [`LogVisitor`] to
    /// receive them.
    ///
    /// [`LogVisitor`]: trait.LogVisitor.html
    pub kvscan: &'a dyn Fn(&mut dyn LogVisitor),
}

/// Logging span identifier, or 0 for none
///
/// A [`Thunker`] opens a span when it starts performing a thunk and
/// closes it when the thunk has signalled completion, using the
/// thunk's latest [`ActionKey`] as the identifier.  Since action keys
/// are unique, so are the spans.
///
/// [`ActionKey`]: struct.ActionKey.html
/// [`Thunker`]: struct.Thunker.html
pub type LogID = u64;

/// Severity or span-marker level of a [`LogRecord`]
///
/// [`LogRecord`]: struct.LogRecord.html
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
#[non_exhaustive]
pub enum LogLevel {
    /// Very verbose output
    Trace = 0,

    /// Details of failures that were passed back to callers
    Debug = 1,

    /// General information
    Info = 2,

    /// Something went wrong on the loop thread, e.g. a panicking
    /// action or thunks abandoned at shutdown
    Warn = 3,

    /// Faults
    Error = 4,

    /// Disables severity-based logging when used as a filter level.
    /// Nothing is ever logged at this level.
    Off = 8,

    /// Span open: a thunk has started running on the loop thread.
    /// The `keys` array lists all its action keys.
    Open = 6,

    /// Span close: the thunk has signalled completion.  A `failed`
    /// or `panicked` presence key is added if it did not succeed.
    Close = 7,
}

// Levels with their names, in display order
const LEVELS: [(LogLevel, &str); 8] = [
    (LogLevel::Trace, "TRACE"),
    (LogLevel::Debug, "DEBUG"),
    (LogLevel::Info, "INFO"),
    (LogLevel::Warn, "WARN"),
    (LogLevel::Error, "ERROR"),
    (LogLevel::Off, "OFF"),
    (LogLevel::Open, "OPEN"),
    (LogLevel::Close, "CLOSE"),
];

impl LogLevel {
    /// Upper-case name of the level, e.g. "WARN"
    pub fn name(self) -> &'static str {
        LEVELS
            .iter()
            .find(|(level, _)| *level == self)
            .map_or("?", |(_, name)| *name)
    }

    /// All the defined levels, in display order
    pub fn all_levels() -> impl Iterator<Item = LogLevel> {
        LEVELS.iter().map(|(level, _)| *level)
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name().fmt(f)
    }
}

impl FromStr for LogLevel {
    type Err = LogLevelError;

    /// Case-insensitive match against the names returned by
    /// [`LogLevel::name`]
    ///
    /// [`LogLevel::name`]: enum.LogLevel.html#method.name
    fn from_str(s: &str) -> Result<LogLevel, LogLevelError> {
        let s = s.trim();
        LEVELS
            .iter()
            .find(|(_, name)| s.eq_ignore_ascii_case(name))
            .map(|(level, _)| *level)
            .ok_or(LogLevelError)
    }
}

/// Invalid [`LogLevel`] passed to [`LogLevel::from_str`]
///
/// [`LogLevel::from_str`]: enum.LogLevel.html#method.from_str
/// [`LogLevel`]: enum.LogLevel.html
#[derive(Debug, Eq, PartialEq)]
pub struct LogLevelError;
impl Error for LogLevelError {}
impl Display for LogLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        "invalid logging level".fmt(f)
    }
}

/// Set of enabled logging levels
///
/// Filters combine with `|` and `|=`.  Converting a severity level
/// with [`LogFilter::from`] also enables all the more severe levels,
/// and converting `Open` or `Close` enables both.
///
/// [`LogFilter::from`]: struct.LogFilter.html#method.from
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct LogFilter(u32);

impl LogFilter {
    /// Return a [`LogFilter`] with no levels enabled
    ///
    /// [`LogFilter`]: struct.LogFilter.html
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a [`LogFilter`] with all the listed levels enabled, each
    /// converted with [`LogFilter::from`]
    ///
    /// [`LogFilter::from`]: struct.LogFilter.html#method.from
    /// [`LogFilter`]: struct.LogFilter.html
    #[inline]
    pub fn all(levels: &[LogLevel]) -> Self {
        levels
            .iter()
            .fold(Self::new(), |acc, level| acc | Self::from(*level))
    }

    /// Test whether the given [`LogLevel`] is enabled
    ///
    /// [`LogLevel`]: enum.LogLevel.html
    #[inline]
    pub fn allows(&self, level: LogLevel) -> bool {
        0 != (self.0 & (1 << (level as u32)))
    }

    /// Test whether no levels are enabled
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl From<LogLevel> for LogFilter {
    #[inline]
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace
            | LogLevel::Debug
            | LogLevel::Info
            | LogLevel::Warn
            | LogLevel::Error
            | LogLevel::Off => Self(0x1F & (0x1F << level as u32)),
            LogLevel::Open | LogLevel::Close => {
                Self((1 << LogLevel::Open as u32) | (1 << LogLevel::Close as u32))
            }
        }
    }
}

impl BitOr for LogFilter {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LogFilter {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Display for LogFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = LEVELS
            .iter()
            .filter(|(level, _)| self.allows(*level))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "LogFilter({})", names.join(","))
    }
}

impl FromStr for LogFilter {
    type Err = LogLevelError;

    /// Parse a comma-separated list of level names, e.g. "info,open"
    fn from_str(s: &str) -> Result<LogFilter, LogLevelError> {
        let mut rv = LogFilter::new();
        for level in s.split(',') {
            rv |= LogFilter::from(LogLevel::from_str(level)?);
        }
        Ok(rv)
    }
}
