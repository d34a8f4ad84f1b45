//! Purpose: Parse and validate paste expiration tokens.
//! Exports: `Expiration`, `Expiration::from_flags`.
//! Role: Reject bad expiration input before any request is built.
//! Invariants: At most one expiration flag per post; zero flags means the default.
//! Invariants: Wire values match the service form field (`onetime`, `3600`, `86000`, `604800`).
use super::error::{Error, ErrorKind};
use std::fmt;
use std::str::FromStr;

/// How long the remote service keeps a paste.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Expiration {
    /// Deleted after two views.
    Onetime,
    #[default]
    Hour,
    Day,
    Week,
}

impl Expiration {
    pub const ALL: [Expiration; 4] = [
        Expiration::Onetime,
        Expiration::Hour,
        Expiration::Day,
        Expiration::Week,
    ];

    /// Value sent in the `expires` form field.
    pub fn wire_value(self) -> &'static str {
        match self {
            Expiration::Onetime => "onetime",
            Expiration::Hour => "3600",
            Expiration::Day => "86000",
            Expiration::Week => "604800",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Expiration::Onetime => "onetime",
            Expiration::Hour => "hour",
            Expiration::Day => "day",
            Expiration::Week => "week",
        }
    }

    /// Resolves a list of expiration flags, falling back to `default` when empty.
    pub fn from_flags<S: AsRef<str>>(flags: &[S], default: Expiration) -> Result<Self, Error> {
        match flags {
            [] => Ok(default),
            [flag] => flag.as_ref().parse(),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message("too many options for expiration")
                .with_hint("Pass a single -1 flag: x (onetime), h (hour), d (day) or w (week).")),
        }
    }
}

impl FromStr for Expiration {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw.trim().to_ascii_lowercase();
        match token.as_str() {
            "x" | "onetime" | "once" => Ok(Expiration::Onetime),
            "h" | "hour" | "1h" | "1 hour" => Ok(Expiration::Hour),
            "d" | "day" | "1d" | "1 day" => Ok(Expiration::Day),
            "w" | "week" | "1w" | "1 week" => Ok(Expiration::Week),
            "0" | "never" => Err(Error::new(ErrorKind::Usage)
                .with_message("invalid expiration delay: never")
                .with_hint("The service does not keep pastes forever; use w (one week) at most.")),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid expiration delay: {}", raw.trim()))
                .with_hint("Use x (onetime), h (hour), d (day) or w (week).")),
        }
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
