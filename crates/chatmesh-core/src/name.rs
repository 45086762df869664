//! Bounded, fixed-width strings.
//!
//! Every string field of the protocol has a fixed maximum width so that
//! non-Rust peers can lay messages out as fixed-size records. A value that
//! does not fit is rejected at construction, and the same check runs when
//! deserialising, so an oversized string never reaches the router.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a display name, in bytes.
pub const NAME_MAX: usize = 15;
/// Maximum length of a room name, in bytes.
pub const ROOM_MAX: usize = 19;
/// Maximum length of a chat message body, in bytes.
pub const BODY_MAX: usize = 255;

/// Room every client is placed in on registration and on leave.
pub const GLOBAL_ROOM: &str = "global";

/// A string of at most `N` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bounded<const N: usize>(String);

/// A client's display name.
pub type Name = Bounded<NAME_MAX>;
/// A room name.
pub type RoomName = Bounded<ROOM_MAX>;
/// A chat message body.
pub type Body = Bounded<BODY_MAX>;

impl<const N: usize> Bounded<N> {
    /// Create a bounded string, rejecting values longer than `N` bytes.
    pub fn new(value: impl Into<String>) -> Result<Self, NameError> {
        let value = value.into();
        if value.len() > N {
            return Err(NameError::TooLong {
                max: N,
                len: value.len(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Bounded<ROOM_MAX> {
    /// The default room.
    pub fn global() -> Self {
        Self(GLOBAL_ROOM.to_string())
    }

    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_ROOM
    }
}

impl<const N: usize> fmt::Display for Bounded<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> FromStr for Bounded<N> {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<const N: usize> TryFrom<String> for Bounded<N> {
    type Error = NameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl<const N: usize> From<Bounded<N>> for String {
    fn from(value: Bounded<N>) -> Self {
        value.0
    }
}

impl<const N: usize> PartialEq<str> for Bounded<N> {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Error building a bounded string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("value is {len} bytes, at most {max} allowed")]
    TooLong { max: usize, len: usize },
}
