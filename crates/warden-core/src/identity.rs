// SPDX-License-Identifier: BUSL-1.1
//! # Identifier Newtypes
//!
//! Domain-primitive newtypes for the platform identifiers used throughout
//! the engine. Snowflakes are 64-bit integers but are conventionally
//! exchanged as decimal strings on the wire; serde round-trips them as
//! strings so records survive the platform's JSON payloads unchanged.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Error raised when a snowflake identifier fails to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid snowflake identifier: {value:?}")]
pub struct IdParseError {
    /// The rejected input.
    pub value: String,
}

/// Implements a snowflake identifier newtype: constructors, `Display`,
/// `FromStr`, and string-based serde. Parsing routes through `FromStr`
/// so invalid values are rejected at deserialization time.
macro_rules! snowflake_id {
    ($(#[$doc:meta])* $ty:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $ty(u64);

        impl $ty {
            /// Wrap a raw snowflake value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Access the raw snowflake value.
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $ty {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $ty {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| IdParseError { value: s.to_string() })
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

snowflake_id! {
    /// A unique identifier for a user, global across all guilds.
    UserId
}

snowflake_id! {
    /// A unique identifier for a guild (an independent group space).
    GuildId
}

snowflake_id! {
    /// A unique identifier for a role within a guild.
    RoleId
}

impl RoleId {
    /// Whether this role is the guild's implicit "everyone" role.
    ///
    /// The platform assigns the everyone role the same snowflake as the
    /// guild itself.
    pub const fn is_everyone(&self, guild: GuildId) -> bool {
        self.0 == guild.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_snowflakes() {
        let id: UserId = "216303189073461248".parse().expect("valid snowflake");
        assert_eq!(id.get(), 216303189073461248);
        assert_eq!(id.to_string(), "216303189073461248");
    }

    #[test]
    fn rejects_non_numeric_input() {
        let err = "not-a-snowflake".parse::<RoleId>().unwrap_err();
        assert_eq!(err.value, "not-a-snowflake");
    }

    #[test]
    fn serde_round_trips_as_string() {
        let id = GuildId::new(857750554713391115);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"857750554713391115\"");
        let back: GuildId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn everyone_role_shares_the_guild_snowflake() {
        let guild = GuildId::new(42);
        assert!(RoleId::new(42).is_everyone(guild));
        assert!(!RoleId::new(43).is_everyone(guild));
    }
}
