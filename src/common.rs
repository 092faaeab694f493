//! Shared identifier types used across the codebase

use std::borrow::Borrow;
use std::fmt;

/// Type-safe wrapper for a producer-assigned session id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionId(pub String);

/// Type-safe wrapper for a worker/host id reporting resource metrics
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InstanceId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Get the underlying string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the id has not been learned yet
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(SessionId);
string_id!(InstanceId);
