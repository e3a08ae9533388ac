// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifier newtypes.
//!
//! All identifiers are opaque strings. Engine container ids run to 64 hex
//! characters, so ids are heap-backed rather than inline buffers.

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// Define a typed id newtype over `String`.
///
/// Generated types are `Clone + Eq + Hash`, order by string value, display
/// transparently, serialize as plain strings, and support `Borrow<str>` so
/// `HashMap<XId, _>` can be queried with `&str`.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// First `n` characters, for log-friendly display.
            pub fn short(&self, n: usize) -> &str {
                $crate::id::short(&self.0, n)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:?}", self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(Self(String::deserialize(deserializer)?))
            }
        }
    };
}

crate::define_id! {
    /// Workload identifier (`deploy-<unix>` / `gs-<unix>`).
    pub struct WorkloadId;
}

crate::define_id! {
    /// Organization identifier.
    pub struct OrgId;
}

crate::define_id! {
    /// Worker node identifier.
    pub struct NodeId;
}

crate::define_id! {
    /// Engine container identifier (full 64-char or prefix).
    pub struct ContainerId;
}

crate::define_id! {
    /// Build record identifier.
    pub struct BuildId;
}

crate::define_id! {
    /// User identifier.
    pub struct UserId;
}

impl BuildId {
    /// Generate a fresh build id with a nanoid suffix.
    pub fn generate() -> Self {
        Self::new(format!("build-{}", nanoid::nanoid!(12)))
    }
}

impl ContainerId {
    /// Docker-style prefix match: either id is a prefix of the other,
    /// case-insensitively.
    pub fn matches(&self, other: &str) -> bool {
        let a = self.0.to_ascii_lowercase();
        let b = other.to_ascii_lowercase();
        !a.is_empty() && !b.is_empty() && (a.starts_with(&b) || b.starts_with(&a))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
