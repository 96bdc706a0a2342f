//! Keyed enum generation.
//!
//! Every report and ledger vocabulary in this crate is a closed set of values
//! that travel as stable string keys. `keyed_enum!` generates the enum, its
//! `key()`, an `ALL` table, `FromStr`, `Display` and key-based serde. A value
//! may list legacy keys after its key (`Value = "Key" | "Old-Key"`); those
//! parse but are never emitted.
//! `report_enum!` adds a human `translation()` on top.

/// Error returned when a wire key does not name a known value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} key: {key:?}")]
pub struct UnknownKey {
    pub kind: &'static str,
    pub key: String,
}

macro_rules! keyed_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident = $key:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            /// Every declared value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable wire key.
            pub fn key(self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::keyed::UnknownKey;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($key $(| $alias)* => Ok($name::$variant),)+
                    other => Err($crate::keyed::UnknownKey {
                        kind: stringify!($name),
                        key: other.to_string(),
                    }),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.key())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.key())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let key = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                key.parse().map_err(::serde::de::Error::custom)
            }
        }
    };
}

macro_rules! report_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident = $key:literal $(| $alias:literal)* => $translation:literal),+ $(,)?
        }
    ) => {
        $crate::keyed::keyed_enum! {
            $(#[$meta])*
            $vis enum $name {
                $($variant = $key $(| $alias)*),+
            }
        }

        impl $name {
            /// Human display name, used in notification emails.
            pub fn translation(self) -> &'static str {
                match self {
                    $($name::$variant => $translation),+
                }
            }
        }
    };
}

pub(crate) use keyed_enum;
pub(crate) use report_enum;
