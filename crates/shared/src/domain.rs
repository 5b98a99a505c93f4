use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(NoteId);

/// Which flavour of note list the client drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListVariant {
    /// Appends new notes, updates in place, no timestamps, no search.
    Basic,
    /// Prepends new and updated notes, stamps `created_at`, supports search.
    #[default]
    Advanced,
}

impl ListVariant {
    pub fn supports_search(self) -> bool {
        matches!(self, Self::Advanced)
    }

    pub fn stamps_created_at(self) -> bool {
        matches!(self, Self::Advanced)
    }

    pub fn prepends(self) -> bool {
        matches!(self, Self::Advanced)
    }
}

impl std::str::FromStr for ListVariant {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown list variant '{other}'")),
        }
    }
}
