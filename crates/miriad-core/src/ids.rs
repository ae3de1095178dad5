//! Branded ID newtypes and the monotonic identifier service.
//!
//! Every entity has a distinct ID type implemented as a newtype wrapper
//! around `String`, so a summary ID can never be passed where a message ID
//! is expected. IDs are ULIDs with a short type prefix (`message_01H...`),
//! which makes them lexicographically sortable by creation time.
//!
//! The [`IdService`] wraps a monotonic generator: two IDs minted in the same
//! millisecond still sort in mint order.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Wrap an existing string value.
            #[must_use]
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a temporal message.
    MessageId, "message_"
}

branded_id! {
    /// Unique identifier for a temporal summary.
    SummaryId, "summary_"
}

branded_id! {
    /// Unique identifier for a background worker run.
    WorkerId, "worker_"
}

branded_id! {
    /// Unique identifier for a session.
    SessionId, "session_"
}

branded_id! {
    /// Unique identifier for a tool call within a turn.
    ToolCallId, "call_"
}

/// Mints prefixed, lexicographically monotonic IDs.
///
/// The underlying ULID generator increments the random component when two
/// IDs land in the same millisecond, so program order is preserved even
/// under rapid minting.
pub struct IdService {
    generator: Mutex<ulid::Generator>,
}

impl IdService {
    pub fn new() -> Self {
        Self {
            generator: Mutex::new(ulid::Generator::new()),
        }
    }

    fn mint(&self, prefix: &str) -> String {
        let mut generator = self.generator.lock();
        // Overflow of the random component within one millisecond is the
        // only failure mode; fall back to a fresh ULID.
        let ulid = generator.generate().unwrap_or_else(|_| Ulid::new());
        format!("{prefix}{ulid}")
    }

    pub fn message_id(&self) -> MessageId {
        MessageId::from_raw(self.mint(MessageId::PREFIX))
    }

    pub fn summary_id(&self) -> SummaryId {
        SummaryId::from_raw(self.mint(SummaryId::PREFIX))
    }

    pub fn worker_id(&self) -> WorkerId {
        WorkerId::from_raw(self.mint(WorkerId::PREFIX))
    }

    pub fn session_id(&self) -> SessionId {
        SessionId::from_raw(self.mint(SessionId::PREFIX))
    }

    pub fn tool_call_id(&self) -> ToolCallId {
        ToolCallId::from_raw(self.mint(ToolCallId::PREFIX))
    }
}

impl Default for IdService {
    fn default() -> Self {
        Self::new()
    }
}
