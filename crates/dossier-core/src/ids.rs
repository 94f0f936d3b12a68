//! Typed identifiers for runs, invocations and correlation.
//!
//! Each id is a newtype over a prefixed UUID v7 string (`trc_…`, `inv_…`,
//! `cor_…`), so a trace id cannot be passed where an invocation id is
//! expected and log lines stay greppable by kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Id prefix for this kind.
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh time-ordered id.
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}{}", $prefix, Uuid::now_v7().simple()))
            }

            /// Wrap an existing id string without validation.
            #[must_use]
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Borrow the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
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

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

prefixed_id! {
    /// Trace id attached to an orchestration run or a single agent invocation.
    TraceId, "trc_"
}

prefixed_id! {
    /// Unique id of one skill invocation audit record.
    InvocationId, "inv_"
}

prefixed_id! {
    /// Correlation id sent to remote skill servers to join their logs with ours.
    CorrelationId, "cor_"
}

impl CorrelationId {
    /// Derive a correlation id from the trace id of the step that made the call.
    #[must_use]
    pub fn for_trace(trace: &TraceId) -> Self {
        let suffix = trace
            .as_str()
            .strip_prefix(TraceId::PREFIX)
            .unwrap_or(trace.as_str());
        Self(format!("{}{suffix}", Self::PREFIX))
    }
}
