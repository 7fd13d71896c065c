//! Explicit identities for records, groups, aggregators and profilers.
//!
//! Every entity draws from one process-wide monotonic counter at creation,
//! so an identity is never reused while the process lives and snapshots
//! can key maps by plain integers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

macro_rules! identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub(crate) fn next() -> Self {
                Self(next_id())
            }

            /// Raw integer value, as written on the wire
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

identity!(
    /// Identity of one record
    RecordId
);
identity!(
    /// Identity of one group
    GroupId
);
identity!(
    /// Identity of one aggregator
    AggregatorId
);
identity!(
    /// Identity of one profiler
    ProfilerId
);
