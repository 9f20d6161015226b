//! Conversation and turn identifiers
//!
//! Both wrap time-ordered UUIDs, so sorting by id sorts by creation. They
//! render as `CNV-<uuid>` / `TRN-<uuid>` and parse with or without the
//! prefix; on the wire (serde) they are bare UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Allocates a fresh UUIDv7 identifier
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Uuid::parse_str(raw).map(Self)
            }
        }
    };
}

define_id!(ConversationId, "CNV");
define_id!(TurnId, "TRN");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_prefix() {
        assert!(ConversationId::new_v7().to_string().starts_with("CNV-"));
        assert!(TurnId::new_v7().to_string().starts_with("TRN-"));
    }

    #[test]
    fn test_prefix_is_per_type() {
        let turn = TurnId::new_v7().to_string();
        let bare = turn.trim_start_matches("TRN-");
        assert!(turn.parse::<ConversationId>().is_err());
        assert_eq!(bare.parse::<ConversationId>().unwrap().to_string(), format!("CNV-{}", bare));
    }
}
