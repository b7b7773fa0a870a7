use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A millisecond-precise UNIX timestamp.
///
/// Group generations are stamped with one of these at creation time, and the
/// host platform hands us an approximate one for every received message. The
/// two are compared when deciding whether a revoked key was used after its
/// revocation point, so they share a single type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixMillis(u64);

impl UnixMillis {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

        UnixMillis(millis)
    }

    pub const fn from_millis(millis: u64) -> Self {
        UnixMillis(millis)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    pub const fn saturating_add(self, millis: u64) -> Self {
        UnixMillis(self.0.saturating_add(millis))
    }
}

impl std::fmt::Display for UnixMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_millis() {
        let earlier = UnixMillis::from_millis(1_000);
        let later = UnixMillis::from_millis(2_000);

        assert!(earlier < later);
        assert_eq!(earlier.saturating_add(1_000), later);
    }

    #[test]
    fn now_is_not_epoch() {
        assert!(
            UnixMillis::now() > UnixMillis::from_millis(0),
            "the system clock should be past 1970"
        );
    }
}
