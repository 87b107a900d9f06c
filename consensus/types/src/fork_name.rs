use crate::{ChainSpec, Epoch};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// The closed, ordered set of protocol upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub enum ForkName {
    Base,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
    Electra,
    Fulu,
}

impl ForkName {
    pub fn list_all() -> Vec<ForkName> {
        vec![
            ForkName::Base,
            ForkName::Altair,
            ForkName::Bellatrix,
            ForkName::Capella,
            ForkName::Deneb,
            ForkName::Electra,
            ForkName::Fulu,
        ]
    }

    pub fn latest() -> ForkName {
        // This unwrap is safe as long as we have 1+ forks. It is tested below.
        *ForkName::list_all().last().unwrap()
    }

    /// Returns the `ForkName` given the slot and depending on the fork schedule in `spec`.
    pub fn from_epoch(epoch: Epoch, spec: &ChainSpec) -> ForkName {
        spec.fork_name_at_epoch(epoch)
    }

    /// Return the name of the fork immediately prior to the current one.
    ///
    /// If `self` is `ForkName::Base` then `Base` is returned.
    pub fn previous_fork(self) -> Option<ForkName> {
        match self {
            ForkName::Base => None,
            ForkName::Altair => Some(ForkName::Base),
            ForkName::Bellatrix => Some(ForkName::Altair),
            ForkName::Capella => Some(ForkName::Bellatrix),
            ForkName::Deneb => Some(ForkName::Capella),
            ForkName::Electra => Some(ForkName::Deneb),
            ForkName::Fulu => Some(ForkName::Electra),
        }
    }

    /// Return the name of the fork immediately after the current one.
    ///
    /// If `self` is the last known fork and has no successor, `None` is returned.
    pub fn next_fork(self) -> Option<ForkName> {
        match self {
            ForkName::Base => Some(ForkName::Altair),
            ForkName::Altair => Some(ForkName::Bellatrix),
            ForkName::Bellatrix => Some(ForkName::Capella),
            ForkName::Capella => Some(ForkName::Deneb),
            ForkName::Deneb => Some(ForkName::Electra),
            ForkName::Electra => Some(ForkName::Fulu),
            ForkName::Fulu => None,
        }
    }

    pub fn altair_enabled(self) -> bool {
        self >= ForkName::Altair
    }

    pub fn bellatrix_enabled(self) -> bool {
        self >= ForkName::Bellatrix
    }

    pub fn capella_enabled(self) -> bool {
        self >= ForkName::Capella
    }

    pub fn deneb_enabled(self) -> bool {
        self >= ForkName::Deneb
    }

    pub fn electra_enabled(self) -> bool {
        self >= ForkName::Electra
    }

    pub fn fulu_enabled(self) -> bool {
        self >= ForkName::Fulu
    }
}

/// Map a fork name into a fork-versioned superstruct type like `BeaconBlock`.
///
/// The `$body` expression is where the magic happens. It is a closure-like expression of the form:
///
/// ```text
/// |$fork_variant, $t| body
/// ```
///
/// where `$fork_variant` is a token (e.g. `base`) and `$t` is a type alias for a fork-specific
/// type, which may be used in `body`.
#[macro_export]
macro_rules! map_fork_name {
    ($fork_name:expr, $t:tt, $body:expr) => {
        map_fork_name_with!($fork_name, $t, |()| ($body, ())).0
    };
}

/// Map a fork name into a tuple of `($t, $extra)` where `$t` is a superstruct type.
#[macro_export]
macro_rules! map_fork_name_with {
    ($fork_name:expr, $t:tt, $f:expr) => {
        match $fork_name {
            ForkName::Base => {
                let (value, extra) = $f(());
                ($t::Base(value), extra)
            }
            ForkName::Altair => {
                let (value, extra) = $f(());
                ($t::Altair(value), extra)
            }
            ForkName::Bellatrix => {
                let (value, extra) = $f(());
                ($t::Bellatrix(value), extra)
            }
            ForkName::Capella => {
                let (value, extra) = $f(());
                ($t::Capella(value), extra)
            }
            ForkName::Deneb => {
                let (value, extra) = $f(());
                ($t::Deneb(value), extra)
            }
            ForkName::Electra => {
                let (value, extra) = $f(());
                ($t::Electra(value), extra)
            }
            ForkName::Fulu => {
                let (value, extra) = $f(());
                ($t::Fulu(value), extra)
            }
        }
    };
}

impl FromStr for ForkName {
    type Err = String;

    fn from_str(fork_name: &str) -> Result<Self, String> {
        Ok(match fork_name.to_lowercase().as_ref() {
            "phase0" | "base" => ForkName::Base,
            "altair" => ForkName::Altair,
            "bellatrix" | "merge" => ForkName::Bellatrix,
            "capella" => ForkName::Capella,
            "deneb" => ForkName::Deneb,
            "electra" => ForkName::Electra,
            "fulu" => ForkName::Fulu,
            _ => return Err(format!("unknown fork name: {}", fork_name)),
        })
    }
}

impl Display for ForkName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ForkName::Base => "phase0".fmt(f),
            ForkName::Altair => "altair".fmt(f),
            ForkName::Bellatrix => "bellatrix".fmt(f),
            ForkName::Capella => "capella".fmt(f),
            ForkName::Deneb => "deneb".fmt(f),
            ForkName::Electra => "electra".fmt(f),
            ForkName::Fulu => "fulu".fmt(f),
        }
    }
}

impl From<ForkName> for String {
    fn from(fork: ForkName) -> String {
        fork.to_string()
    }
}

impl TryFrom<String> for ForkName {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        Self::from_str(&s)
    }
}

/// The error returned when a state or block is the wrong variant for its fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InconsistentFork {
    pub fork_at_slot: ForkName,
    pub object_fork: ForkName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_and_next_fork_consistent() {
        assert_eq!(ForkName::latest().next_fork(), None);
        assert_eq!(ForkName::Base.previous_fork(), None);

        for (prev_fork, fork) in ForkName::list_all().iter().zip(ForkName::list_all().iter().skip(1))
        {
            assert_eq!(prev_fork.next_fork(), Some(*fork));
            assert_eq!(fork.previous_fork(), Some(*prev_fork));
        }
    }

    #[test]
    fn fork_ordering() {
        let all = ForkName::list_all();
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(ForkName::Electra.altair_enabled());
        assert!(!ForkName::Base.altair_enabled());
        assert!(ForkName::Fulu.fulu_enabled());
        assert!(!ForkName::Electra.fulu_enabled());
    }

    #[test]
    fn fork_name_case_insensitive_round_trip() {
        for fork in ForkName::list_all() {
            assert_eq!(ForkName::from_str(&fork.to_string()), Ok(fork));
        }
        assert_eq!(ForkName::from_str("PHASE0"), Ok(ForkName::Base));
        assert_eq!(ForkName::from_str("merge"), Ok(ForkName::Bellatrix));
        assert!(ForkName::from_str("no-such-fork").is_err());
    }
}
