//! Version algebra over (date, stability) pairs.
//!
//! Every resource snapshot is identified by a calendar date and a stability
//! level. Versions order first by date, then by stability, and a query
//! resolves to the newest version at or before the queried date whose
//! stability is at least as strong as the queried one.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Release stability of a resource version, weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stability {
    Wip,
    Experimental,
    Beta,
    #[default]
    Ga,
}

impl Stability {
    /// All stabilities in ascending order.
    pub const ALL: [Stability; 4] = [
        Stability::Wip,
        Stability::Experimental,
        Stability::Beta,
        Stability::Ga,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Wip => "wip",
            Stability::Experimental => "experimental",
            Stability::Beta => "beta",
            Stability::Ga => "ga",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wip" | "work-in-progress" => Ok(Stability::Wip),
            "experimental" => Ok(Stability::Experimental),
            "beta" => Ok(Stability::Beta),
            "ga" => Ok(Stability::Ga),
            _ => Err(Error::ParseVersion {
                input: s.to_string(),
                reason: "unknown stability".to_string(),
            }),
        }
    }
}

/// Lifecycle of a version relative to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Dated in the future.
    Unreleased,
    /// Currently effective.
    Released,
    /// Superseded by a newer version of equal or stronger stability.
    Deprecated,
    /// Past the end of its deprecation period.
    Sunset,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Unreleased => "unreleased",
            Lifecycle::Released => "released",
            Lifecycle::Deprecated => "deprecated",
            Lifecycle::Sunset => "sunset",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Days after a superseding GA release before a deprecated GA version sunsets.
const GA_SUNSET_DAYS: i64 = 181;

/// A resource version: a UTC calendar date plus a stability level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub date: NaiveDate,
    pub stability: Stability,
}

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[0-9]{4}-(?:0[1-9]|1[0-2])-(?:0[1-9]|[12][0-9]|3[01]))(?:~(wip|work-in-progress|experimental|beta|ga))?$",
    )
    .expect("version grammar")
});

// Query syntax additionally admits a bare stability token, which stands for
// "the newest version of at least this stability as of today".
static QUERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(wip|work-in-progress|experimental|beta|(?:[0-9]{4}-(?:0[1-9]|1[0-2])-(?:0[1-9]|[12][0-9]|3[01])))(?:~(wip|work-in-progress|experimental|beta|ga))?$",
    )
    .expect("version query grammar")
});

impl Version {
    pub fn new(date: NaiveDate, stability: Stability) -> Self {
        Version { date, stability }
    }

    /// Parses the version query syntax accepted at API boundaries, which
    /// also allows a bare stability token (`experimental`) meaning "as of
    /// `today` at this stability".
    pub fn parse_query(s: &str, today: NaiveDate) -> Result<Version> {
        let caps = QUERY_RE.captures(s).ok_or_else(|| Error::ParseVersion {
            input: s.to_string(),
            reason: "expected YYYY-MM-DD, YYYY-MM-DD~<stability> or <stability>".to_string(),
        })?;
        let head = caps.get(1).expect("anchored capture").as_str();
        if let Ok(stability) = head.parse::<Stability>() {
            if caps.get(2).is_some() {
                return Err(Error::ParseVersion {
                    input: s.to_string(),
                    reason: "stability token cannot carry a ~suffix".to_string(),
                });
            }
            return Ok(Version::new(today, stability));
        }
        s.parse()
    }

    /// Canonical string form. The `~ga` suffix is elided.
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// The earliest of `candidates` that deprecates this version: a strictly
    /// later date at equal or stronger stability.
    pub fn deprecated_by<'a>(&self, candidates: &'a [Version]) -> Option<&'a Version> {
        candidates
            .iter()
            .filter(|c| c.date > self.date && c.stability >= self.stability)
            .min()
    }

    /// Lifecycle of this version at `now`, given the version that deprecates
    /// it (if any, typically from [`Version::deprecated_by`]).
    pub fn lifecycle_at(&self, deprecated_by: Option<&Version>, now: NaiveDate) -> Lifecycle {
        if self.date > now {
            return Lifecycle::Unreleased;
        }
        match deprecated_by {
            None => Lifecycle::Released,
            Some(dep) => {
                let sunset = match self.stability {
                    // GA versions age out a fixed interval after the release
                    // that supersedes them.
                    Stability::Ga => (now - dep.date).num_days() > GA_SUNSET_DAYS,
                    // Sub-GA versions never sunset by aging; a GA release
                    // supersedes the preview track outright.
                    _ => dep.stability == Stability::Ga,
                };
                if sunset {
                    Lifecycle::Sunset
                } else {
                    Lifecycle::Deprecated
                }
            }
        }
    }

    /// Resolves `query` against `available`: the newest version dated at or
    /// before the query whose stability is at least the queried stability.
    pub fn resolve<'a>(query: &Version, available: &'a [Version]) -> Result<&'a Version> {
        available
            .iter()
            .filter(|v| v.date <= query.date && v.stability >= query.stability)
            .max()
            .ok_or(Error::NoMatchingVersion)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then(self.stability.cmp(&other.stability))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        if self.stability != Stability::Ga {
            write!(f, "~{}", self.stability)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = VERSION_RE.captures(s).ok_or_else(|| Error::ParseVersion {
            input: s.to_string(),
            reason: "expected YYYY-MM-DD or YYYY-MM-DD~<stability>".to_string(),
        })?;
        let date_str = &s[..10];
        let date =
            NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| Error::ParseVersion {
                input: s.to_string(),
                reason: e.to_string(),
            })?;
        let stability = match caps.get(1) {
            Some(m) => m.as_str().parse()?,
            None => Stability::Ga,
        };
        Ok(Version { date, stability })
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Unique `YYYY-MM-DD` strings for `versions`, ascending. The compiler uses
/// these to enumerate output directories across stability ladders.
pub fn version_date_strings(versions: &[Version]) -> Vec<String> {
    let mut dates: Vec<String> = versions
        .iter()
        .map(|v| v.date.format("%Y-%m-%d").to_string())
        .collect();
    dates.sort();
    dates.dedup();
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_canonical_round_trip() {
        for s in ["2021-06-01", "2021-06-13~beta", "2021-01-31~wip"] {
            assert_eq!(v(s).to_string(), s);
        }
        // GA suffix is elided in canonical form
        assert_eq!(v("2021-06-01~ga").to_string(), "2021-06-01");
        // work-in-progress is an alias, not a canonical token
        assert_eq!(v("2021-06-01~work-in-progress").to_string(), "2021-06-01~wip");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for s in [
            "2021-6-1",
            "2021-06-01 ",
            " 2021-06-01",
            "2021-13-01",
            "2021-06-32",
            "2021-02-30",
            "2021-06-01~stable",
            "banana",
        ] {
            assert!(s.parse::<Version>().is_err(), "accepted {s:?}");
        }
    }

    #[test]
    fn test_ordering() {
        assert!(v("2021-06-01") < v("2021-06-02~wip"));
        assert!(v("2021-06-01~beta") < v("2021-06-01"));
        assert!(v("2021-06-01~wip") < v("2021-06-01~experimental"));
        assert_eq!(v("2021-06-01").cmp(&v("2021-06-01~ga")), Ordering::Equal);
    }

    #[test]
    fn test_parse_query_bare_stability() {
        let today = NaiveDate::from_ymd_opt(2021, 7, 1).unwrap();
        let q = Version::parse_query("experimental", today).unwrap();
        assert_eq!(q, v("2021-07-01~experimental"));
        assert_eq!(
            Version::parse_query("2021-06-13~beta", today).unwrap(),
            v("2021-06-13~beta")
        );
        assert!(Version::parse_query("beta~beta", today).is_err());
    }

    #[test]
    fn test_deprecated_by() {
        let versions = [v("2021-06-01"), v("2021-06-07"), v("2021-06-13~beta")];
        assert_eq!(
            versions[0].deprecated_by(&versions),
            Some(&versions[1]),
            "earliest superseding GA wins"
        );
        assert_eq!(versions[1].deprecated_by(&versions), None);
        // beta is deprecated by a later beta-or-stronger only
        assert_eq!(versions[2].deprecated_by(&versions), None);
        let with_later_ga = [v("2021-06-13~beta"), v("2021-07-01")];
        assert_eq!(
            with_later_ga[0].deprecated_by(&with_later_ga),
            Some(&with_later_ga[1])
        );
    }

    #[test]
    fn test_lifecycle() {
        let now = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        let ga = v("2021-06-01");
        assert_eq!(ga.lifecycle_at(None, now), Lifecycle::Released);
        assert_eq!(
            v("2099-01-01").lifecycle_at(None, now),
            Lifecycle::Unreleased
        );
        // Deprecated 2021-06-07, now is ~1 year later: past the GA interval.
        assert_eq!(
            ga.lifecycle_at(Some(&v("2021-06-07")), now),
            Lifecycle::Sunset
        );
        assert_eq!(
            ga.lifecycle_at(Some(&v("2022-05-01")), now),
            Lifecycle::Deprecated
        );
        // A beta deprecated by a beta stays deprecated; by a GA it sunsets.
        let beta = v("2021-06-13~beta");
        assert_eq!(
            beta.lifecycle_at(Some(&v("2021-07-01~beta")), now),
            Lifecycle::Deprecated
        );
        assert_eq!(
            beta.lifecycle_at(Some(&v("2021-07-01")), now),
            Lifecycle::Sunset
        );
    }

    #[test]
    fn test_resolve() {
        let available = [v("2021-06-01"), v("2021-06-07"), v("2021-06-13~beta")];
        let cases = [
            ("2021-07-01", Some("2021-06-07")),
            ("2021-07-01~beta", Some("2021-06-13~beta")),
            ("2021-07-01~experimental", Some("2021-06-13~beta")),
            ("2021-06-08~experimental", Some("2021-06-07")),
            ("2021-05-01", None),
        ];
        for (query, want) in cases {
            let got = Version::resolve(&v(query), &available);
            match want {
                Some(want) => assert_eq!(got.unwrap().to_string(), want, "query {query}"),
                None => assert!(
                    got.unwrap_err().is_no_matching_version(),
                    "query {query} should not resolve"
                ),
            }
        }
    }

    #[test]
    fn test_version_date_strings() {
        let versions = [v("2021-06-13~beta"), v("2021-06-01"), v("2021-06-13")];
        assert_eq!(version_date_strings(&versions), ["2021-06-01", "2021-06-13"]);
    }
}
