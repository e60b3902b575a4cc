// src/version/mod.rs

//! RPM version identity and ordering
//!
//! Packages are identified by their NEVRA (`name-[epoch:]version-release.arch`).
//! Ordering follows the rpmvercmp segment rules: alternating runs of digits
//! and letters are compared pairwise, numeric runs beat alphabetic runs, and
//! a tilde sorts before everything (including the end of the string).

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// An epoch:version-release triple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RpmVersion {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl RpmVersion {
    /// Parse an EVR string
    ///
    /// Format: [epoch:]version[-release]
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "1:2.3.4-5.el8" → epoch=1, version="2.3.4", release=Some("5.el8")
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch, rest) = match s.split_once(':') {
            Some(("", rest)) => (0, rest),
            Some((e, rest)) => {
                let epoch = e.parse::<u64>().map_err(|err| {
                    Error::ParseError(format!("Invalid epoch in version '{}': {}", s, err))
                })?;
                (epoch, rest)
            }
            None => (0, s),
        };

        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v.to_string(), Some(r.to_string())),
            None => (rest.to_string(), None),
        };

        if version.is_empty() {
            return Err(Error::ParseError(format!(
                "Empty version component in '{}'",
                s
            )));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Compare two EVRs
    ///
    /// A missing release on either side compares equal on that component,
    /// matching how rpm treats `name >= 1.0` against `1.0-3`.
    pub fn compare(&self, other: &RpmVersion) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (Some(a), Some(b)) => rpmvercmp(a, b),
                _ => Ordering::Equal,
            })
    }
}

impl fmt::Display for RpmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

/// Total order consistent with `Eq`
///
/// Unlike [`RpmVersion::compare`], a missing release sorts before any
/// release, and versions rpmvercmp considers equal (`1.0` and `1.00`) fall
/// back to comparing their text. Use `compare` for dependency matching.
impl Ord for RpmVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (Some(a), Some(b)) => rpmvercmp(a, b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            })
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.release.cmp(&other.release))
    }
}

impl PartialOrd for RpmVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Full package identity: name, EVR and architecture
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nevra {
    pub name: String,
    pub evr: RpmVersion,
    pub arch: String,
}

impl Nevra {
    /// Parse `name-[epoch:]version-release.arch`
    ///
    /// The name may itself contain dashes (`python3-libs-3.9.1-1.el8.x86_64`),
    /// so version and release are taken from the right.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::ParseError(format!("Invalid NEVRA: '{}'", s));

        let (rest, arch) = s.rsplit_once('.').ok_or_else(invalid)?;
        let (rest, release) = rest.rsplit_once('-').ok_or_else(invalid)?;
        let (name, version) = rest.rsplit_once('-').ok_or_else(invalid)?;

        if name.is_empty() || arch.is_empty() || release.is_empty() {
            return Err(invalid());
        }

        let evr = RpmVersion::parse(&format!("{}-{}", version, release))?;

        Ok(Self {
            name: name.to_string(),
            evr,
            arch: arch.to_string(),
        })
    }

    /// The NVRA form (epoch omitted), the key packages are searched by
    pub fn nvra(&self) -> String {
        match &self.evr.release {
            Some(release) => format!(
                "{}-{}-{}.{}",
                self.name, self.evr.version, release, self.arch
            ),
            None => format!("{}-{}.{}", self.name, self.evr.version, self.arch),
        }
    }

    /// True if `other` is the same package stream (name and arch)
    pub fn same_stream(&self, other: &Nevra) -> bool {
        self.name == other.name && self.arch == other.arch
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.name, self.evr, self.arch)
    }
}

/// Compare two version or release strings segment by segment
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut a = a.as_bytes();
    let mut b = b.as_bytes();

    loop {
        a = skip_separators(a);
        b = skip_separators(b);

        match (a.first() == Some(&b'~'), b.first() == Some(&b'~')) {
            (true, true) => {
                a = &a[1..];
                b = &b[1..];
                continue;
            }
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        if a.is_empty() || b.is_empty() {
            break;
        }

        let numeric = a[0].is_ascii_digit();
        let (seg_a, rest_a) = split_segment(a, numeric);
        let (seg_b, rest_b) = split_segment(b, numeric);

        // Segment types differ: numeric is newer
        if seg_b.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            let seg_a = trim_leading_zeros(seg_a);
            let seg_b = trim_leading_zeros(seg_b);
            seg_a.len().cmp(&seg_b.len()).then_with(|| seg_a.cmp(seg_b))
        } else {
            seg_a.cmp(seg_b)
        };

        if ord != Ordering::Equal {
            return ord;
        }

        a = rest_a;
        b = rest_b;
    }

    a.len().min(1).cmp(&b.len().min(1))
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|c| c.is_ascii_alphanumeric() || *c == b'~')
        .unwrap_or(s.len());
    &s[start..]
}

fn split_segment(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = s
        .iter()
        .position(|c| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

fn trim_leading_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|c| *c != b'0').unwrap_or(s.len());
    &s[start..]
}
