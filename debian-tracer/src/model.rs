// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Records describing a traced Debian system. */

use {
    chrono::{DateTime, Utc},
    log::warn,
    serde::{Deserialize, Serialize},
    std::{
        collections::{BTreeMap, BTreeSet},
        fmt::{Display, Formatter},
    },
};

/// Identifies a binary package, optionally qualified by architecture.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

impl PackageIdentity {
    pub fn new(name: impl ToString, architecture: Option<impl ToString>) -> Self {
        Self {
            name: name.to_string(),
            architecture: architecture.map(|a| a.to_string()),
        }
    }

    /// Parse a `name[:arch]` string.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((name, arch)) if !arch.is_empty() => Self::new(name, Some(arch)),
            Some((name, _)) => Self::new(name, None::<&str>),
            None => Self::new(s, None::<&str>),
        }
    }

    /// Whether a record for `other` satisfies a query for this identity.
    ///
    /// An identity without architecture matches any architecture of the same name.
    pub fn matches(&self, other: &PackageIdentity) -> bool {
        self.name == other.name
            && match (&self.architecture, &other.architecture) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

impl Display for PackageIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.architecture {
            Some(arch) => write!(f, "{}:{}", self.name, arch),
            None => f.write_str(&self.name),
        }
    }
}

/// The identity of an apt origin.
///
/// Two origins with equal fields are the same logical origin.
#[derive(
    Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct OriginIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_uri: Option<String>,
}

/// A named apt origin.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AptSource {
    pub name: String,
    #[serde(flatten)]
    pub identity: OriginIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// An installed Debian package.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DebPackage {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_date: Option<DateTime<Utc>>,
    /// Version string to names of [AptSource] offering it.
    #[serde(default)]
    pub versions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl DebPackage {
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity {
            name: self.name.clone(),
            architecture: self.architecture.clone(),
        }
    }

    /// Names of all origins referenced by the version table.
    pub fn referenced_sources(&self) -> impl Iterator<Item = &str> {
        self.versions.values().flatten().map(|s| s.as_str())
    }
}

/// A traced Debian(-derived) distribution.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DebianDistribution {
    pub name: String,
    /// Content of `/etc/debian_version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub apt_sources: Vec<AptSource>,
    #[serde(default)]
    pub packages: Vec<DebPackage>,
}

impl DebianDistribution {
    /// Find a package by name.
    pub fn package(&self, name: &str) -> Option<&DebPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Find an origin by name.
    pub fn apt_source(&self, name: &str) -> Option<&AptSource> {
        self.apt_sources.iter().find(|s| s.name == name)
    }

    /// Bring the distribution into a consistent state.
    ///
    /// Afterwards every origin name referenced by a package version table is present in
    /// [Self::apt_sources] exactly once and no unreferenced origin remains.
    pub fn normalize(&mut self) {
        self.packages.sort_by_key(|p| p.identity());

        let mut seen = BTreeSet::new();
        self.apt_sources.retain(|s| seen.insert(s.name.clone()));

        for package in self.packages.iter_mut() {
            for (version, sources) in package.versions.iter_mut() {
                sources.retain(|name| {
                    let known = seen.contains(name);
                    if !known {
                        warn!(
                            "dropping unknown apt source {} from {} version {}",
                            name, package.name, version
                        );
                    }
                    known
                });
            }
        }

        let referenced = self
            .packages
            .iter()
            .flat_map(|p| p.referenced_sources())
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>();

        self.apt_sources.retain(|s| referenced.contains(&s.name));
        self.apt_sources.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(name: &str, versions: Vec<(&str, Vec<&str>)>) -> DebPackage {
        DebPackage {
            name: name.to_string(),
            version: versions[0].0.to_string(),
            architecture: Some("amd64".to_string()),
            source_name: None,
            source_version: None,
            installed_size: None,
            size: None,
            md5: None,
            sha1: None,
            sha256: None,
            install_date: None,
            versions: versions
                .into_iter()
                .map(|(v, s)| (v.to_string(), s.into_iter().map(|x| x.to_string()).collect()))
                .collect(),
            files: vec![],
        }
    }

    fn source(name: &str) -> AptSource {
        AptSource {
            name: name.to_string(),
            identity: OriginIdentity::default(),
            date: None,
        }
    }

    #[test]
    fn package_identity_parse_display() {
        let id = PackageIdentity::parse("zlib1g:amd64");
        assert_eq!(id.name, "zlib1g");
        assert_eq!(id.architecture.as_deref(), Some("amd64"));
        assert_eq!(id.to_string(), "zlib1g:amd64");

        let id = PackageIdentity::parse("bash");
        assert_eq!(id.architecture, None);
        assert_eq!(id.to_string(), "bash");

        assert!(id.matches(&PackageIdentity::parse("bash:amd64")));
        assert!(!PackageIdentity::parse("bash:i386").matches(&PackageIdentity::parse("bash:amd64")));
    }

    #[test]
    fn normalize_enforces_source_invariant() {
        let mut dist = DebianDistribution {
            name: "debian".to_string(),
            version: None,
            apt_sources: vec![
                source("apt_Debian_stable_main_0"),
                source("apt_Debian_stable_main_0"),
                source("apt_Debian_stable_contrib_0"),
                source("apt__now__0"),
            ],
            packages: vec![
                package(
                    "zsh",
                    vec![("5.8-6", vec!["apt_Debian_stable_main_0", "apt_gone_0"])],
                ),
                package(
                    "bash",
                    vec![("5.1-2", vec!["apt__now__0", "apt_Debian_stable_main_0"])],
                ),
            ],
        };

        dist.normalize();

        assert_eq!(
            dist.packages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["bash", "zsh"]
        );
        assert_eq!(
            dist.apt_sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["apt_Debian_stable_main_0", "apt__now__0"]
        );
        assert_eq!(
            dist.package("zsh").unwrap().versions["5.8-6"],
            vec!["apt_Debian_stable_main_0".to_string()]
        );
        assert!(dist.apt_source("apt_Debian_stable_contrib_0").is_none());
    }
}
