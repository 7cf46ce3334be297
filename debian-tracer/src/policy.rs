// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Parsing of `apt-cache policy` output.

`apt-cache policy <package>` prints a version table per package:

```text
libc6-dev:
  Installed: 2.19-18+deb8u4
  Candidate: 2.19-18+deb8u4
  Version table:
 *** 2.19-18+deb8u4 0
        500 http://httpredir.debian.org/debian jessie/main amd64 Packages
        100 /var/lib/dpkg/status
```

`apt-cache policy` without arguments describes every known package file:

```text
Package files:
 100 /var/lib/dpkg/status
     release a=now
 500 http://httpredir.debian.org/debian jessie/main amd64 Packages
     release v=8.11,o=Debian,a=oldstable,n=jessie,l=Debian,c=main,b=amd64
     origin httpredir.debian.org
Pinned packages:
```

The text following the priority of a package file line (the *source line*) is
what ties version table entries to package files.
*/

use {
    crate::model::{OriginIdentity, PackageIdentity},
    once_cell::sync::Lazy,
    regex::Regex,
    std::collections::BTreeMap,
};

static PACKAGE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<package>\S+):\s*$").expect("regex should compile"));

static INSTALLED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+Installed:\s*(?P<value>.*?)\s*$").expect("regex should compile"));

static CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+Candidate:\s*(?P<value>.*?)\s*$").expect("regex should compile"));

static VERSION_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+Version table:\s*$").expect("regex should compile"));

static VERSION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(?P<installed>\*\*\*)?\s*(?P<version>\S+)\s+(?P<priority>-?\d+)\s*$")
        .expect("regex should compile")
});

static SOURCE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<priority>-?\d+)\s+(?P<source>.*?)\s*$").expect("regex should compile")
});

static RELEASE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+release\s+(?P<fields>.*?)\s*$").expect("regex should compile"));

static ORIGIN_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+origin\s+(?P<site>.*?)\s*$").expect("regex should compile"));

const PACKAGE_FILES_HEADER: &str = "Package files:";
const PINNED_PACKAGES_HEADER: &str = "Pinned packages:";

fn none_if_unset(value: &str) -> Option<String> {
    if value.is_empty() || value == "(none)" {
        None
    } else {
        Some(value.to_string())
    }
}

/// A reference from a version to a package file offering it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PolicySourceRef {
    pub priority: i32,
    /// The source line, e.g. `http://deb.debian.org/debian bullseye/main amd64 Packages`.
    pub source: String,
}

/// An entry in a package's version table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PolicyVersion {
    pub version: String,
    /// Whether this is the installed version (marked `***`).
    pub installed: bool,
    pub priority: i32,
    pub sources: Vec<PolicySourceRef>,
}

/// The policy of a single package.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PackagePolicy {
    pub installed: Option<String>,
    pub candidate: Option<String>,
    pub versions: Vec<PolicyVersion>,
}

/// Parse the output of `apt-cache policy <package>...`.
pub fn parse_package_policies(output: &str) -> BTreeMap<PackageIdentity, PackagePolicy> {
    let mut res = BTreeMap::new();
    let mut current: Option<(PackageIdentity, PackagePolicy)> = None;
    let mut in_version_table = false;

    for line in output.lines() {
        if let Some(caps) = PACKAGE_HEADER.captures(line) {
            if let Some((identity, policy)) = current.take() {
                res.entry(identity).or_insert(policy);
            }
            current = Some((
                PackageIdentity::parse(&caps["package"]),
                PackagePolicy::default(),
            ));
            in_version_table = false;
            continue;
        }

        let policy = match &mut current {
            Some((_, policy)) => policy,
            None => continue,
        };

        if let Some(caps) = INSTALLED.captures(line) {
            policy.installed = none_if_unset(&caps["value"]);
        } else if let Some(caps) = CANDIDATE.captures(line) {
            policy.candidate = none_if_unset(&caps["value"]);
        } else if VERSION_TABLE.is_match(line) {
            in_version_table = true;
        } else if !in_version_table {
            continue;
        } else if let Some(caps) = VERSION_LINE.captures(line) {
            policy.versions.push(PolicyVersion {
                version: caps["version"].to_string(),
                installed: caps.name("installed").is_some(),
                priority: caps["priority"].parse().unwrap_or_default(),
                sources: vec![],
            });
        } else if let Some(caps) = SOURCE_LINE.captures(line) {
            if let Some(version) = policy.versions.last_mut() {
                version.sources.push(PolicySourceRef {
                    priority: caps["priority"].parse().unwrap_or_default(),
                    source: caps["source"].to_string(),
                });
            }
        }
    }

    if let Some((identity, policy)) = current.take() {
        res.entry(identity).or_insert(policy);
    }

    res
}

/// Find the policy satisfying a query for `identity`.
pub fn find_package_policy(
    policies: BTreeMap<PackageIdentity, PackagePolicy>,
    identity: &PackageIdentity,
) -> Option<PackagePolicy> {
    policies
        .into_iter()
        .find(|(candidate, _)| identity.matches(candidate))
        .map(|(_, policy)| policy)
}

/// A package file known to apt.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PolicySource {
    pub priority: i32,
    pub identity: OriginIdentity,
    /// Distribution path relative to the archive URI, e.g. `jessie/updates/main`.
    pub suite_path: Option<String>,
}

impl PolicySource {
    fn from_source_line(priority: i32, source: &str) -> Self {
        let mut res = Self {
            priority,
            ..Default::default()
        };

        let words = source.split_whitespace().collect::<Vec<_>>();

        if words.len() >= 3 && words.last() == Some(&"Packages") {
            res.identity.archive_uri = Some(words[0].to_string());
            res.suite_path = Some(words[1].to_string());
            if words.len() >= 4 {
                res.identity.architecture = Some(words[2].to_string());
            }
        }

        res
    }

    fn apply_release_fields(&mut self, fields: &str) {
        for (key, value) in fields.split(',').filter_map(|kv| kv.split_once('=')) {
            let value = Some(value.trim().to_string());

            match key.trim() {
                "o" => self.identity.origin = value,
                "a" => self.identity.archive = value,
                "n" => self.identity.codename = value,
                "l" => self.identity.label = value,
                "c" => self.identity.component = value,
                "b" => self.identity.architecture = value,
                _ => {}
            }
        }
    }
}

/// Parse the output of `apt-cache policy` (no arguments) into source line to package file.
pub fn parse_policy_sources(output: &str) -> BTreeMap<String, PolicySource> {
    let mut res: BTreeMap<String, PolicySource> = BTreeMap::new();
    let mut current: Option<String> = None;
    let mut in_package_files = false;

    for line in output.lines() {
        let trimmed = line.trim();

        if trimmed == PACKAGE_FILES_HEADER {
            in_package_files = true;
            continue;
        } else if trimmed == PINNED_PACKAGES_HEADER {
            in_package_files = false;
            current = None;
            continue;
        } else if !in_package_files {
            continue;
        }

        if let Some(caps) = RELEASE_LINE.captures(line) {
            if let Some(source) = current.as_ref().and_then(|s| res.get_mut(s)) {
                source.apply_release_fields(&caps["fields"]);
            }
        } else if let Some(caps) = ORIGIN_LINE.captures(line) {
            if let Some(source) = current.as_ref().and_then(|s| res.get_mut(s)) {
                source.identity.site = Some(caps["site"].to_string());
            }
        } else if let Some(caps) = SOURCE_LINE.captures(line) {
            let source_line = caps["source"].to_string();
            let priority = caps["priority"].parse().unwrap_or_default();

            res.entry(source_line.clone())
                .or_insert_with(|| PolicySource::from_source_line(priority, &source_line));
            current = Some(source_line);
        }
    }

    res
}
