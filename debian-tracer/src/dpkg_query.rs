// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Parsing of `dpkg-query -S` output. */

use {
    crate::model::PackageIdentity,
    log::warn,
    once_cell::sync::Lazy,
    regex::Regex,
};

/// Prefix of lines describing `dpkg-divert` diversions.
const DIVERSION_PREFIX: &str = "diversion ";

/// Matches `name[:arch][, other...]: path`.
///
/// The path is separated by `: ` rather than `:` since package names may carry
/// an architecture qualifier.
static DPKG_QUERY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>[^,:\s]+)(:(?P<architecture>[^,:\s]+))?(?P<others>(,\s*[^,:\s]+(:[^,:\s]+)?)*): (?P<path>.*)$",
    )
    .expect("dpkg-query regex should compile")
});

/// A file claimed by a package.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileOwnership {
    pub package: PackageIdentity,
    pub path: String,
    /// Further packages claiming the same path.
    ///
    /// Only [Self::package] is used; these are kept for diagnostics.
    pub other_packages: Vec<PackageIdentity>,
}

impl FileOwnership {
    /// Whether more than one package claimed the path.
    pub fn is_ambiguous(&self) -> bool {
        !self.other_packages.is_empty()
    }
}

/// Parse a single line of `dpkg-query -S` output.
///
/// Diversion records and lines that don't look like ownership records yield [None].
/// When a path is claimed by several packages, the first listed package wins.
pub fn parse_dpkg_query_line(line: &str) -> Option<FileOwnership> {
    if line.starts_with(DIVERSION_PREFIX) {
        return None;
    }

    let caps = DPKG_QUERY_LINE.captures(line)?;

    let package = PackageIdentity::new(
        caps["name"].trim(),
        caps.name("architecture").map(|m| m.as_str().trim()),
    );

    let other_packages = caps
        .name("others")
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(PackageIdentity::parse)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let ownership = FileOwnership {
        package,
        path: caps["path"].to_string(),
        other_packages,
    };

    if ownership.is_ambiguous() {
        warn!(
            "dpkg-query line has multiple packages; using {}: {}",
            ownership.package, line
        );
    }

    Some(ownership)
}

/// Parse all lines of `dpkg-query -S` output.
pub fn parse_dpkg_query_output(output: &str) -> Vec<FileOwnership> {
    output.lines().filter_map(parse_dpkg_query_line).collect()
}
