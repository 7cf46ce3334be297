// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Parsing of `dpkg -s` and `apt-cache show` output.

Both tools emit binary package control paragraphs. `dpkg -s` adds a `Status`
field and omits archive fields like `Size` and checksums, which `apt-cache show`
provides.
*/

use {
    crate::{
        control::{ControlFile, ControlParagraph},
        model::PackageIdentity,
    },
    std::{collections::BTreeMap, ops::Deref},
};

/// A package record as printed by `dpkg -s` or `apt-cache show`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageDetail {
    paragraph: ControlParagraph,
}

impl Deref for PackageDetail {
    type Target = ControlParagraph;

    fn deref(&self) -> &Self::Target {
        &self.paragraph
    }
}

impl From<ControlParagraph> for PackageDetail {
    fn from(paragraph: ControlParagraph) -> Self {
        Self { paragraph }
    }
}

impl PackageDetail {
    /// The `Package` field.
    pub fn package(&self) -> Option<&str> {
        self.field_str("Package")
    }

    /// The `Version` field.
    pub fn version(&self) -> Option<&str> {
        self.field_str("Version")
    }

    /// The `Architecture` field.
    pub fn architecture(&self) -> Option<&str> {
        self.field_str("Architecture")
    }

    /// The identity of this package record.
    pub fn identity(&self) -> Option<PackageIdentity> {
        self.package()
            .map(|name| PackageIdentity::new(name, self.architecture()))
    }

    /// The source package name and optional version from the `Source` field.
    ///
    /// The field has the form `name` or `name (version)`.
    pub fn source(&self) -> Option<(&str, Option<&str>)> {
        let value = self.field_str("Source")?.trim();

        Some(match value.split_once(' ') {
            Some((name, rest)) => {
                let version = rest
                    .trim()
                    .strip_prefix('(')
                    .and_then(|v| v.strip_suffix(')'))
                    .map(|v| v.trim());
                (name, version)
            }
            None => (value, None),
        })
    }

    /// The source package name, defaulting to the binary package name.
    pub fn source_name(&self) -> Option<&str> {
        self.source().map(|(name, _)| name).or_else(|| self.package())
    }

    /// The source package version, defaulting to the binary package version.
    pub fn source_version(&self) -> Option<&str> {
        match self.source() {
            Some((_, Some(version))) => Some(version),
            _ => self.version(),
        }
    }

    /// The `Installed-Size` field in KiB.
    pub fn installed_size(&self) -> Option<u64> {
        self.field_u64("Installed-Size")
    }

    /// The `Size` field in bytes.
    pub fn size(&self) -> Option<u64> {
        self.field_u64("Size")
    }

    pub fn md5(&self) -> Option<&str> {
        self.field_str("MD5sum")
    }

    pub fn sha1(&self) -> Option<&str> {
        self.field_str("SHA1")
    }

    pub fn sha256(&self) -> Option<&str> {
        self.field_str("SHA256")
    }

    /// The `Status` field, only present in `dpkg -s` output.
    pub fn status(&self) -> Option<&str> {
        self.field_str("Status")
    }
}

/// Parse package records from `dpkg -s` or `apt-cache show` output.
///
/// Paragraphs without a `Package` field are ignored. If a package identity occurs
/// more than once, the first occurrence is kept.
pub fn parse_package_details(output: &str) -> BTreeMap<PackageIdentity, PackageDetail> {
    let mut res = BTreeMap::new();

    for detail in ControlFile::parse_str(output)
        .into_paragraphs()
        .map(PackageDetail::from)
    {
        if let Some(identity) = detail.identity() {
            res.entry(identity).or_insert(detail);
        }
    }

    res
}

/// Find the record satisfying a query for `identity`.
pub fn find_package_detail(
    details: BTreeMap<PackageIdentity, PackageDetail>,
    identity: &PackageIdentity,
) -> Option<PackageDetail> {
    details
        .into_iter()
        .find(|(candidate, _)| identity.matches(candidate))
        .map(|(_, detail)| detail)
}
