// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Release dates of apt origins, read from apt's lists cache. */

use {
    crate::{control::ControlFile, policy::PolicySource, session::Session},
    chrono::{DateTime, Utc},
    log::debug,
};

/// Convert an archive URI to the file name prefix apt uses in its lists directory.
///
/// e.g. `http://deb.debian.org/debian/` becomes `deb.debian.org_debian`.
fn uri_to_file_prefix(uri: &str) -> String {
    let without_scheme = match uri.split_once("://") {
        Some((_, rest)) => rest,
        None => uri,
    };

    without_scheme.trim_matches('/').replace('/', "_")
}

/// Compute candidate paths of the `InRelease` and `Release` files of a package file.
pub fn release_file_candidates(lists_dir: &str, source: &PolicySource) -> Vec<String> {
    let (uri, suite) = match (
        source.identity.archive_uri.as_deref(),
        source.suite_path.as_deref(),
    ) {
        (Some(uri), Some(suite)) => (uri, suite),
        _ => return vec![],
    };

    let lists_dir = lists_dir.trim_end_matches('/');
    let uri_prefix = uri_to_file_prefix(uri);

    // Flat repositories have no dists/ hierarchy.
    let prefix = if suite.ends_with('/') {
        let dist = suite.trim_end_matches('/');
        if dist.is_empty() {
            format!("{}/{}", lists_dir, uri_prefix)
        } else {
            format!("{}/{}_{}", lists_dir, uri_prefix, dist.replace('/', "_"))
        }
    } else {
        let dist = match source.identity.component.as_deref() {
            Some(component) => suite
                .strip_suffix(component)
                .map(|s| s.trim_end_matches('/'))
                .filter(|s| !s.is_empty())
                .unwrap_or(suite),
            None => suite,
        };

        format!(
            "{}/{}_dists_{}",
            lists_dir,
            uri_prefix,
            dist.replace('/', "_")
        )
    };

    vec![format!("{}_InRelease", prefix), format!("{}_Release", prefix)]
}

/// Parse the `Date` field of an `[In]Release` file.
pub fn parse_release_date(content: &str) -> Option<DateTime<Utc>> {
    let cf = ControlFile::parse_str(content);
    let value = cf.paragraphs().find_map(|p| p.field_str("Date"))?.trim();

    // RFC 2822 doesn't know the `UTC` zone name apt writes.
    let normalized = match value.strip_suffix(" UTC") {
        Some(prefix) => format!("{} +0000", prefix),
        None => value.to_string(),
    };

    DateTime::parse_from_rfc2822(&normalized)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| debug!("unable to parse release date {}: {}", value, e))
        .ok()
}

/// Attempt to find the release date of a package file.
pub fn find_release_date<S: Session + ?Sized>(
    session: &S,
    lists_dir: &str,
    source: &PolicySource,
) -> Option<DateTime<Utc>> {
    for path in release_file_candidates(lists_dir, source) {
        match session.read(&path) {
            Ok(content) => {
                if let Some(date) = parse_release_date(&content) {
                    return Some(date);
                }
            }
            Err(e) => {
                debug!("unable to read release file {}: {}", path, e);
            }
        }
    }

    None
}
