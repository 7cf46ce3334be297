// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Resolution of package names to fully attributed package records. */

use {
    crate::{
        config::TracerConfig,
        error::Result,
        model::{DebPackage, PackageIdentity},
        package_detail::{find_package_detail, parse_package_details, PackageDetail},
        policy::{find_package_policy, parse_package_policies},
        session::Session,
        sources::SourceRegistry,
    },
    chrono::{DateTime, TimeZone, Utc},
    log::{debug, warn},
    std::collections::BTreeMap,
};

/// Resolves packages by querying dpkg and apt through a [Session].
pub struct PackageResolver<'a, S: Session + ?Sized> {
    session: &'a S,
    config: &'a TracerConfig,
}

impl<'a, S: Session + ?Sized> PackageResolver<'a, S> {
    pub fn new(session: &'a S, config: &'a TracerConfig) -> Self {
        Self { session, config }
    }

    /// Run a per-package query.
    ///
    /// A failing command yields [None] so the package can be skipped. Other errors
    /// are propagated.
    fn query(&self, args: &[&str]) -> Result<Option<String>> {
        match self.session.execute_command(args) {
            Ok(output) => Ok(Some(output.stdout)),
            Err(e) if e.is_command_failure() => {
                warn!(
                    "{} failed: {}",
                    args.join(" "),
                    e.stderr().unwrap_or_default().trim()
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn detail(&self, args: &[&str], identity: &PackageIdentity) -> Result<Option<PackageDetail>> {
        let output = match self.query(args)? {
            Some(output) => output,
            None => return Ok(None),
        };

        let detail = find_package_detail(parse_package_details(&output), identity);
        if detail.is_none() {
            warn!("unable to parse output of {}", args.join(" "));
        }

        Ok(detail)
    }

    /// Obtain the `dpkg -s` record of an installed package.
    pub fn installed_detail(&self, identity: &PackageIdentity) -> Result<Option<PackageDetail>> {
        let query = identity.to_string();
        self.detail(&["dpkg", "-s", &query], identity)
    }

    /// Obtain the `apt-cache show` record of a specific package version.
    pub fn candidate_detail(
        &self,
        identity: &PackageIdentity,
        version: &str,
    ) -> Result<Option<PackageDetail>> {
        let query = format!("{}={}", identity, version);
        self.detail(&["apt-cache", "show", &query], identity)
    }

    /// Derive the install time of a package from the mtime of its install record.
    ///
    /// Returns [None] if no install record exists.
    pub fn install_date(&self, identity: &PackageIdentity) -> Result<Option<DateTime<Utc>>> {
        let mut records = vec![self.config.install_record_path(&identity.name)];
        if identity.architecture.is_some() {
            records.push(self.config.install_record_path(&identity.to_string()));
        }

        for record in records {
            let output = match self.session.execute_command(&["stat", "-c", "%Y", &record]) {
                Ok(output) => output.stdout,
                Err(e) if e.is_command_failure() => {
                    debug!("no install record at {}", record);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match output.trim().parse::<i64>() {
                Ok(seconds) => return Ok(Utc.timestamp_opt(seconds, 0).single()),
                Err(e) => {
                    warn!("unable to parse mtime of {} ({:?}): {}", record, output, e);
                }
            }
        }

        Ok(None)
    }

    /// Build the version table of a package, naming origins through `registry`.
    pub fn version_table(
        &self,
        registry: &mut SourceRegistry,
        identity: &PackageIdentity,
    ) -> Result<Option<BTreeMap<String, Vec<String>>>> {
        let query = identity.to_string();
        let output = match self.query(&["apt-cache", "policy", &query])? {
            Some(output) => output,
            None => return Ok(None),
        };

        let policy = match find_package_policy(parse_package_policies(&output), identity) {
            Some(policy) => policy,
            None => {
                warn!("unable to parse apt-cache policy output for {}", query);
                return Ok(None);
            }
        };

        let mut versions = BTreeMap::new();

        for version in policy.versions {
            let names: &mut Vec<String> = versions.entry(version.version).or_default();

            for source in version.sources {
                if let Some(name) = registry.name_for_line(self.session, self.config, &source.source)? {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }

        Ok(Some(versions))
    }

    /// Resolve a package to a fully populated record.
    ///
    /// Returns [None] if any required query fails or can't be parsed.
    pub fn resolve(
        &self,
        registry: &mut SourceRegistry,
        identity: &PackageIdentity,
    ) -> Result<Option<DebPackage>> {
        let installed = match self.installed_detail(identity)? {
            Some(detail) => detail,
            None => return Ok(None),
        };

        let version = match installed.version() {
            Some(version) => version.to_string(),
            None => {
                warn!("dpkg -s {} reported no version", identity);
                return Ok(None);
            }
        };

        let identity = PackageIdentity::new(
            &identity.name,
            installed
                .architecture()
                .or(identity.architecture.as_deref()),
        );

        let candidate = match self.candidate_detail(&identity, &version)? {
            Some(detail) => detail,
            None => return Ok(None),
        };

        let install_date = self.install_date(&identity)?;

        let versions = match self.version_table(registry, &identity)? {
            Some(versions) => versions,
            None => return Ok(None),
        };

        Ok(Some(DebPackage {
            name: identity.name.clone(),
            version,
            architecture: identity.architecture.clone(),
            source_name: candidate.source_name().map(|s| s.to_string()),
            source_version: candidate.source_version().map(|s| s.to_string()),
            installed_size: candidate.installed_size().or_else(|| installed.installed_size()),
            size: candidate.size(),
            md5: candidate.md5().map(|s| s.to_string()),
            sha1: candidate.sha1().map(|s| s.to_string()),
            sha256: candidate.sha256().map(|s| s.to_string()),
            install_date,
            versions,
            files: vec![],
        }))
    }
}
