// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Tracing files to the Debian packages owning them. */

use {
    crate::{
        batch::{batch_paths, DPKG_QUERY_OVERHEAD},
        config::TracerConfig,
        dpkg_query::{parse_dpkg_query_output, FileOwnership},
        error::{Result, TracerError},
        model::{DebPackage, DebianDistribution, PackageIdentity},
        resolver::PackageResolver,
        session::Session,
        sources::SourceRegistry,
    },
    log::{debug, info},
    std::collections::{HashMap, HashSet},
};

/// `dpkg-query -S` stderr emitted for paths no package owns.
const NO_PATH_FOUND: &str = "no path found matching pattern";

const DEBIAN_VERSION_PATH: &str = "/etc/debian_version";
const OS_RELEASE_PATH: &str = "/etc/os-release";

/// The outcome of tracing files on a Debian system.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DistributionTrace {
    pub distribution: DebianDistribution,
    /// Input files no resolved package claims, in input order.
    pub unresolved_files: Vec<String>,
}

/// Traces files on dpkg/apt based systems back to packages and apt origins.
///
/// All queries are issued sequentially through a single [Session].
pub struct DebTracer<'a, S: Session + ?Sized> {
    session: &'a S,
    config: TracerConfig,
}

impl<'a, S: Session + ?Sized> DebTracer<'a, S> {
    /// Construct an instance using the default [TracerConfig].
    pub fn new(session: &'a S) -> Self {
        Self::with_config(session, TracerConfig::default())
    }

    pub fn with_config(session: &'a S, config: TracerConfig) -> Self {
        Self { session, config }
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    fn detect_inner(&self) -> Result<String> {
        let version = self.session.read(DEBIAN_VERSION_PATH)?.trim().to_string();

        if !self.session.exists(OS_RELEASE_PATH) {
            return Err(TracerError::FileNotFound(OS_RELEASE_PATH.to_string()));
        }

        // Also matches derivatives declaring ID_LIKE=debian.
        self.session
            .execute_command(&["grep", "-i", "^ID.*=debian", OS_RELEASE_PATH])?;
        self.session.execute_command(&["ls", "-ld", "/etc/apt"])?;

        Ok(version)
    }

    /// Determine whether the session is a Debian(-derived) system.
    ///
    /// Returns the content of `/etc/debian_version` if so.
    pub fn detect(&self) -> Option<String> {
        match self.detect_inner() {
            Ok(version) => Some(version),
            Err(e) => {
                debug!("did not detect Debian (or derivative): {}", e);
                None
            }
        }
    }

    fn run_dpkg_query(&self, paths: &[String]) -> Result<String> {
        let mut args = vec!["dpkg-query", "-S"];
        args.extend(paths.iter().map(|p| p.as_str()));

        match self.session.execute_command(&args) {
            Ok(output) => Ok(output.stdout),
            Err(TracerError::CommandFailed { stdout, stderr, .. })
                if stderr.contains(NO_PATH_FOUND) =>
            {
                Ok(stdout)
            }
            Err(e) => Err(e),
        }
    }

    /// Find the packages owning `files`.
    ///
    /// Files no package owns are absent from the result.
    pub fn files_to_packages(&self, files: &[String]) -> Result<Vec<FileOwnership>> {
        let mut res = vec![];

        for batch in batch_paths(files, self.config.max_command_length, DPKG_QUERY_OVERHEAD) {
            let output = self.run_dpkg_query(batch)?;

            for ownership in parse_dpkg_query_output(&output) {
                debug!(
                    "identified file {} to belong to package {}",
                    ownership.path, ownership.package
                );
                res.push(ownership);
            }
        }

        Ok(res)
    }

    /// Resolve the packages owning `files`.
    ///
    /// Returns the resolved packages and the files not claimed by any of them.
    pub fn identify_packages_from_files(
        &self,
        registry: &mut SourceRegistry,
        files: &[String],
    ) -> Result<(Vec<DebPackage>, Vec<String>)> {
        let mut identities: Vec<(PackageIdentity, Vec<String>)> = vec![];
        let mut index: HashMap<PackageIdentity, usize> = HashMap::new();

        for ownership in self.files_to_packages(files)? {
            let i = *index.entry(ownership.package.clone()).or_insert_with(|| {
                identities.push((ownership.package.clone(), vec![]));
                identities.len() - 1
            });
            identities[i].1.push(ownership.path);
        }

        let resolver = PackageResolver::new(self.session, &self.config);
        let mut packages = vec![];
        let mut claimed = HashSet::new();

        for (identity, paths) in identities {
            match resolver.resolve(registry, &identity)? {
                Some(mut package) => {
                    info!("resolved package {} {}", identity, package.version);
                    claimed.extend(paths.iter().cloned());
                    package.files = paths;
                    packages.push(package);
                }
                None => {
                    debug!("leaving {} files of {} unresolved", paths.len(), identity);
                }
            }
        }

        let unresolved = files
            .iter()
            .filter(|f| !claimed.contains(*f))
            .cloned()
            .collect();

        Ok((packages, unresolved))
    }

    /// Trace `files` to a Debian distribution.
    ///
    /// Returns [None] if this isn't a Debian system or no package claims any file.
    pub fn identify_distributions(&self, files: &[String]) -> Result<Option<DistributionTrace>> {
        if files.is_empty() {
            return Ok(None);
        }

        let version = match self.detect() {
            Some(version) => version,
            None => return Ok(None),
        };

        let mut registry = SourceRegistry::default();
        let (packages, unresolved_files) = self.identify_packages_from_files(&mut registry, files)?;

        if packages.is_empty() {
            return Ok(None);
        }

        let mut distribution = DebianDistribution {
            name: "debian".to_string(),
            version: Some(version),
            apt_sources: registry.into_sources(),
            packages,
        };
        distribution.normalize();

        Ok(Some(DistributionTrace {
            distribution,
            unresolved_files,
        }))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testutil::FakeSession,
        chrono::{TimeZone, Utc},
        indoc::indoc,
    };

    const LIBC6_DEV_STATUS: &str = indoc! {"
        Package: libc6-dev
        Status: install ok installed
        Priority: optional
        Section: libdevel
        Installed-Size: 10491
        Maintainer: GNU Libc Maintainers <debian-glibc@lists.debian.org>
        Architecture: amd64
        Multi-Arch: same
        Source: glibc
        Version: 2.19-18+deb8u4
        Depends: libc6 (= 2.19-18+deb8u4), libc-dev-bin (= 2.19-18+deb8u4), linux-libc-dev
        Description: GNU C Library: Development Libraries and Header Files
         Contains the symlinks, headers, and object files needed to compile
         and link programs which use the standard C library.
        Homepage: http://www.gnu.org/software/libc/libc.html
    "};

    const LIBC6_DEV_SHOW: &str = indoc! {"
        Package: libc6-dev
        Source: glibc
        Version: 2.19-18+deb8u4
        Installed-Size: 10491
        Maintainer: GNU Libc Maintainers <debian-glibc@lists.debian.org>
        Architecture: amd64
        Multi-Arch: same
        Depends: libc6 (= 2.19-18+deb8u4), libc-dev-bin (= 2.19-18+deb8u4), linux-libc-dev
        Description-en: GNU C Library: Development Libraries and Header Files
         Contains the symlinks, headers, and object files needed to compile
         and link programs which use the standard C library.
        Description-md5: 0b6d7c1ea4fb2a3d6b6a9d54a8e4c4bb
        Homepage: http://www.gnu.org/software/libc/libc.html
        Section: libdevel
        Priority: optional
        Filename: pool/main/g/glibc/libc6-dev_2.19-18+deb8u4_amd64.deb
        Size: 2236618
        MD5sum: 9a9e5e3b7b7e0a5f4b7a6ec8f6a1a9b2
        SHA1: 1e3f5c6a1b7d0e9c2a4b6d8f0a1c3e5b7d9f1a3c
        SHA256: 3a8e9a3d1c5b7e9f1a3c5e7b9d1f3a5c7e9b1d3f5a7c9e1b3d5f7a9c1e3b5d7f
    "};

    const LIBC6_DEV_POLICY: &str = indoc! {"
        libc6-dev:
          Installed: 2.19-18+deb8u4
          Candidate: 2.19-18+deb8u4
          Version table:
         *** 2.19-18+deb8u4 0
                500 http://httpredir.debian.org/debian jessie/main amd64 Packages
    "};

    const ALL_SOURCES: &str = indoc! {"
        Package files:
         100 /var/lib/dpkg/status
             release a=now
         500 http://httpredir.debian.org/debian jessie/main amd64 Packages
             release v=8.11,o=Debian,a=jessie,n=jessie,l=Debian,c=main,b=amd64
             origin httpredir.debian.org
        Pinned packages:
    "};

    const IN_RELEASE: &str = indoc! {"
        Origin: Debian
        Label: Debian
        Suite: oldoldstable
        Version: 8.11
        Codename: jessie
        Date: Sat, 23 Jun 2018 10:32:55 UTC
    "};

    fn debian_host() -> FakeSession {
        FakeSession::default()
            .file("/etc/debian_version", "8.11\n")
            .file("/etc/os-release", "ID=debian\nVERSION_ID=\"8\"\n")
            .command("grep -i ^ID.*=debian /etc/os-release", "ID=debian\n")
            .command("ls -ld /etc/apt", "drwxr-xr-x 6 root root 4096 Jun 23 2018 /etc/apt\n")
    }

    fn libc6_dev_host() -> FakeSession {
        debian_host()
            .failing_command(
                "dpkg-query -S /usr/include/stdio.h /opt/custom/bin/tool",
                "libc6-dev:amd64: /usr/include/stdio.h\n",
                "dpkg-query: no path found matching pattern /opt/custom/bin/tool\n",
            )
            .command("dpkg -s libc6-dev:amd64", LIBC6_DEV_STATUS)
            .command("apt-cache show libc6-dev:amd64=2.19-18+deb8u4", LIBC6_DEV_SHOW)
            .command(
                "stat -c %Y /var/lib/dpkg/info/libc6-dev:amd64.list",
                "1529750000\n",
            )
            .command("apt-cache policy libc6-dev:amd64", LIBC6_DEV_POLICY)
            .command("apt-cache policy", ALL_SOURCES)
            .file(
                "/var/lib/apt/lists/httpredir.debian.org_debian_dists_jessie_InRelease",
                IN_RELEASE,
            )
    }

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn trace_single_package() -> Result<()> {
        let session = libc6_dev_host();
        let tracer = DebTracer::new(&session);

        let trace = tracer
            .identify_distributions(&files(&["/usr/include/stdio.h", "/opt/custom/bin/tool"]))?
            .unwrap();

        assert_eq!(trace.unresolved_files, vec!["/opt/custom/bin/tool".to_string()]);

        let dist = &trace.distribution;
        assert_eq!(dist.name, "debian");
        assert_eq!(dist.version.as_deref(), Some("8.11"));
        assert_eq!(dist.packages.len(), 1);
        assert_eq!(dist.apt_sources.len(), 1);

        let source = &dist.apt_sources[0];
        assert_eq!(source.name, "apt_Debian_jessie_main_0");
        assert_eq!(source.identity.codename.as_deref(), Some("jessie"));
        assert_eq!(source.identity.site.as_deref(), Some("httpredir.debian.org"));
        assert_eq!(
            source.date,
            Some(Utc.with_ymd_and_hms(2018, 6, 23, 10, 32, 55).unwrap())
        );

        let package = &dist.packages[0];
        assert_eq!(package.name, "libc6-dev");
        assert_eq!(package.version, "2.19-18+deb8u4");
        assert_eq!(package.source_name.as_deref(), Some("glibc"));
        assert_eq!(package.files, vec!["/usr/include/stdio.h".to_string()]);
        assert_eq!(
            package.install_date,
            Some(Utc.timestamp_opt(1529750000, 0).unwrap())
        );
        assert_eq!(package.versions.len(), 1);
        assert_eq!(
            package.versions["2.19-18+deb8u4"],
            vec![source.name.clone()]
        );

        Ok(())
    }

    #[test]
    fn dropped_package_contributes_no_sources() -> Result<()> {
        let session = libc6_dev_host()
            .command(
                "dpkg-query -S /usr/include/stdio.h /bin/ls",
                "libc6-dev:amd64: /usr/include/stdio.h\ncoreutils: /bin/ls\n",
            )
            .failing_command("dpkg -s coreutils", "", "dpkg-query: error\n");
        let tracer = DebTracer::new(&session);

        let trace = tracer
            .identify_distributions(&files(&["/usr/include/stdio.h", "/bin/ls"]))?
            .unwrap();

        assert_eq!(trace.unresolved_files, vec!["/bin/ls".to_string()]);
        assert!(trace.distribution.package("coreutils").is_none());
        assert_eq!(trace.distribution.packages.len(), 1);
        assert_eq!(trace.distribution.apt_sources.len(), 1);

        Ok(())
    }

    #[test]
    fn not_debian() -> Result<()> {
        let session = FakeSession::default().file("/etc/redhat-release", "Fedora release 35\n");
        let tracer = DebTracer::new(&session);

        assert_eq!(tracer.detect(), None);
        assert!(tracer
            .identify_distributions(&files(&["/usr/bin/ls"]))?
            .is_none());

        // Missing apt configuration also fails detection.
        let session = debian_host().failing_command(
            "ls -ld /etc/apt",
            "",
            "ls: cannot access '/etc/apt': No such file or directory\n",
        );
        assert_eq!(DebTracer::new(&session).detect(), None);

        Ok(())
    }

    #[test]
    fn no_files_no_queries() -> Result<()> {
        let session = debian_host();
        let tracer = DebTracer::new(&session);

        assert!(tracer.identify_distributions(&[])?.is_none());
        assert!(session.calls().is_empty());

        Ok(())
    }

    #[test]
    fn no_packages_no_distribution() -> Result<()> {
        let session = debian_host().failing_command(
            "dpkg-query -S /opt/a",
            "",
            "dpkg-query: no path found matching pattern /opt/a\n",
        );
        let tracer = DebTracer::new(&session);

        assert!(tracer.identify_distributions(&files(&["/opt/a"]))?.is_none());

        Ok(())
    }

    #[test]
    fn unexpected_dpkg_query_failure_is_fatal() {
        let session = debian_host().failing_command(
            "dpkg-query -S /opt/a",
            "partial\n",
            "dpkg-query: error: database is locked\n",
        );
        let tracer = DebTracer::new(&session);

        let err = tracer
            .identify_distributions(&files(&["/opt/a"]))
            .unwrap_err();
        assert_eq!(err.stderr(), Some("dpkg-query: error: database is locked\n"));
        assert_eq!(err.stdout(), Some("partial\n"));
    }

    #[test]
    fn queries_are_batched() -> Result<()> {
        let session = debian_host()
            .command("dpkg-query -S /bin/aa /bin/bb", "coreutils: /bin/aa\n")
            .command("dpkg-query -S /bin/cc", "coreutils: /bin/cc\n");
        // 13 bytes of overhead plus two 8 byte slots.
        let config = TracerConfig::default().with_max_command_length(29);
        let tracer = DebTracer::with_config(&session, config);

        let owned = tracer.files_to_packages(&files(&["/bin/aa", "/bin/bb", "/bin/cc"]))?;
        assert_eq!(owned.len(), 2);
        assert_eq!(
            session.calls(),
            vec![
                "dpkg-query -S /bin/aa /bin/bb".to_string(),
                "dpkg-query -S /bin/cc".to_string()
            ]
        );

        Ok(())
    }

    #[test]
    fn files_grouped_per_package() -> Result<()> {
        let session = libc6_dev_host().command(
            "dpkg-query -S /usr/include/stdio.h /usr/include/stdlib.h",
            "libc6-dev:amd64: /usr/include/stdio.h\nlibc6-dev:amd64: /usr/include/stdlib.h\n",
        );
        let tracer = DebTracer::new(&session);
        let mut registry = SourceRegistry::default();

        let (packages, unresolved) = tracer.identify_packages_from_files(
            &mut registry,
            &files(&["/usr/include/stdio.h", "/usr/include/stdlib.h"]),
        )?;

        assert!(unresolved.is_empty());
        assert_eq!(packages.len(), 1);
        assert_eq!(
            packages[0].files,
            vec![
                "/usr/include/stdio.h".to_string(),
                "/usr/include/stdlib.h".to_string()
            ]
        );
        assert_eq!(
            session
                .calls()
                .iter()
                .filter(|c| c.starts_with("dpkg -s"))
                .count(),
            1
        );

        Ok(())
    }
}
