// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Tracing files on Debian systems to their packages.

This crate answers the question *where did these files come from?* on dpkg/apt based
Linux distributions. Given a list of paths, it identifies the installed binary packages
owning them, the exact versions installed, the source packages they were built from
and the apt repositories (*origins*) from which every known version could be obtained.

The canonical home of this crate is <https://github.com/indygreg/PyOxidizer>. Please file issues
and pull requests there.

# A Tour of Functionality

All interaction with the traced system goes through the [session::Session] trait, which
runs commands and reads files. [session::LocalSession] operates on the current machine.

[tracer::DebTracer] is the entry point. [tracer::DebTracer::detect] determines whether a
system is Debian flavored and [tracer::DebTracer::identify_distributions] performs a
trace, yielding a [model::DebianDistribution] of [model::DebPackage] and
[model::AptSource].

Lower-level pieces are usable on their own:

* [dpkg_query] parses `dpkg-query -S` output and [batch] splits queries to respect
  command line limits.
* [package_detail] interprets `dpkg -s` and `apt-cache show` records, which are
  parsed by the lenient control file parser in [control].
* [policy] parses `apt-cache policy` output, both per-package version tables and the
  table of all package files.
* [sources] assigns stable names to apt origins and [release] finds their release dates.
* [resolver] combines the above to resolve a single package.

Tracing is configured via [config::TracerConfig].
*/

pub mod batch;
pub mod config;
pub mod control;
pub mod dpkg_query;
pub mod error;
pub mod model;
pub mod package_detail;
pub mod policy;
pub mod release;
pub mod resolver;
pub mod session;
pub mod sources;
#[cfg(test)]
mod testutil;
pub mod tracer;

pub use {
    config::TracerConfig,
    error::{Result, TracerError},
    model::{AptSource, DebPackage, DebianDistribution, OriginIdentity, PackageIdentity},
    session::{LocalSession, Session},
    tracer::{DebTracer, DistributionTrace},
};
