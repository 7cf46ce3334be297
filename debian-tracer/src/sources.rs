// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Naming of apt origins encountered during a trace. */

use {
    crate::{
        config::TracerConfig,
        error::Result,
        model::{AptSource, OriginIdentity},
        policy::{parse_policy_sources, PolicySource},
        release::find_release_date,
        session::Session,
    },
    log::{debug, warn},
    std::collections::{BTreeMap, BTreeSet, HashMap, HashSet},
};

/// Find the first name produced by `template` for n = 0, 1, ... not in `used`.
fn generate_unique_name(template: impl Fn(usize) -> String, used: &BTreeSet<String>) -> String {
    let mut n = 0;

    loop {
        let name = template(n);
        if !used.contains(&name) {
            return name;
        }
        n += 1;
    }
}

/// Assigns stable, unique names to apt origins.
///
/// A single instance is used for an entire trace. The table of all package files
/// known to apt is queried at most once, the first time a source line needs naming.
/// Names are never reassigned.
#[derive(Clone, Debug, Default)]
pub struct SourceRegistry {
    known: Option<BTreeMap<String, PolicySource>>,
    line_names: HashMap<String, String>,
    identity_names: HashMap<OriginIdentity, String>,
    names: BTreeSet<String>,
    sources: BTreeMap<String, AptSource>,
    reported_unknown: HashSet<String>,
}

impl SourceRegistry {
    /// Whether the table of known package files has been populated.
    pub fn is_loaded(&self) -> bool {
        self.known.is_some()
    }

    /// Populate the table of known package files if it hasn't been yet.
    pub fn ensure_loaded<S: Session + ?Sized>(&mut self, session: &S) -> Result<()> {
        if self.known.is_none() {
            let output = session.execute_command(&["apt-cache", "policy"])?;
            let known = parse_policy_sources(&output.stdout);
            debug!("apt knows {} package files", known.len());
            self.known = Some(known);
        }

        Ok(())
    }

    /// Name an origin identity.
    ///
    /// The name follows `apt_<origin>_<archive>_<component>_<n>`, with `n` the smallest
    /// integer making the name unique. Equal identities receive the same name.
    pub fn name_for(&mut self, identity: &OriginIdentity) -> String {
        if let Some(name) = self.identity_names.get(identity) {
            return name.clone();
        }

        let name = generate_unique_name(
            |n| {
                format!(
                    "apt_{}_{}_{}_{}",
                    identity.origin.as_deref().unwrap_or_default(),
                    identity.archive.as_deref().unwrap_or_default(),
                    identity.component.as_deref().unwrap_or_default(),
                    n
                )
            },
            &self.names,
        );

        self.names.insert(name.clone());
        self.identity_names.insert(identity.clone(), name.clone());

        name
    }

    /// Resolve a source line from a version table to an origin name.
    ///
    /// Returns [None] if apt doesn't know the source line. Each unknown line is only
    /// reported once.
    pub fn name_for_line<S: Session + ?Sized>(
        &mut self,
        session: &S,
        config: &TracerConfig,
        line: &str,
    ) -> Result<Option<String>> {
        if let Some(name) = self.line_names.get(line) {
            return Ok(Some(name.clone()));
        }

        self.ensure_loaded(session)?;

        let source = match self.known.as_ref().and_then(|known| known.get(line)) {
            Some(source) => source.clone(),
            None => {
                if self.reported_unknown.insert(line.to_string()) {
                    warn!("cannot find apt source {}", line);
                }
                return Ok(None);
            }
        };

        let name = self.name_for(&source.identity);

        if !self.sources.contains_key(&name) {
            let date = if config.resolve_release_dates {
                find_release_date(session, &config.apt_lists_dir, &source)
            } else {
                None
            };

            self.sources.insert(
                name.clone(),
                AptSource {
                    name: name.clone(),
                    identity: source.identity,
                    date,
                },
            );
        }

        self.line_names.insert(line.to_string(), name.clone());

        Ok(Some(name))
    }

    /// Number of distinct source lines apt didn't know about.
    pub fn unknown_line_count(&self) -> usize {
        self.reported_unknown.len()
    }

    /// Origins named for source lines so far, ordered by name.
    pub fn sources(&self) -> impl Iterator<Item = &AptSource> {
        self.sources.values()
    }

    /// Obtain the named origins, consuming self.
    pub fn into_sources(self) -> Vec<AptSource> {
        self.sources.into_values().collect()
    }
}
