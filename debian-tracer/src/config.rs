// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Tracer configuration. */

/// Command line length used when the platform limit cannot be determined.
pub const FALLBACK_MAX_COMMAND_LENGTH: usize = 2048;

/// Directory holding dpkg's per-package install records.
pub const DEFAULT_DPKG_INFO_DIR: &str = "/var/lib/dpkg/info";

/// Directory holding apt's downloaded index and release files.
pub const DEFAULT_APT_LISTS_DIR: &str = "/var/lib/apt/lists";

/// Obtain a conservative maximum command line length for this platform.
///
/// This is half of `ARG_MAX`, leaving room for the environment block.
pub fn default_max_command_length() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf() has no preconditions.
        let arg_max = unsafe { libc::sysconf(libc::_SC_ARG_MAX) };

        if arg_max > 0 {
            return arg_max as usize / 2;
        }
    }

    FALLBACK_MAX_COMMAND_LENGTH
}

/// Settings influencing how a Debian system is traced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TracerConfig {
    /// Maximum length in bytes of a generated `dpkg-query` command line.
    pub max_command_length: usize,

    /// Directory containing `<package>.list` install records.
    pub dpkg_info_dir: String,

    /// Directory containing `*_Release` and `*_InRelease` files.
    pub apt_lists_dir: String,

    /// Whether to look up release dates of apt origins.
    pub resolve_release_dates: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            max_command_length: default_max_command_length(),
            dpkg_info_dir: DEFAULT_DPKG_INFO_DIR.to_string(),
            apt_lists_dir: DEFAULT_APT_LISTS_DIR.to_string(),
            resolve_release_dates: true,
        }
    }
}

impl TracerConfig {
    pub fn with_max_command_length(mut self, length: usize) -> Self {
        self.max_command_length = length;
        self
    }

    pub fn with_dpkg_info_dir(mut self, path: impl ToString) -> Self {
        self.dpkg_info_dir = path.to_string();
        self
    }

    pub fn with_apt_lists_dir(mut self, path: impl ToString) -> Self {
        self.apt_lists_dir = path.to_string();
        self
    }

    pub fn with_resolve_release_dates(mut self, value: bool) -> Self {
        self.resolve_release_dates = value;
        self
    }

    /// Path to the install record of a package.
    ///
    /// `name` may carry a `:<arch>` qualifier.
    pub fn install_record_path(&self, name: &str) -> String {
        format!("{}/{}.list", self.dpkg_info_dir.trim_end_matches('/'), name)
    }
}
