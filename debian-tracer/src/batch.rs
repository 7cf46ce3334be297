// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Splitting of path lists into command lines of bounded length. */

/// Bytes consumed by `dpkg-query -S` plus its trailing separator.
pub const DPKG_QUERY_OVERHEAD: usize = 13;

/// Compute how many paths fit in a single command invocation.
///
/// Every path is budgeted at the length of the longest path in `paths` plus one
/// separator byte. The result is never less than 1.
pub fn paths_per_command<S: AsRef<str>>(paths: &[S], max_length: usize, overhead: usize) -> usize {
    let longest = paths.iter().map(|p| p.as_ref().len()).max().unwrap_or(0);

    (max_length.saturating_sub(overhead) / (longest + 1)).max(1)
}

/// Partition `paths` into contiguous batches whose command lines stay within `max_length`.
///
/// The concatenation of the emitted batches is `paths`.
pub fn batch_paths<S: AsRef<str>>(
    paths: &[S],
    max_length: usize,
    overhead: usize,
) -> impl Iterator<Item = &[S]> {
    paths.chunks(paths_per_command(paths, max_length, overhead))
}
