// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for configuration and template files
//! that the exporter needs to read.

use std::path::{Path, PathBuf};

/// Determine default absolute path to configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/crosswalk/crosswalk.toml`
/// as the default absolute path for configuration. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoConfigDir`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("crosswalk").join("crosswalk.toml"))
        .ok_or(NoConfigDir)
}

/// Resolve template path of profile.
///
/// Absolute template paths are kept as is. Relative template paths are
/// joined onto the template directory.
pub fn resolve_template_path(template_dir: &Path, template: &Path) -> PathBuf {
    if template.is_absolute() {
        template.to_path_buf()
    } else {
        template_dir.join(template)
    }
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigDir;

/// Friendly result alias :3
pub type Result<T, E = NoConfigDir> = std::result::Result<T, E>;
