//! Per-project config file module for the OTA image hook.
//!
//! Persists hook settings as TOML at `<project-root>/ota-hook.toml` so the
//! hook behaves consistently across build invocations. All fields are
//! optional; an absent file means defaults throughout.
//!
//! The config lives at the project root rather than under `$HOME` because
//! the hook is a per-project integration: two projects on the same machine
//! may name their artifacts differently or want different failure policies.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::artifact::{FIRMWARE_BIN_FILENAME, OTA_IMAGE_FILENAME};

/// Config file name at the project root.
pub const CONFIG_FILE_NAME: &str = "ota-hook.toml";

/// Environment variable overriding the failure policy.
///
/// Sits between the CLI flag and the config file in precedence. Accepted
/// values: `true`/`false`/`1`/`0` (case-insensitive, trimmed).
pub const FAIL_ON_ERROR_ENV_VAR: &str = "OTA_HOOK_FAIL_ON_ERROR";

/// Per-project hook configuration.
///
/// Persisted as TOML at `<project-root>/ota-hook.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct HookConfig {
    /// Filename of the primary build artifact under the build output
    /// directory. Defaults to `firmware.bin`.
    pub firmware_name: Option<String>,
    /// Filename of the OTA image written at the project root.
    /// Defaults to `firmware_ota.bin`.
    pub ota_name: Option<String>,
    /// When true, a failed copy exits non-zero so the build system can fail
    /// the build. Defaults to false: the hook is best-effort and never
    /// blocks the build.
    pub fail_on_error: Option<bool>,
}

impl HookConfig {
    /// Resolve the config file path for a project: `<project-root>/ota-hook.toml`.
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE_NAME)
    }

    /// Load config for a project. Returns defaults if the config file does
    /// not exist.
    ///
    /// Parse errors and I/O errors (other than file-not-found) are surfaced
    /// as hard failures to prevent silently operating on corrupted state.
    pub fn load(project_dir: &Path) -> Result<Self> {
        Self::load_from(&Self::config_path(project_dir))
    }

    /// Load config from a specific path. Returns defaults if the file does
    /// not exist.
    fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file at {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read config file at {}", path.display()))
            }
        }
    }

    /// Save config for a project, creating parent directories if needed.
    pub fn save(&self, project_dir: &Path) -> Result<()> {
        self.save_to(&Self::config_path(project_dir))
    }

    /// Save config to a specific path, creating parent directories if needed.
    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory at {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, &contents)
            .with_context(|| format!("failed to write config file at {}", path.display()))?;
        Ok(())
    }

    /// Resolved filename of the primary build artifact.
    ///
    /// Empty or whitespace-only configured values fall through to the
    /// default.
    pub fn resolved_firmware_name(&self) -> String {
        non_empty_trimmed(self.firmware_name.clone())
            .unwrap_or_else(|| FIRMWARE_BIN_FILENAME.to_string())
    }

    /// Resolved filename of the OTA image.
    pub fn resolved_ota_name(&self) -> String {
        non_empty_trimmed(self.ota_name.clone()).unwrap_or_else(|| OTA_IMAGE_FILENAME.to_string())
    }

    /// Resolve the effective failure policy using layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. `cli_flag`: the `--fail-on-error` flag for this invocation
    ///    (the flag can only turn the policy on, never off)
    /// 2. `OTA_HOOK_FAIL_ON_ERROR` environment variable
    /// 3. `fail_on_error` field from the persisted config file
    /// 4. Default: `false` (best-effort; the hook never fails the build)
    ///
    /// Unrecognized environment values are treated as absent and fall
    /// through to the next layer.
    pub fn resolve_fail_on_error(&self, cli_flag: bool) -> bool {
        self.resolve_fail_on_error_with_env(cli_flag, std::env::var(FAIL_ON_ERROR_ENV_VAR).ok())
    }

    /// Internal resolver that accepts the env var value as a parameter for
    /// testability.
    fn resolve_fail_on_error_with_env(&self, cli_flag: bool, env_value: Option<String>) -> bool {
        if cli_flag {
            return true;
        }
        if let Some(from_env) = env_value.as_deref().and_then(parse_bool_flag) {
            return from_env;
        }
        self.fail_on_error.unwrap_or(false)
    }
}

/// Parses a boolean flag value: `true`/`1` and `false`/`0`, case-insensitive,
/// surrounding whitespace ignored. Anything else is `None`.
fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Return the trimmed value if non-empty after trimming, otherwise `None`.
fn non_empty_trimmed(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
