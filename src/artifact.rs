//! Artifact path composition and the post-build copy operation.
//!
//! The build system produces the primary firmware image under its build
//! output directory. The OTA distribution workflow consumes a renamed
//! duplicate at the project root: the application image alone, without
//! bootloader or partition data (those ship as separate artifacts).
//!
//! Path resolution and the copy are deliberately decoupled: callers compose
//! an [`ArtifactPaths`] (from explicit arguments or from the build
//! environment) and pass it to [`copy_image`]. The copy reports through
//! [`CopyOutcome`] rather than `Result` so the caller owns the decision of
//! whether a failure aborts the build.

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default filename of the primary build artifact.
pub const FIRMWARE_BIN_FILENAME: &str = "firmware.bin";

/// Default filename of the OTA image written at the project root.
pub const OTA_IMAGE_FILENAME: &str = "firmware_ota.bin";

/// Environment variable carrying the build output directory.
///
/// The installed shim exports this from the build environment's `$BUILD_DIR`
/// substitution before invoking the hook.
pub const BUILD_DIR_ENV_VAR: &str = "BUILD_DIR";

/// Environment variable carrying the project root directory.
pub const PROJECT_DIR_ENV_VAR: &str = "PROJECT_DIR";

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// The two resolved artifact paths for one hook invocation.
///
/// Composed once per invocation; never cached across builds. The build
/// system owns the underlying directory configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Location of the build system's main output file.
    pub primary: PathBuf,
    /// Fixed destination of the OTA image under the project root.
    pub secondary: PathBuf,
}

impl ArtifactPaths {
    /// Compose the primary and secondary paths from explicit directories and
    /// artifact filenames.
    ///
    /// Rejects empty directory values and a secondary path equal to the
    /// primary (copying a file onto itself truncates it on some platforms).
    pub fn compose(
        build_dir: &Path,
        project_dir: &Path,
        firmware_name: &str,
        ota_name: &str,
    ) -> Result<Self> {
        if build_dir.as_os_str().is_empty() {
            bail!("build output directory is empty");
        }
        if project_dir.as_os_str().is_empty() {
            bail!("project root directory is empty");
        }

        let primary = build_dir.join(firmware_name);
        let secondary = project_dir.join(ota_name);

        if primary == secondary {
            bail!(
                "OTA image path must differ from the primary artifact path: {}",
                primary.display()
            );
        }

        Ok(Self { primary, secondary })
    }

    /// Compose paths from the build environment (`BUILD_DIR` / `PROJECT_DIR`).
    ///
    /// This is the hook-mode entry point; the `run` subcommand bypasses it
    /// with explicit directories.
    pub fn from_env(firmware_name: &str, ota_name: &str) -> Result<Self> {
        Self::from_env_values(
            std::env::var(BUILD_DIR_ENV_VAR).ok(),
            std::env::var(PROJECT_DIR_ENV_VAR).ok(),
            firmware_name,
            ota_name,
        )
    }

    /// Internal resolver that accepts the env values as parameters for
    /// testability.
    fn from_env_values(
        build_dir: Option<String>,
        project_dir: Option<String>,
        firmware_name: &str,
        ota_name: &str,
    ) -> Result<Self> {
        let build_dir = build_dir
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("{BUILD_DIR_ENV_VAR} is not set in the build environment"))?;
        let project_dir = project_dir.filter(|v| !v.trim().is_empty()).with_context(|| {
            format!("{PROJECT_DIR_ENV_VAR} is not set in the build environment")
        })?;

        Self::compose(
            Path::new(&build_dir),
            Path::new(&project_dir),
            firmware_name,
            ota_name,
        )
    }
}

/// Classified result of the copy operation.
///
/// The original hook shelled out to `cp` and discarded the status, which
/// conflated "command issued" with "command succeeded". Each failure mode is
/// distinguishable here so the caller can apply its abort-vs-continue policy.
#[derive(Debug)]
pub enum CopyOutcome {
    /// The OTA image was written and its digest matches the primary artifact.
    Copied {
        /// Size of the copied image in bytes.
        bytes: u64,
    },
    /// The primary artifact does not exist; nothing was written.
    SourceMissing,
    /// The destination could not be written, or the written image did not
    /// verify against the primary artifact.
    Failed(anyhow::Error),
}

// ---------------------------------------------------------------------------
// Copy operation
// ---------------------------------------------------------------------------

/// Duplicate the primary artifact to the secondary path.
///
/// Overwrites an existing OTA image. When the primary artifact is absent the
/// secondary path is left untouched (no partial or empty file is created).
/// After the copy, both files are digested and compared so a truncated or
/// concurrently-modified destination surfaces as [`CopyOutcome::Failed`]
/// instead of passing silently.
pub fn copy_image(paths: &ArtifactPaths) -> CopyOutcome {
    if !paths.primary.exists() {
        return CopyOutcome::SourceMissing;
    }

    let bytes = match std::fs::copy(&paths.primary, &paths.secondary) {
        Ok(n) => n,
        Err(e) => {
            return CopyOutcome::Failed(anyhow::Error::new(e).context(format!(
                "failed to copy {} to {}",
                paths.primary.display(),
                paths.secondary.display()
            )));
        }
    };

    match verify_copy(paths) {
        Ok(()) => CopyOutcome::Copied { bytes },
        Err(e) => CopyOutcome::Failed(e),
    }
}

/// Run the post-build copy, emitting the progress line to `w` first.
///
/// The progress line names the OTA image path and is written before the
/// outcome is known, matching the hook's observable contract: the message
/// appears even when the copy subsequently fails.
pub fn run_post_build(paths: &ArtifactPaths, w: &mut dyn Write) -> CopyOutcome {
    let _ = writeln!(
        w,
        "[ota-image-hook] Creating OTA firmware image: {}",
        paths.secondary.display()
    );
    copy_image(paths)
}

/// Verify that the written OTA image is byte-identical to the primary
/// artifact by comparing SHA-256 digests.
fn verify_copy(paths: &ArtifactPaths) -> Result<()> {
    let expected = sha256_file(&paths.primary)?;
    let actual = sha256_file(&paths.secondary)?;
    if expected != actual {
        bail!(
            "OTA image digest mismatch: {} does not match {} (expected {expected}, got {actual})",
            paths.secondary.display(),
            paths.primary.display()
        );
    }
    Ok(())
}

/// Computes the SHA-256 hash of a file, returned as a lowercase hex string.
///
/// Reads in 8KB chunks to handle large images without loading them fully
/// into memory.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file for checksum: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buffer)
            .with_context(|| format!("Failed to read file for checksum: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
