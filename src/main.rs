mod output;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ota_image_hook::artifact::{self, ArtifactPaths, CopyOutcome};
use ota_image_hook::config::HookConfig;
use std::path::{Path, PathBuf};
use std::process;

/// OTA Image Hook: duplicate the primary firmware build artifact to a
/// project-level OTA image after each build.
///
/// The OTA image is the application binary alone (no bootloader or partition
/// data) at a fixed path, ready for the over-the-air distribution workflow.
#[derive(Parser, Debug)]
#[command(
    name = "ota-image-hook",
    version,
    about,
    after_help = "Examples:\n  ota-image-hook install\n  ota-image-hook status\n  ota-image-hook hook post-build\n  ota-image-hook run --build-dir .pio/build/esp32dev --project-dir .\n  ota-image-hook uninstall"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register the post-build hook in the current project.
    Install,

    /// Build-system hook entry points.
    Hook {
        #[command(subcommand)]
        hook_command: HookCommand,
    },

    /// Copy the OTA image once, with explicit paths (no environment lookup).
    Run {
        /// Build output directory containing the primary firmware image.
        #[arg(long)]
        build_dir: PathBuf,

        /// Project root directory receiving the OTA image.
        #[arg(long)]
        project_dir: PathBuf,
    },

    /// Remove the shim and hook configuration from the current project.
    Uninstall,

    /// Show hook configuration and artifact state for the current project.
    Status,
}

#[derive(Subcommand, Debug)]
enum HookCommand {
    /// Post-build hook: duplicate the primary firmware image to the OTA path.
    PostBuild {
        /// Exit non-zero when the copy fails (overrides env/config policy).
        #[arg(long)]
        fail_on_error: bool,
    },
}

// ---------------------------------------------------------------------------
// Shim
// ---------------------------------------------------------------------------

/// File name of the shim script written at the project root.
const SHIM_FILE_NAME: &str = "post_build_ota.py";

/// Backup name for a foreign file occupying the shim path.
const SHIM_BACKUP_FILE_NAME: &str = "post_build_ota.py.pre-ota-image-hook";

/// Marker embedded in the shim so install/uninstall can tell our shim from a
/// user's own extra script.
const SHIM_MARKER: &str = "generated by ota-image-hook";

/// The installed shim: an `extra_scripts` file that registers a post-action
/// on the primary artifact and re-invokes this binary with the build
/// environment's directory substitutions exported.
const SHIM_CONTENT: &str = r#"# generated by ota-image-hook; do not edit by hand
import os

Import("env")


def create_ota_image(source, target, env):
    os.environ["BUILD_DIR"] = env.subst("$BUILD_DIR")
    os.environ["PROJECT_DIR"] = env.subst("$PROJECT_DIR")
    env.Execute("ota-image-hook hook post-build")


env.AddPostAction("$BUILD_DIR/firmware.bin", create_ota_image)
"#;

// ---------------------------------------------------------------------------
// Subcommand dispatch
// ---------------------------------------------------------------------------

/// The install subcommand: write the shim script into the current project.
///
/// Steps:
/// 1. Sanity-check that the directory looks like a PlatformIO project
/// 2. Write the `post_build_ota.py` shim (backing up a foreign file first)
/// 3. Remind the user to register the shim under `extra_scripts`
///
/// Errors at each step are reported but do not prevent subsequent steps
/// from being attempted.
fn run_install() -> Result<()> {
    run_install_inner(None)
}

/// Inner implementation of install, accepting an optional project directory
/// override for testability. If `project_override` is `None`, uses the
/// current working directory.
fn run_install_inner(project_override: Option<&Path>) -> Result<()> {
    let project_dir = resolve_project_dir(project_override)?;

    output::step(
        "Install",
        &format!("registering OTA image hook in {}", project_dir.display()),
    );

    let mut had_errors = false;

    // Step 1: project layout sanity check
    if !project_dir.join("platformio.ini").exists() {
        output::warn("platformio.ini not found; this does not look like a PlatformIO project root");
    }

    // Step 2: write the shim, backing up any foreign file at its path
    let shim_path = project_dir.join(SHIM_FILE_NAME);
    let should_write = if shim_path.exists() {
        match std::fs::read_to_string(&shim_path) {
            Ok(existing) => {
                if existing.contains(SHIM_MARKER) {
                    output::detail("shim already installed, updating");
                    true
                } else {
                    let backup_path = project_dir.join(SHIM_BACKUP_FILE_NAME);
                    match std::fs::copy(&shim_path, &backup_path) {
                        Ok(_) => {
                            output::warn(&format!(
                                "{} exists but was not created by ota-image-hook; backed up to {}",
                                shim_path.display(),
                                backup_path.display()
                            ));
                        }
                        Err(e) => {
                            output::warn(&format!(
                                "{} exists but was not created by ota-image-hook; failed to back up: {}",
                                shim_path.display(),
                                e
                            ));
                        }
                    }
                    true
                }
            }
            Err(_) => {
                output::warn(&format!(
                    "could not read existing {}; overwriting",
                    shim_path.display()
                ));
                true
            }
        }
    } else {
        true
    };

    if should_write {
        match std::fs::write(&shim_path, SHIM_CONTENT) {
            Ok(()) => {
                output::success("Shim", &format!("wrote {}", shim_path.display()));
            }
            Err(e) => {
                output::fail(
                    "Error",
                    &format!("failed to write {}: {}", shim_path.display(), e),
                );
                had_errors = true;
            }
        }
    }

    // Step 3: the build system still has to load the shim
    output::detail(&format!(
        "add `extra_scripts = post:{SHIM_FILE_NAME}` to platformio.ini to activate the hook"
    ));

    if had_errors {
        output::fail("Install", "completed with errors (see above)");
    } else {
        output::success("Install", "complete");
    }

    Ok(())
}

/// The uninstall subcommand: remove the shim and the hook config.
///
/// A foreign file at the shim path is left alone. All removal failures are
/// warnings; uninstall always runs to completion.
fn run_uninstall() -> Result<()> {
    run_uninstall_inner(None)
}

fn run_uninstall_inner(project_override: Option<&Path>) -> Result<()> {
    let project_dir = resolve_project_dir(project_override)?;

    output::step(
        "Uninstall",
        &format!("removing OTA image hook from {}", project_dir.display()),
    );

    let shim_path = project_dir.join(SHIM_FILE_NAME);
    match std::fs::read_to_string(&shim_path) {
        Ok(existing) if existing.contains(SHIM_MARKER) => {
            if let Err(e) = std::fs::remove_file(&shim_path) {
                output::warn(&format!("failed to remove {}: {}", shim_path.display(), e));
            } else {
                output::success("Shim", &format!("removed {}", shim_path.display()));
            }
        }
        Ok(_) => {
            output::warn(&format!(
                "{} was not created by ota-image-hook; leaving it in place",
                shim_path.display()
            ));
        }
        Err(_) => {
            output::detail("no shim installed");
        }
    }

    let config_path = HookConfig::config_path(&project_dir);
    if config_path.exists() {
        if let Err(e) = std::fs::remove_file(&config_path) {
            output::warn(&format!(
                "failed to remove {}: {}",
                config_path.display(),
                e
            ));
        } else {
            output::success("Config", &format!("removed {}", config_path.display()));
        }
    }

    output::success("Uninstall", "complete");
    Ok(())
}

/// The status subcommand: show hook configuration and artifact state.
///
/// Displays the project root, shim presence, configured artifact names, the
/// effective failure policy, and whether the artifacts currently exist on
/// disk. Handles a missing or unreadable config gracefully.
fn run_status() -> Result<()> {
    let project_dir = resolve_project_dir(None)?;
    run_status_inner(&mut std::io::stderr(), &project_dir)
}

/// Inner implementation of `run_status` that writes to a `Write` impl.
/// This allows tests to capture the output for verification.
fn run_status_inner(w: &mut dyn std::io::Write, project_dir: &Path) -> Result<()> {
    writeln!(w, "[ota-image-hook] Status").ok();
    writeln!(w, "[ota-image-hook]   Project: {}", project_dir.display()).ok();

    // --- Project layout ---
    let ini_present = project_dir.join("platformio.ini").exists();
    writeln!(
        w,
        "[ota-image-hook]   platformio.ini: {}",
        if ini_present { "present" } else { "missing" }
    )
    .ok();

    // --- Shim ---
    let shim_path = project_dir.join(SHIM_FILE_NAME);
    let shim_state = match std::fs::read_to_string(&shim_path) {
        Ok(content) if content.contains(SHIM_MARKER) => "installed",
        Ok(_) => "foreign file at shim path",
        Err(_) => "not installed",
    };
    writeln!(w, "[ota-image-hook]   Shim: {}", shim_state).ok();

    // --- Config ---
    let config = match HookConfig::load(project_dir) {
        Ok(c) => {
            let present = HookConfig::config_path(project_dir).exists();
            writeln!(
                w,
                "[ota-image-hook]   Config: {}",
                if present { "present" } else { "(defaults)" }
            )
            .ok();
            c
        }
        Err(e) => {
            writeln!(w, "[ota-image-hook]   Config: unreadable ({e:#})").ok();
            HookConfig::default()
        }
    };

    writeln!(
        w,
        "[ota-image-hook]   Firmware image: {}",
        config.resolved_firmware_name()
    )
    .ok();

    // --- OTA image presence ---
    let ota_path = project_dir.join(config.resolved_ota_name());
    writeln!(
        w,
        "[ota-image-hook]   OTA image: {} ({})",
        ota_path.display(),
        if ota_path.exists() {
            "exists"
        } else {
            "not yet built"
        }
    )
    .ok();

    // --- Policy ---
    let strict = config.resolve_fail_on_error(false);
    writeln!(
        w,
        "[ota-image-hook]   Policy: {}",
        if strict { "fail-on-error" } else { "best-effort" }
    )
    .ok();

    // --- Build environment ---
    match std::env::var(artifact::BUILD_DIR_ENV_VAR) {
        Ok(build_dir) if !build_dir.trim().is_empty() => {
            let primary = Path::new(&build_dir).join(config.resolved_firmware_name());
            writeln!(
                w,
                "[ota-image-hook]   BUILD_DIR: {} (primary artifact {})",
                build_dir,
                if primary.exists() { "exists" } else { "missing" }
            )
            .ok();
        }
        _ => {
            writeln!(w, "[ota-image-hook]   BUILD_DIR: (not set)").ok();
        }
    }

    Ok(())
}

/// The run subcommand: one explicit copy, no environment lookup.
///
/// Unlike the hook entry point this is always strict: the caller invoked the
/// copy deliberately, so a failure exits non-zero.
fn run_copy(build_dir: &Path, project_dir: &Path) -> Result<()> {
    let config = HookConfig::load(project_dir)?;
    let paths = ArtifactPaths::compose(
        build_dir,
        project_dir,
        &config.resolved_firmware_name(),
        &config.resolved_ota_name(),
    )?;

    output::step(
        "Copy",
        &format!("creating OTA firmware image: {}", paths.secondary.display()),
    );

    match artifact::copy_image(&paths) {
        CopyOutcome::Copied { bytes } => {
            output::success(
                "Copy",
                &format!("{} ({} bytes)", paths.secondary.display(), bytes),
            );
            Ok(())
        }
        CopyOutcome::SourceMissing => {
            bail!("primary artifact not found: {}", paths.primary.display())
        }
        CopyOutcome::Failed(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Hook entry point
// ---------------------------------------------------------------------------

/// Outcome of the hook after the copy, before policy is applied.
enum HookDisposition {
    /// The OTA image was written and verified.
    Completed,
    /// Something failed; `strict` carries the resolved policy at the point
    /// of failure.
    Failed { strict: bool, message: String },
}

/// The post-build hook handler.
///
/// Under the default best-effort policy this function must NEVER fail the
/// build: all errors are logged as warnings and the process exits 0. The
/// outer wrapper uses `std::panic::catch_unwind` so even a panic cannot
/// propagate a non-zero exit into the build system's action handling.
///
/// Under the strict policy (CLI flag, `OTA_HOOK_FAIL_ON_ERROR`, or config) a
/// failed copy returns an error, and `main` exits 1.
fn run_hook_post_build(fail_on_error: bool) -> Result<()> {
    let result = std::panic::catch_unwind(|| hook_post_build_inner(fail_on_error));

    let disposition = match result {
        Ok(d) => d,
        // Policy resolution may itself have panicked, so only the CLI flag
        // can make a panic strict.
        Err(_) => HookDisposition::Failed {
            strict: fail_on_error,
            message: "hook panicked (this is a bug)".to_string(),
        },
    };

    match disposition {
        HookDisposition::Completed => Ok(()),
        HookDisposition::Failed { strict, message } => {
            eprintln!("[ota-image-hook] warning: {message}");
            if strict {
                bail!("OTA image was not created");
            }
            Ok(())
        }
    }
}

/// Inner implementation of the post-build hook.
///
/// Resolves the project root and config first so the configured failure
/// policy applies to as many failure paths as possible; failures before the
/// config is available fall back to the CLI flag alone.
fn hook_post_build_inner(fail_on_error: bool) -> HookDisposition {
    let project_dir = match std::env::var(artifact::PROJECT_DIR_ENV_VAR) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v),
        _ => {
            return HookDisposition::Failed {
                strict: fail_on_error,
                message: format!(
                    "{} is not set in the build environment",
                    artifact::PROJECT_DIR_ENV_VAR
                ),
            };
        }
    };

    let config = match HookConfig::load(&project_dir) {
        Ok(c) => c,
        Err(e) => {
            return HookDisposition::Failed {
                strict: fail_on_error,
                message: format!("{e:#}"),
            };
        }
    };

    let strict = config.resolve_fail_on_error(fail_on_error);

    let paths = match ArtifactPaths::from_env(
        &config.resolved_firmware_name(),
        &config.resolved_ota_name(),
    ) {
        Ok(p) => p,
        Err(e) => {
            return HookDisposition::Failed {
                strict,
                message: format!("{e:#}"),
            };
        }
    };

    match artifact::run_post_build(&paths, &mut std::io::stderr()) {
        CopyOutcome::Copied { bytes } => {
            eprintln!("[ota-image-hook] OTA image written ({bytes} bytes)");
            HookDisposition::Completed
        }
        CopyOutcome::SourceMissing => HookDisposition::Failed {
            strict,
            message: format!("primary artifact not found: {}", paths.primary.display()),
        },
        CopyOutcome::Failed(e) => HookDisposition::Failed {
            strict,
            message: format!("{e:#}"),
        },
    }
}

/// Resolve the project directory for the interactive subcommands: an
/// explicit override (tests) or the current working directory.
fn resolve_project_dir(project_override: Option<&Path>) -> Result<PathBuf> {
    match project_override {
        Some(p) => Ok(p.to_path_buf()),
        None => std::env::current_dir().context("could not determine current directory"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Install => run_install(),
        Command::Hook { hook_command } => match hook_command {
            HookCommand::PostBuild { fail_on_error } => run_hook_post_build(fail_on_error),
        },
        Command::Run {
            build_dir,
            project_dir,
        } => run_copy(&build_dir, &project_dir),
        Command::Uninstall => run_uninstall(),
        Command::Status => run_status(),
    };

    if let Err(e) = result {
        eprintln!("[ota-image-hook] error: {e:#}");
        process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    // -----------------------------------------------------------------------
    // CLI parsing
    // -----------------------------------------------------------------------

    #[test]
    fn cli_parses_install() {
        let cli = Cli::parse_from(["ota-image-hook", "install"]);
        assert!(matches!(cli.command, Command::Install));
    }

    #[test]
    fn cli_parses_hook_post_build() {
        let cli = Cli::parse_from(["ota-image-hook", "hook", "post-build"]);
        assert!(matches!(
            cli.command,
            Command::Hook {
                hook_command: HookCommand::PostBuild {
                    fail_on_error: false
                }
            }
        ));
    }

    #[test]
    fn cli_parses_hook_post_build_fail_on_error() {
        let cli = Cli::parse_from(["ota-image-hook", "hook", "post-build", "--fail-on-error"]);
        assert!(matches!(
            cli.command,
            Command::Hook {
                hook_command: HookCommand::PostBuild {
                    fail_on_error: true
                }
            }
        ));
    }

    #[test]
    fn cli_parses_run_with_dirs() {
        let cli = Cli::parse_from([
            "ota-image-hook",
            "run",
            "--build-dir",
            "/out",
            "--project-dir",
            "/proj",
        ]);
        match cli.command {
            Command::Run {
                build_dir,
                project_dir,
            } => {
                assert_eq!(build_dir, PathBuf::from("/out"));
                assert_eq!(project_dir, PathBuf::from("/proj"));
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_requires_run_dirs() {
        assert!(Cli::try_parse_from(["ota-image-hook", "run"]).is_err());
    }

    #[test]
    fn cli_parses_uninstall() {
        let cli = Cli::parse_from(["ota-image-hook", "uninstall"]);
        assert!(matches!(cli.command, Command::Uninstall));
    }

    #[test]
    fn cli_parses_status() {
        let cli = Cli::parse_from(["ota-image-hook", "status"]);
        assert!(matches!(cli.command, Command::Status));
    }

    // -----------------------------------------------------------------------
    // Install / uninstall
    // -----------------------------------------------------------------------

    #[test]
    fn install_writes_shim_with_marker() {
        let project = TempDir::new().unwrap();
        run_install_inner(Some(project.path())).unwrap();

        let shim = std::fs::read_to_string(project.path().join(SHIM_FILE_NAME)).unwrap();
        assert!(shim.contains(SHIM_MARKER));
        assert!(shim.contains("AddPostAction"));
        assert!(shim.contains("hook post-build"));
    }

    #[test]
    fn install_is_idempotent() {
        let project = TempDir::new().unwrap();
        run_install_inner(Some(project.path())).unwrap();
        run_install_inner(Some(project.path())).unwrap();

        // Updating our own shim must not create a backup file.
        assert!(!project.path().join(SHIM_BACKUP_FILE_NAME).exists());
        assert!(project.path().join(SHIM_FILE_NAME).exists());
    }

    #[test]
    fn install_backs_up_foreign_shim() {
        let project = TempDir::new().unwrap();
        let shim_path = project.path().join(SHIM_FILE_NAME);
        std::fs::write(&shim_path, "# my own extra script\n").unwrap();

        run_install_inner(Some(project.path())).unwrap();

        let backup = std::fs::read_to_string(project.path().join(SHIM_BACKUP_FILE_NAME)).unwrap();
        assert_eq!(backup, "# my own extra script\n");
        let shim = std::fs::read_to_string(&shim_path).unwrap();
        assert!(shim.contains(SHIM_MARKER));
    }

    #[test]
    fn uninstall_removes_shim_and_config() {
        let project = TempDir::new().unwrap();
        run_install_inner(Some(project.path())).unwrap();
        HookConfig::default().save(project.path()).unwrap();

        run_uninstall_inner(Some(project.path())).unwrap();

        assert!(!project.path().join(SHIM_FILE_NAME).exists());
        assert!(!HookConfig::config_path(project.path()).exists());
    }

    #[test]
    fn uninstall_leaves_foreign_shim() {
        let project = TempDir::new().unwrap();
        let shim_path = project.path().join(SHIM_FILE_NAME);
        std::fs::write(&shim_path, "# my own extra script\n").unwrap();

        run_uninstall_inner(Some(project.path())).unwrap();

        assert!(shim_path.exists());
    }

    #[test]
    fn uninstall_without_install_is_ok() {
        let project = TempDir::new().unwrap();
        run_uninstall_inner(Some(project.path())).unwrap();
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    #[test]
    #[serial]
    fn status_reports_fresh_project() {
        let project = TempDir::new().unwrap();
        let original_build_dir = std::env::var(artifact::BUILD_DIR_ENV_VAR).ok();
        unsafe { std::env::remove_var(artifact::BUILD_DIR_ENV_VAR) };

        let mut buf = Vec::new();
        run_status_inner(&mut buf, project.path()).unwrap();

        if let Some(v) = original_build_dir {
            unsafe { std::env::set_var(artifact::BUILD_DIR_ENV_VAR, v) };
        }

        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("Shim: not installed"), "got: {output}");
        assert!(output.contains("platformio.ini: missing"), "got: {output}");
        assert!(output.contains("Config: (defaults)"), "got: {output}");
        assert!(output.contains("Firmware image: firmware.bin"), "got: {output}");
        assert!(output.contains("not yet built"), "got: {output}");
        assert!(output.contains("Policy: best-effort"), "got: {output}");
        assert!(output.contains("BUILD_DIR: (not set)"), "got: {output}");
    }

    #[test]
    #[serial]
    fn status_reports_installed_hook() {
        let project = TempDir::new().unwrap();
        std::fs::write(project.path().join("platformio.ini"), "[env:esp32dev]\n").unwrap();
        run_install_inner(Some(project.path())).unwrap();
        HookConfig {
            fail_on_error: Some(true),
            ..Default::default()
        }
        .save(project.path())
        .unwrap();

        let original_build_dir = std::env::var(artifact::BUILD_DIR_ENV_VAR).ok();
        unsafe { std::env::remove_var(artifact::BUILD_DIR_ENV_VAR) };
        let original_policy = std::env::var(ota_image_hook::config::FAIL_ON_ERROR_ENV_VAR).ok();
        unsafe { std::env::remove_var(ota_image_hook::config::FAIL_ON_ERROR_ENV_VAR) };

        let mut buf = Vec::new();
        run_status_inner(&mut buf, project.path()).unwrap();

        if let Some(v) = original_build_dir {
            unsafe { std::env::set_var(artifact::BUILD_DIR_ENV_VAR, v) };
        }
        if let Some(v) = original_policy {
            unsafe { std::env::set_var(ota_image_hook::config::FAIL_ON_ERROR_ENV_VAR, v) };
        }

        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("platformio.ini: present"), "got: {output}");
        assert!(output.contains("Shim: installed"), "got: {output}");
        assert!(output.contains("Config: present"), "got: {output}");
        assert!(output.contains("Policy: fail-on-error"), "got: {output}");
    }

    // -----------------------------------------------------------------------
    // Run (explicit paths)
    // -----------------------------------------------------------------------

    #[test]
    fn run_copy_duplicates_artifact() {
        let build = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(build.path().join("firmware.bin"), b"\xDE\xAD\xBE\xEF").unwrap();

        run_copy(build.path(), project.path()).unwrap();

        let copied = std::fs::read(project.path().join("firmware_ota.bin")).unwrap();
        assert_eq!(copied, b"\xDE\xAD\xBE\xEF");
    }

    #[test]
    fn run_copy_missing_source_errors() {
        let build = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        let result = run_copy(build.path(), project.path());
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("primary artifact not found")
        );
        assert!(!project.path().join("firmware_ota.bin").exists());
    }

    #[test]
    fn run_copy_honors_configured_names() {
        let build = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        HookConfig {
            firmware_name: Some("app.bin".to_string()),
            ota_name: Some("app_ota.bin".to_string()),
            ..Default::default()
        }
        .save(project.path())
        .unwrap();
        std::fs::write(build.path().join("app.bin"), b"image").unwrap();

        run_copy(build.path(), project.path()).unwrap();

        assert!(project.path().join("app_ota.bin").exists());
    }

    // -----------------------------------------------------------------------
    // Hook entry point
    // -----------------------------------------------------------------------

    /// Helper: run the hook with BUILD_DIR/PROJECT_DIR pointed at the given
    /// directories, restoring the environment afterwards.
    fn with_hook_env<F: FnOnce() -> Result<()>>(
        build_dir: Option<&Path>,
        project_dir: Option<&Path>,
        f: F,
    ) -> Result<()> {
        let original_build = std::env::var(artifact::BUILD_DIR_ENV_VAR).ok();
        let original_project = std::env::var(artifact::PROJECT_DIR_ENV_VAR).ok();

        unsafe {
            match build_dir {
                Some(d) => std::env::set_var(artifact::BUILD_DIR_ENV_VAR, d),
                None => std::env::remove_var(artifact::BUILD_DIR_ENV_VAR),
            }
            match project_dir {
                Some(d) => std::env::set_var(artifact::PROJECT_DIR_ENV_VAR, d),
                None => std::env::remove_var(artifact::PROJECT_DIR_ENV_VAR),
            }
        }

        let result = f();

        unsafe {
            match original_build {
                Some(v) => std::env::set_var(artifact::BUILD_DIR_ENV_VAR, v),
                None => std::env::remove_var(artifact::BUILD_DIR_ENV_VAR),
            }
            match original_project {
                Some(v) => std::env::set_var(artifact::PROJECT_DIR_ENV_VAR, v),
                None => std::env::remove_var(artifact::PROJECT_DIR_ENV_VAR),
            }
        }

        result
    }

    #[test]
    #[serial]
    fn hook_copies_artifact() {
        let build = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(build.path().join("firmware.bin"), b"\xDE\xAD\xBE\xEF").unwrap();

        with_hook_env(Some(build.path()), Some(project.path()), || {
            run_hook_post_build(false)
        })
        .unwrap();

        let copied = std::fs::read(project.path().join("firmware_ota.bin")).unwrap();
        assert_eq!(copied, b"\xDE\xAD\xBE\xEF");
    }

    #[test]
    #[serial]
    fn hook_best_effort_never_fails() {
        // No env vars, no project, no artifact: the default policy still
        // exits cleanly so the build is not blocked.
        let result = with_hook_env(None, None, || run_hook_post_build(false));
        assert!(result.is_ok());
    }

    #[test]
    #[serial]
    fn hook_best_effort_missing_source_is_ok() {
        let build = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        let result = with_hook_env(Some(build.path()), Some(project.path()), || {
            run_hook_post_build(false)
        });
        assert!(result.is_ok());
        assert!(!project.path().join("firmware_ota.bin").exists());
    }

    #[test]
    #[serial]
    fn hook_strict_flag_fails_on_missing_source() {
        let build = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        let result = with_hook_env(Some(build.path()), Some(project.path()), || {
            run_hook_post_build(true)
        });
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn hook_strict_config_fails_on_missing_source() {
        let build = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        HookConfig {
            fail_on_error: Some(true),
            ..Default::default()
        }
        .save(project.path())
        .unwrap();

        let result = with_hook_env(Some(build.path()), Some(project.path()), || {
            run_hook_post_build(false)
        });
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn hook_strict_missing_env_fails_only_with_flag() {
        // Without PROJECT_DIR the config (and its policy) cannot be loaded;
        // the CLI flag alone decides.
        let result = with_hook_env(None, None, || run_hook_post_build(true));
        assert!(result.is_err());

        let result = with_hook_env(None, None, || run_hook_post_build(false));
        assert!(result.is_ok());
    }
}
