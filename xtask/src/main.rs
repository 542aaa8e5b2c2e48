use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "version_pruner_lambda";
const LAMBDA_BINARY: &str = "version_pruner";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the lambda version pruner workspace",
    long_about = "A unified CLI for CI checks and packaging the version pruner\n\
                  Lambda bootstrap artifact."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::All)]
        job: CiJob,
    },
    /// Build and package the pruner Lambda as a `bootstrap` zip
    Package {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory that receives the zip artifact
        #[arg(long, env = "PRUNER_DIST_DIR", default_value = "dist")]
        dist_dir: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Workspace tests
    Test,
    /// Run lint + test
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_pruner_lambda(target: &str, profile: BuildProfile, dist_dir: &Path) {
    ensure_rust_target_installed(target);
    ensure_c_linker_available(target);

    step("Build version pruner lambda binary");

    let mut cargo_args = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--target",
        target,
        "--bin",
        LAMBDA_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package lambda zip artifact");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    fs::create_dir_all(dist_dir).expect("failed to create lambda dist directory");

    let zip_path = dist_dir.join("version_pruner.zip");
    package_lambda_zip(
        &target_dir.join(binary_name(LAMBDA_BINARY, target)),
        &zip_path,
    );

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn ensure_rust_target_installed(target: &str) {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output();

    let output = match output {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- package`"
        );
    }
}

fn ensure_c_linker_available(target: &str) {
    if !cfg!(windows) || !target.ends_with("unknown-linux-gnu") {
        return;
    }

    let env_override_keys = [
        format!("CC_{}", target.replace('-', "_")),
        format!("CC_{target}"),
        "TARGET_CC".to_string(),
        "CC".to_string(),
    ];

    for key in env_override_keys {
        if let Ok(value) = std::env::var(&key) {
            let candidate = value.trim();
            if !candidate.is_empty() && tool_works(candidate) {
                return;
            }
        }
    }

    let canonical = "x86_64-linux-gnu-gcc";
    if tool_works(canonical) {
        return;
    }

    panic!(
        "missing C cross-linker for target `{target}`. install `{canonical}` (or set CC_x86_64_unknown_linux_gnu) before running `cargo run -p xtask -- package`."
    );
}

fn tool_works(program: &str) -> bool {
    let mut parts = program.split_whitespace();
    let Some(bin) = parts.next() else {
        return false;
    };
    let args: Vec<&str> = parts.collect();

    Command::new(bin)
        .args(&args)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

/// The provided.al2023 runtime executes the archive entry named `bootstrap`.
fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected lambda binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read lambda binary");
    let file = fs::File::create(zip_path).expect("failed to create lambda zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .expect("failed to start bootstrap entry in lambda zip");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish lambda zip");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_lint() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_test() {
    step("Test version_pruner_core");
    run_cargo(&["test", "-p", "version_pruner_core"]);

    step("Test version_pruner_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Lint => ci_lint(),
                CiJob::Test => ci_test(),
                CiJob::All => {
                    ci_lint();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::Package {
            target,
            profile,
            dist_dir,
        } => {
            package_pruner_lambda(&target, profile, &dist_dir);
        }
    }
}
