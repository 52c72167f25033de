use chrono::Utc;
use std::env;
use std::fs::{metadata, File};
use std::io::Write;
use std::path::Path;

fn main() {
    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("version.rs");
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let cargo_toml_path = Path::new(&manifest_dir).join("Cargo.toml");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=.git/HEAD");

    // Skip regeneration while version.rs is newer than the manifest
    if dest_path.exists() {
        let generated = metadata(&dest_path).unwrap().modified().unwrap();
        let manifest = metadata(&cargo_toml_path).unwrap().modified().unwrap();
        if generated >= manifest {
            return;
        }
    }

    let engine_api_version = read_engine_api_version(&cargo_toml_path);
    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let git_hash = short_git_hash();

    let mut f = File::create(&dest_path).unwrap();
    #[allow(clippy::uninlined_format_args)]
    writeln!(
        &mut f,
        r###"pub const ENGINE_API_VERSION: &str = "{}";
pub const BUILD_TIME: &str = "{}";
pub const GIT_HASH: &str = "{}";"###,
        engine_api_version, build_time, git_hash
    )
    .unwrap();
}

/// `[package.metadata] engine_api_version`, or "unknown"
fn read_engine_api_version(cargo_toml_path: &Path) -> String {
    let Ok(content) = std::fs::read_to_string(cargo_toml_path) else {
        return "unknown".to_string();
    };
    content
        .parse::<toml::Table>()
        .ok()
        .and_then(|manifest| {
            manifest
                .get("package")?
                .get("metadata")?
                .get("engine_api_version")?
                .as_integer()
        })
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn short_git_hash() -> String {
    std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
