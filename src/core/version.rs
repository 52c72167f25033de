//! Build metadata and engine API version accessors.
//! The generated version.rs from the build script is included here so the
//! binary and the library share a single source of truth.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Parse the engine API version string from the build script into u32.
/// Falls back to a stable default if parsing fails.
pub fn engine_api_version() -> u32 {
    ENGINE_API_VERSION.parse().unwrap_or(20261019)
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line banner used by the binary's startup log
pub fn banner() -> String {
    format!(
        "scanmatrix {} (engine api {}, {} built {})",
        env!("CARGO_PKG_VERSION"),
        engine_api_version(),
        git_hash(),
        build_time()
    )
}
