//! Command: print version information.

/// The version string: `JSH_VERSION` from the build, else the crate version.
#[must_use]
pub const fn version() -> &'static str {
    match option_env!("JSH_VERSION") {
        Some(version) => version,
        None => env!("CARGO_PKG_VERSION"),
    }
}

/// Print the jsh version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("jsh {}", version());
}
