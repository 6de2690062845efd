use semver::Version;

pub fn get_version() -> String {
    let semver = env!("CARGO_PKG_VERSION").parse::<Version>();

    match semver {
        // vergen falls back to this placeholder when git metadata isn't available (e.g. in CI).
        Ok(semver) if env!("VERGEN_GIT_SHA") == "VERGEN_IDEMPOTENT_OUTPUT" => semver.to_string(),
        Ok(semver) => format!(
            "{} [[`{}`](https://github.com/j1nxie/quotebook/commit/{})]",
            semver,
            env!("VERGEN_GIT_SHA"),
            env!("VERGEN_GIT_SHA")
        ),
        Err(_) => {
            tracing::warn!("couldn't parse a semver out of Cargo.toml? defaulting to 0.0.0-unknown.");
            String::from("0.0.0-unknown")
        }
    }
}
