//! Recognised environment options.

/// Fallback for `MC_MAX_BUILDS` when unset, non-numeric or non-positive.
pub const DEFAULT_MAX_BUILDS: usize = 3;

/// Portal port when `PORTAL_HTTPS` is `"true"`.
pub const PORTAL_HTTPS_PORT: u16 = 9191;
/// Portal port otherwise.
pub const PORTAL_HTTP_PORT: u16 = 9090;

/// Global build concurrency cap, read from `MC_MAX_BUILDS`.
pub fn max_builds() -> usize {
    parse_max_builds(std::env::var("MC_MAX_BUILDS").ok().as_deref())
}

/// True when running under a cluster manager (`IN_K8`); the watcher
/// supervisor becomes a no-op there.
pub fn in_k8() -> bool {
    parse_truthy(std::env::var("IN_K8").ok().as_deref())
}

/// Port the project watcher reports changes to, selected by `PORTAL_HTTPS`.
pub fn portal_port() -> u16 {
    parse_portal_port(std::env::var("PORTAL_HTTPS").ok().as_deref())
}

fn parse_max_builds(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map_or(DEFAULT_MAX_BUILDS, |n| n as usize)
}

fn parse_truthy(raw: Option<&str>) -> bool {
    raw.is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn parse_portal_port(raw: Option<&str>) -> u16 {
    if raw == Some("true") {
        PORTAL_HTTPS_PORT
    } else {
        PORTAL_HTTP_PORT
    }
}
