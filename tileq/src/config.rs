//! Settings read from the environment.
//!
//! For each format prefix (`DTED`, `ADRG`, `FLOAT_GRID`, `LAND_USE`,
//! `GEOTIFF`, `BATHYMETRY`):
//!
//! - `<PREFIX>_TILE_CACHE_SIZE`: idle tiles to keep, negative for no
//!   limit.
//! - `<PREFIX>_TILE_CACHE_BYTES`: sample byte budget. Wins over the
//!   size when both are set.
//!
//! `DTED_CHECKSUM=0` disables DTED checksum validation.

use anyhow::{anyhow, bail, Context, Result};
use geotiles::{EvictionPolicy, Format};

/// Reads a variable from the process environment.
pub fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Eviction policy for `format`, falling back to the format's default.
pub fn cache_policy(format: Format, lookup: impl Fn(&str) -> Option<String>) -> Result<EvictionPolicy> {
    let prefix = format.env_prefix();

    let bytes_var = format!("{prefix}_TILE_CACHE_BYTES");
    if let Some(value) = lookup(&bytes_var) {
        let bytes = value
            .trim()
            .parse()
            .with_context(|| format!("{bytes_var}={value}"))?;
        return Ok(EvictionPolicy::MaxBytes(bytes));
    }

    let size_var = format!("{prefix}_TILE_CACHE_SIZE");
    if let Some(value) = lookup(&size_var) {
        let size: i64 = value
            .trim()
            .parse()
            .with_context(|| format!("{size_var}={value}"))?;
        return Ok(match usize::try_from(size) {
            Ok(keep) => EvictionPolicy::KeepInactive(keep),
            Err(_) => EvictionPolicy::Unbounded,
        });
    }

    Ok(format.default_policy())
}

/// Whether DTED checksums are validated. On unless `DTED_CHECKSUM=0`.
pub fn dted_checksum(lookup: impl Fn(&str) -> Option<String>) -> Result<bool> {
    match lookup("DTED_CHECKSUM").as_deref().map(str::trim) {
        None | Some("1") => Ok(true),
        Some("0") => Ok(false),
        Some(other) => Err(anyhow!("DTED_CHECKSUM must be 0 or 1, got {other}")),
    }
}

/// Fails on variables that look like cache settings but name no
/// format, e.g. `DTE_TILE_CACHE_SIZE`.
pub fn check_unknown(vars: impl IntoIterator<Item = String>) -> Result<()> {
    for var in vars {
        let Some(prefix) = var
            .strip_suffix("_TILE_CACHE_SIZE")
            .or_else(|| var.strip_suffix("_TILE_CACHE_BYTES"))
        else {
            continue;
        };
        if !Format::ALL.iter().any(|format| format.env_prefix() == prefix) {
            bail!("{var} names no tile format");
        }
    }
    Ok(())
}
