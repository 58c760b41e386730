//! Canonical architecture tags
//!
//! Docker endpoints report CPU architectures with vendor-specific names. Image tags use
//! one short canonical name per architecture family.

use crate::error::{FleetError, Result};

/// Reported architecture name → canonical tag
pub const CANONICAL_ARCH: &[(&str, &str)] = &[
    ("arm", "arm32v7"),
    ("arm32v7", "arm32v7"),
    ("armv7l", "arm32v7"),
    ("armhf", "arm32v7"),
    ("x64", "amd64"),
    ("x86_64", "amd64"),
    ("amd64", "amd64"),
    ("Intel 64", "amd64"),
    ("arm64", "arm64v8"),
    ("arm64v8", "arm64v8"),
    ("armv8", "arm64v8"),
    ("aarch64", "arm64v8"),
];

pub fn canonical_arch(reported: &str) -> Option<&'static str> {
    CANONICAL_ARCH
        .iter()
        .find(|(name, _)| *name == reported)
        .map(|(_, canonical)| *canonical)
}

pub fn require_canonical_arch(reported: &str) -> Result<&'static str> {
    canonical_arch(reported).ok_or_else(|| FleetError::UnsupportedArchitecture(reported.to_string()))
}
