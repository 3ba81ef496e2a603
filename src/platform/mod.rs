// src/platform/mod.rs
//! Platform descriptors: OS release, architecture set and compiler
//!
//! A descriptor is built once per resolution, either from the host or from an
//! override string such as `mountain_lion is: x86_64 i386 cc: clang`. The
//! order of the architectures is significant: the first one is the primary
//! architecture, and multi-architecture merge steps refer to the first and
//! last entries.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

/// Operating system releases, oldest first
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum OsVersion {
    #[strum(serialize = "tiger")]
    #[serde(rename = "tiger")]
    Tiger,
    #[strum(serialize = "leopard")]
    #[serde(rename = "leopard")]
    Leopard,
    #[strum(serialize = "snow_leopard")]
    #[serde(rename = "snow_leopard")]
    SnowLeopard,
    #[strum(serialize = "lion")]
    #[serde(rename = "lion")]
    Lion,
    #[strum(serialize = "mountain_lion")]
    #[serde(rename = "mountain_lion")]
    MountainLion,
    #[strum(serialize = "mavericks")]
    #[serde(rename = "mavericks")]
    Mavericks,
    #[strum(serialize = "yosemite")]
    #[serde(rename = "yosemite")]
    Yosemite,
}

impl OsVersion {
    /// Map a `10.x` product version to a release
    ///
    /// Releases newer than the newest known one map to the newest known one.
    pub fn from_product_version(version: &str) -> Option<Self> {
        let mut parts = version.trim().split('.');
        let major: u32 = parts.next()?.parse().ok()?;
        let minor: u32 = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);

        if major != 10 {
            return (major > 10).then_some(Self::Yosemite);
        }

        match minor {
            0..=3 => None,
            4 => Some(Self::Tiger),
            5 => Some(Self::Leopard),
            6 => Some(Self::SnowLeopard),
            7 => Some(Self::Lion),
            8 => Some(Self::MountainLion),
            9 => Some(Self::Mavericks),
            _ => Some(Self::Yosemite),
        }
    }

    /// Compiler shipped with the developer tools of this release
    pub fn default_compiler(&self) -> CompilerId {
        match self {
            Self::Tiger => CompilerId::Gcc40,
            Self::Leopard | Self::SnowLeopard => CompilerId::Gcc42,
            _ => CompilerId::Clang,
        }
    }
}

/// CPU architectures a formula can target
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum Arch {
    #[strum(serialize = "x86_64")]
    #[serde(rename = "x86_64")]
    X86_64,
    #[strum(serialize = "i386")]
    #[serde(rename = "i386")]
    I386,
    #[strum(serialize = "ppc")]
    #[serde(rename = "ppc")]
    Ppc,
    #[strum(serialize = "ppc64")]
    #[serde(rename = "ppc64")]
    Ppc64,
}

impl Arch {
    pub fn is_64_bit(&self) -> bool {
        matches!(self, Self::X86_64 | Self::Ppc64)
    }

    /// Map a Rust target architecture name (`std::env::consts::ARCH`)
    pub fn from_host(name: &str) -> Option<Self> {
        match name {
            "x86_64" => Some(Self::X86_64),
            "x86" => Some(Self::I386),
            "powerpc" => Some(Self::Ppc),
            "powerpc64" => Some(Self::Ppc64),
            _ => None,
        }
    }
}

/// Compiler toolchains, in fallback preference order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum CompilerId {
    #[strum(serialize = "clang")]
    #[serde(rename = "clang")]
    Clang,
    #[strum(serialize = "gcc_4_2")]
    #[serde(rename = "gcc_4_2")]
    Gcc42,
    #[strum(serialize = "llvm_gcc")]
    #[serde(rename = "llvm_gcc")]
    LlvmGcc,
    #[strum(serialize = "gcc_4_0")]
    #[serde(rename = "gcc_4_0")]
    Gcc40,
}

impl CompilerId {
    /// C compiler command
    pub fn cc(&self) -> &'static str {
        match self {
            Self::Clang => "clang",
            Self::Gcc42 => "gcc-4.2",
            Self::LlvmGcc => "llvm-gcc-4.2",
            Self::Gcc40 => "gcc-4.0",
        }
    }

    /// C++ compiler command
    pub fn cxx(&self) -> &'static str {
        match self {
            Self::Clang => "clang++",
            Self::Gcc42 => "g++-4.2",
            Self::LlvmGcc => "llvm-g++-4.2",
            Self::Gcc40 => "g++-4.0",
        }
    }

    /// Pick the compiler for a build
    ///
    /// Keeps `preferred` unless the formula is known to fail with it, then
    /// walks the fallback order and takes the first compiler not in
    /// `fails_with`.
    pub fn select(preferred: CompilerId, fails_with: &[CompilerId]) -> Result<CompilerId> {
        if !fails_with.contains(&preferred) {
            return Ok(preferred);
        }

        let fallback = CompilerId::iter()
            .find(|c| !fails_with.contains(c))
            .ok_or_else(|| {
                Error::UnsupportedPlatform("formula fails with every known compiler".to_string())
            })?;

        debug!("Compiler {} is known to fail, using {}", preferred, fallback);
        Ok(fallback)
    }
}

/// Immutable description of the platform a plan is resolved for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformDescriptor {
    os_version: OsVersion,
    architectures: Vec<Arch>,
    compiler: CompilerId,
}

impl PlatformDescriptor {
    /// Create a descriptor, validating the architecture list
    pub fn new(os_version: OsVersion, architectures: Vec<Arch>, compiler: CompilerId) -> Result<Self> {
        if architectures.is_empty() {
            return Err(Error::ParseError(
                "Platform needs at least one architecture".to_string(),
            ));
        }

        for (i, arch) in architectures.iter().enumerate() {
            if architectures[..i].contains(arch) {
                return Err(Error::ParseError(format!(
                    "Architecture {} listed more than once",
                    arch
                )));
            }
        }

        Ok(Self {
            os_version,
            architectures,
            compiler,
        })
    }

    /// Parse an override such as `mavericks is: x86_64 i386 cc: gcc_4_2`
    ///
    /// The compiler is optional and defaults to the one the release ships.
    pub fn from_override(spec: &str) -> Result<Self> {
        let normalized = spec.replace("is:", " is: ").replace("cc:", " cc: ");
        let mut tokens = normalized.split_whitespace().peekable();

        let os_token = tokens
            .next()
            .ok_or_else(|| Error::ParseError("Empty platform specification".to_string()))?;
        let os_version = OsVersion::from_str(os_token)
            .map_err(|_| Error::ParseError(format!("Unknown OS version '{}'", os_token)))?;

        if tokens.next() != Some("is:") {
            return Err(Error::ParseError(format!(
                "Expected 'is:' after OS version in '{}'",
                spec.trim()
            )));
        }

        let mut architectures = Vec::new();
        while let Some(token) = tokens.next_if(|t| *t != "cc:") {
            let arch = Arch::from_str(token)
                .map_err(|_| Error::ParseError(format!("Unknown architecture '{}'", token)))?;
            architectures.push(arch);
        }

        let compiler = match tokens.next() {
            Some(_) => {
                let name = tokens.next().ok_or_else(|| {
                    Error::ParseError("Missing compiler after 'cc:'".to_string())
                })?;
                CompilerId::from_str(name)
                    .map_err(|_| Error::ParseError(format!("Unknown compiler '{}'", name)))?
            }
            None => os_version.default_compiler(),
        };

        if let Some(extra) = tokens.next() {
            return Err(Error::ParseError(format!(
                "Unexpected '{}' in platform specification",
                extra
            )));
        }

        Self::new(os_version, architectures, compiler)
    }

    /// Detect the host platform
    ///
    /// Only hosts running a known release can be detected; anything else
    /// needs an explicit override.
    pub fn detect() -> Result<Self> {
        let arch = Arch::from_host(std::env::consts::ARCH).ok_or_else(|| {
            Error::UnsupportedPlatform(format!(
                "host architecture {} is not a formula target",
                std::env::consts::ARCH
            ))
        })?;

        if std::env::consts::OS != "macos" {
            return Err(Error::UnsupportedPlatform(format!(
                "host OS {} cannot be detected; pass an explicit platform",
                std::env::consts::OS
            )));
        }

        let output = std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()?;
        let product = String::from_utf8_lossy(&output.stdout);
        let os_version = OsVersion::from_product_version(&product).ok_or_else(|| {
            Error::UnsupportedPlatform(format!("unknown OS release {}", product.trim()))
        })?;

        debug!("Detected host platform {} {}", os_version, arch);
        Self::new(os_version, vec![arch], os_version.default_compiler())
    }

    pub fn os_version(&self) -> OsVersion {
        self.os_version
    }

    pub fn architectures(&self) -> &[Arch] {
        &self.architectures
    }

    pub fn compiler(&self) -> CompilerId {
        self.compiler
    }

    /// The architecture used for single-arch output naming
    pub fn primary(&self) -> Arch {
        self.architectures[0]
    }

    pub fn is_multi_arch(&self) -> bool {
        self.architectures.len() > 1
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let archs: Vec<String> = self.architectures.iter().map(|a| a.to_string()).collect();
        write!(
            f,
            "{} is: {} cc: {}",
            self.os_version,
            archs.join(" "),
            self.compiler
        )
    }
}

impl FromStr for PlatformDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_override(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_versions_are_ordered() {
        assert!(OsVersion::Tiger < OsVersion::Leopard);
        assert!(OsVersion::Leopard < OsVersion::SnowLeopard);
        assert!(OsVersion::MountainLion < OsVersion::Yosemite);
    }

    #[test]
    fn test_os_version_names() {
        assert_eq!(OsVersion::SnowLeopard.to_string(), "snow_leopard");
        assert_eq!(
            OsVersion::from_str("mountain_lion").unwrap(),
            OsVersion::MountainLion
        );
        assert!(OsVersion::from_str("catalina").is_err());
    }

    #[test]
    fn test_product_version_mapping() {
        assert_eq!(
            OsVersion::from_product_version("10.8.5"),
            Some(OsVersion::MountainLion)
        );
        assert_eq!(OsVersion::from_product_version("10.4"), Some(OsVersion::Tiger));
        assert_eq!(OsVersion::from_product_version("10.13.6"), Some(OsVersion::Yosemite));
        assert_eq!(OsVersion::from_product_version("10.2"), None);
        assert_eq!(OsVersion::from_product_version("garbage"), None);
    }

    #[test]
    fn test_parse_override_keeps_arch_order() {
        let platform = PlatformDescriptor::from_override("mavericks is: i386 x86_64").unwrap();
        assert_eq!(platform.architectures(), &[Arch::I386, Arch::X86_64]);
        assert_eq!(platform.primary(), Arch::I386);
        assert!(platform.is_multi_arch());
    }

    #[test]
    fn test_parse_override_default_compiler() {
        let platform = PlatformDescriptor::from_override("tiger is: ppc").unwrap();
        assert_eq!(platform.compiler(), CompilerId::Gcc40);

        let platform = PlatformDescriptor::from_override("yosemite is: x86_64").unwrap();
        assert_eq!(platform.compiler(), CompilerId::Clang);
    }

    #[test]
    fn test_parse_override_explicit_compiler() {
        let platform =
            PlatformDescriptor::from_override("leopard is: ppc ppc64 cc: llvm_gcc").unwrap();
        assert_eq!(platform.compiler(), CompilerId::LlvmGcc);
        assert_eq!(platform.architectures(), &[Arch::Ppc, Arch::Ppc64]);
    }

    #[test]
    fn test_parse_override_glued_markers() {
        let platform = PlatformDescriptor::from_override("lion is:x86_64 cc:gcc_4_2").unwrap();
        assert_eq!(platform.primary(), Arch::X86_64);
        assert_eq!(platform.compiler(), CompilerId::Gcc42);
    }

    #[test]
    fn test_parse_override_errors() {
        assert!(PlatformDescriptor::from_override("").is_err());
        assert!(PlatformDescriptor::from_override("lion").is_err());
        assert!(PlatformDescriptor::from_override("lion is:").is_err());
        assert!(PlatformDescriptor::from_override("lion is: arm64").is_err());
        assert!(PlatformDescriptor::from_override("lion is: x86_64 x86_64").is_err());
        assert!(PlatformDescriptor::from_override("lion is: x86_64 cc:").is_err());
        assert!(PlatformDescriptor::from_override("lion is: x86_64 cc: icc").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let platform =
            PlatformDescriptor::from_override("snow_leopard is: x86_64 i386 cc: clang").unwrap();
        let reparsed: PlatformDescriptor = platform.to_string().parse().unwrap();
        assert_eq!(platform, reparsed);
    }

    #[test]
    fn test_compiler_selection_keeps_preferred() {
        let selected = CompilerId::select(CompilerId::Clang, &[CompilerId::LlvmGcc]).unwrap();
        assert_eq!(selected, CompilerId::Clang);
    }

    #[test]
    fn test_compiler_selection_falls_back() {
        let selected = CompilerId::select(CompilerId::LlvmGcc, &[CompilerId::LlvmGcc]).unwrap();
        assert_eq!(selected, CompilerId::Clang);

        let selected =
            CompilerId::select(CompilerId::Clang, &[CompilerId::Clang, CompilerId::Gcc42])
                .unwrap();
        assert_eq!(selected, CompilerId::LlvmGcc);
    }

    #[test]
    fn test_compiler_selection_exhausted() {
        let all: Vec<CompilerId> = CompilerId::iter().collect();
        let err = CompilerId::select(CompilerId::Clang, &all).unwrap_err();
        assert_eq!(err.category(), "unsupported-platform");
    }

    #[test]
    fn test_arch_from_host() {
        assert_eq!(Arch::from_host("x86_64"), Some(Arch::X86_64));
        assert_eq!(Arch::from_host("x86"), Some(Arch::I386));
        assert_eq!(Arch::from_host("aarch64"), None);
        assert!(Arch::Ppc64.is_64_bit());
        assert!(!Arch::I386.is_64_bit());
    }
}
