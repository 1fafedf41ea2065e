//! Core types for Gantry

use serde::{Deserialize, Serialize};

/// The kind of build operation requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    /// Delete build outputs
    Clean,
    /// Run only source-generation tasks
    SourceGen,
    /// Compile classes without packaging
    Compile,
    /// Build distributable artifacts
    Assemble,
    /// Clean, then assemble
    Rebuild,
    /// Build an app bundle
    Bundle,
    /// Extract installable archives from a previously built bundle
    ArchiveFromBundle,
}

impl BuildMode {
    /// Returns the string representation of the build mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::SourceGen => "source-gen",
            Self::Compile => "compile",
            Self::Assemble => "assemble",
            Self::Rebuild => "rebuild",
            Self::Bundle => "bundle",
            Self::ArchiveFromBundle => "archive-from-bundle",
        }
    }

    /// Packaging modes build artifacts that implicitly contain other
    /// modules' outputs (dynamic features, tested modules).
    pub fn is_packaging(&self) -> bool {
        matches!(
            self,
            Self::Assemble | Self::Rebuild | Self::Bundle | Self::ArchiveFromBundle
        )
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clean" => Ok(Self::Clean),
            "source-gen" | "sources" => Ok(Self::SourceGen),
            "compile" => Ok(Self::Compile),
            "assemble" | "build" => Ok(Self::Assemble),
            "rebuild" => Ok(Self::Rebuild),
            "bundle" => Ok(Self::Bundle),
            "archive-from-bundle" => Ok(Self::ArchiveFromBundle),
            _ => Err(format!("Unknown build mode: {}", s)),
        }
    }
}

/// Which test compilation units are included in a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestScope {
    /// Main sources only
    None,
    /// Unit tests running on the host
    Unit,
    /// Instrumented tests running on a device
    Device,
    /// Both unit and device tests
    All,
}

impl TestScope {
    /// Whether unit-test artifacts are selected.
    ///
    /// `None` selects every test artifact: it is the scope used by
    /// clean / compile-everything operations.
    pub fn includes_unit(&self) -> bool {
        matches!(self, Self::None | Self::Unit | Self::All)
    }

    /// Whether device-test artifacts are selected.
    pub fn includes_device(&self) -> bool {
        matches!(self, Self::None | Self::Device | Self::All)
    }
}

impl std::fmt::Display for TestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Unit => "unit",
            Self::Device => "device",
            Self::All => "all",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TestScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "unit" => Ok(Self::Unit),
            "device" | "instrumented" => Ok(Self::Device),
            "all" => Ok(Self::All),
            _ => Err(format!("Unknown test scope: {}", s)),
        }
    }
}
