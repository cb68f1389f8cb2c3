//! Toolchain configuration.

use std::time::Duration;

/// Container runtime binary.
pub const DEFAULT_DOCKER_BIN: &str = "docker";

/// Image carrying the symbolic execution toolchain.
pub const DEFAULT_DOCKER_IMAGE: &str = "sebymiano/pix-klee:latest";

/// Script inside the image that produces test vectors.
pub const DEFAULT_GENERATE_SCRIPT: &str = "generate-test-cases.sh";

/// `make` target building the original, uninstrumented object.
pub const DEFAULT_MAKE_TARGET: &str = "build-original";

/// File name pattern of the compiled object inside a program directory.
pub const DEFAULT_OBJECT_PATTERN: &str = "*.bpf.o";

/// Timeout of each container or build step in seconds; `0` disables it.
pub const DEFAULT_TOOLCHAIN_TIMEOUT_SEC: u64 = 3600;

/// Settings shared by the generator and the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    pub docker_bin: String,
    pub docker_image: String,
    pub generate_script: String,
    pub make_bin: String,
    pub make_target: String,
    pub object_pattern: String,
    pub timeout_sec: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            docker_bin: DEFAULT_DOCKER_BIN.to_string(),
            docker_image: DEFAULT_DOCKER_IMAGE.to_string(),
            generate_script: DEFAULT_GENERATE_SCRIPT.to_string(),
            make_bin: "make".to_string(),
            make_target: DEFAULT_MAKE_TARGET.to_string(),
            object_pattern: DEFAULT_OBJECT_PATTERN.to_string(),
            timeout_sec: DEFAULT_TOOLCHAIN_TIMEOUT_SEC,
        }
    }
}

impl ToolchainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_docker_bin(mut self, bin: impl Into<String>) -> Self {
        self.docker_bin = bin.into();
        self
    }

    pub fn with_docker_image(mut self, image: impl Into<String>) -> Self {
        self.docker_image = image.into();
        self
    }

    pub fn with_make_target(mut self, target: impl Into<String>) -> Self {
        self.make_target = target.into();
        self
    }

    pub fn with_object_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.object_pattern = pattern.into();
        self
    }

    pub fn with_timeout(mut self, timeout_sec: u64) -> Self {
        self.timeout_sec = timeout_sec;
        self
    }

    /// `None` when the timeout is disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_sec > 0).then(|| Duration::from_secs(self.timeout_sec))
    }
}
