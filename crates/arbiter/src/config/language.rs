//! Per-language compile and run configuration.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;
use crate::types::{MountConfig, ResourceLimits};

/// PATH given to sandboxed processes unless a language overrides it.
pub const DEFAULT_SANDBOX_PATH: &str = "/usr/bin:/bin";

/// One supported language: how to name its source file, how to compile it
/// (if at all), and how to run it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Display name, e.g. "C++ 17 (GCC)"
    pub name: String,

    /// Source file extension, without the dot
    pub extension: FileExtension,

    /// Compile step; absent for interpreted languages
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Run step
    pub run: RunConfig,
}

impl Language {
    /// Whether this language has a compile step.
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Name of the source file inside the sandbox.
    pub fn source_name(&self) -> String {
        match self.compile {
            Some(ref compile) => compile.source_name.clone(),
            None => format!("main.{}", self.extension),
        }
    }

    /// Substitute `{source}`, `{output}` and `{binary}` placeholders in a
    /// command template.
    pub fn expand_command(template: &[String], source: &str, binary: &str) -> Vec<String> {
        template
            .iter()
            .map(|arg| {
                arg.replace("{source}", source)
                    .replace("{output}", binary)
                    .replace("{binary}", binary)
            })
            .collect()
    }
}

/// File extension without the dot, e.g. `cpp`.
///
/// Rejects `/` and `.` so a config value can never smuggle path components
/// into the sandbox file name.
#[derive(Debug, Clone, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        if extension.contains(['/', '.']) {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compile-step configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command template; `{source}` and `{output}` are substituted
    pub command: Vec<String>,

    /// Source file name in the sandbox, e.g. "main.cpp"
    pub source_name: String,

    /// Produced binary name, e.g. "main"
    pub output_name: String,

    /// Extra environment for the compiler
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Per-language compile limit overrides
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

/// Run-step configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command template; `{source}` and `{binary}` are substituted
    pub command: Vec<String>,

    /// Extra files staged into the sandbox before running, e.g. a driver
    /// script that loads the submission and calls its entry point
    #[serde(default)]
    pub extra_files: Vec<ExtraFile>,

    /// Extra environment for the program
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Extra mounts this language needs (e.g. a runtime prefix)
    #[serde(default)]
    pub mounts: Vec<MountConfig>,

    /// PATH inside the sandbox
    #[serde(default = "default_sandbox_path")]
    pub path: String,

    /// Per-language run limit overrides
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

/// A file staged next to the submission, defined inline in the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraFile {
    /// File name inside the sandbox
    pub name: String,

    /// Literal file content
    pub content: String,
}

fn default_sandbox_path() -> String {
    DEFAULT_SANDBOX_PATH.to_owned()
}
