use serde::Deserialize;

/// Archive ingestion settings.
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Extension (without the dot) marking level files. Default: "level".
    #[serde(default = "default_level_extension")]
    pub level_extension: String,
    /// Extension (without the dot) marking companion generator scripts. Default: "levelgen".
    #[serde(default = "default_levelgen_extension")]
    pub levelgen_extension: String,
    /// Directory names that mark platform artifacts rather than user content.
    /// Default: ["__MACOSX"].
    #[serde(default = "default_metadata_dirs")]
    pub metadata_dirs: Vec<String>,
    /// Maximum decompressed size of a single archive entry in bytes. Default: 16 MiB.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Maximum decompressed size of a whole archive in bytes. Default: 256 MiB.
    #[serde(default = "default_max_total_size")]
    pub max_total_size: u64,
}

fn default_level_extension() -> String {
    "level".into()
}
fn default_levelgen_extension() -> String {
    "levelgen".into()
}
fn default_metadata_dirs() -> Vec<String> {
    vec!["__MACOSX".into()]
}
fn default_max_file_size() -> u64 {
    16 * 1024 * 1024
}
fn default_max_total_size() -> u64 {
    256 * 1024 * 1024
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            level_extension: default_level_extension(),
            levelgen_extension: default_levelgen_extension(),
            metadata_dirs: default_metadata_dirs(),
            max_file_size: default_max_file_size(),
            max_total_size: default_max_total_size(),
        }
    }
}

impl IngestConfig {
    /// Returns `true` if `name` is one of the reserved platform-artifact directories.
    pub fn is_metadata_dir(&self, name: &str) -> bool {
        self.metadata_dirs.iter().any(|d| d == name)
    }
}
