use serde::Deserialize;

/// Options for [`VolumeLoader`](crate::volume_loader::VolumeLoader).
///
/// Every field is optional in TOML:
///
/// ```toml
/// workers = 4
/// temporal_position = 2
/// recursive = true
/// extension = "dcm"
/// title = "CT chest"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Reader threads; 0 uses the available parallelism.
    pub workers: usize,
    /// Temporal position forced onto every slice of a batch.
    pub temporal_position: Option<i64>,
    /// Descend into subdirectories when loading a directory.
    pub recursive: bool,
    /// Only files with this extension (case-insensitive) are read.
    pub extension: Option<String>,
    /// Volume title; the directory name is used without one.
    pub title: Option<String>,
}

impl LoaderConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_temporal_position(mut self, temporal_position: i64) -> Self {
        self.temporal_position = Some(temporal_position);
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Thread count after resolving 0.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub(crate) fn accepts_extension(&self, path: &std::path::Path) -> bool {
        let Some(wanted) = &self.extension else {
            return true;
        };
        let wanted = wanted.trim_start_matches('.');
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn parses_partial_toml() {
        let config = LoaderConfig::from_toml_str(
            r#"
            workers = 3
            extension = ".DCM"
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.resolved_workers(), 3);
        assert!(!config.recursive);
        assert_eq!(config.temporal_position, None);
        assert!(config.accepts_extension(Path::new("a/b/image.dcm")));
        assert!(!config.accepts_extension(Path::new("a/b/image.png")));
        assert!(!config.accepts_extension(Path::new("a/b/DICOMDIR")));
    }

    #[test]
    fn empty_toml_is_default() {
        let config = LoaderConfig::from_toml_str("").unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert!(config.resolved_workers() >= 1);
        assert!(config.accepts_extension(Path::new("IM0001")));
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(LoaderConfig::from_toml_str("workers = \"many\"").is_err());
    }

    #[test]
    fn builder() {
        let config = LoaderConfig::default()
            .with_workers(2)
            .with_temporal_position(5)
            .with_recursive(true)
            .with_extension("dcm")
            .with_title("study");
        assert_eq!(config.temporal_position, Some(5));
        assert_eq!(config.title.as_deref(), Some("study"));
        assert!(config.recursive);
    }
}
