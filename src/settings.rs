use crate::error::Result;
use crate::service::SettingsSource;
use chrono::{DateTime, Local, Utc};
use ratatui::style::Color;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Timezone used when displaying timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    #[default]
    Local,
    Gmt,
}

impl Timezone {
    /// Format unix seconds as a wall-clock time
    pub fn format(self, unix_secs: i64) -> String {
        let Some(utc) = DateTime::<Utc>::from_timestamp(unix_secs, 0) else {
            return String::new();
        };
        match self {
            Timezone::Local => utc.with_timezone(&Local).format("%Y/%m/%d %H:%M:%S").to_string(),
            Timezone::Gmt => utc.format("%Y/%m/%d %H:%M:%SZ").to_string(),
        }
    }
}

/// Per-user display preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub timezone: Timezone,
    /// Chart colours, by name or `#rrggbb`
    #[serde(default)]
    pub palette: Vec<String>,
}

impl UserSettings {
    /// Parsed palette, or the default palette when none is usable
    pub fn palette(&self) -> Vec<Color> {
        let colors: Vec<Color> = self
            .palette
            .iter()
            .filter_map(|c| c.parse::<Color>().ok())
            .collect();
        if colors.is_empty() {
            default_palette()
        } else {
            colors
        }
    }
}

/// Dark-to-light primary shades followed by light-to-dark tertiary shades
pub fn default_palette() -> Vec<Color> {
    vec![
        Color::Rgb(0x4a, 0x1c, 0x7a),
        Color::Rgb(0x6b, 0x2d, 0xaa),
        Color::Rgb(0x93, 0x5c, 0xd4),
        Color::Rgb(0xc0, 0x9b, 0xf0),
        Color::Rgb(0xb8, 0xe6, 0xe0),
        Color::Rgb(0x7c, 0xcf, 0xc4),
        Color::Rgb(0x2f, 0xa8, 0x98),
        Color::Rgb(0x1b, 0x6e, 0x63),
    ]
}

/// Settings stored in a YAML file
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: &Path) -> Self {
        SettingsFile {
            path: path.to_path_buf(),
        }
    }
}

impl SettingsSource for SettingsFile {
    fn settings(&self) -> Result<UserSettings> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Load settings, falling back to local-time defaults on any failure
pub fn load_or_default(source: Option<&dyn SettingsSource>) -> UserSettings {
    let Some(source) = source else {
        return UserSettings::default();
    };
    match source.settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::debug!(error = %e, "settings unavailable, using defaults");
            UserSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    struct Failing;

    impl SettingsSource for Failing {
        fn settings(&self) -> Result<UserSettings> {
            Err(Error::Query("settings backend down".to_string()))
        }
    }

    #[test]
    fn test_failure_defaults_to_local() {
        let settings = load_or_default(Some(&Failing));
        assert_eq!(settings.timezone, Timezone::Local);
        assert_eq!(settings.palette(), default_palette());
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timezone: gmt\npalette: [red, \"#00ff00\", not-a-colour]").unwrap();

        let settings = load_or_default(Some(&SettingsFile::new(file.path())));
        assert_eq!(settings.timezone, Timezone::Gmt);
        assert_eq!(settings.palette(), vec![Color::Red, Color::Rgb(0, 0xff, 0)]);
    }

    #[test]
    fn test_missing_file_defaults() {
        let source = SettingsFile::new(Path::new("/nonexistent/nodestats.yaml"));
        assert_eq!(load_or_default(Some(&source)), UserSettings::default());
    }

    #[test]
    fn test_gmt_format() {
        assert_eq!(Timezone::Gmt.format(0), "1970/01/01 00:00:00Z");
    }
}
