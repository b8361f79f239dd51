use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How a wallpaper is mapped onto a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ScaleSetting {
    #[serde(rename = "center")]
    Center,
    #[serde(rename = "stretched")]
    Stretched,
    #[serde(rename = "horizontal")]
    Horizontal,
    #[serde(rename = "vertical")]
    Vertical,
}

/// Shape of the cross-fade alpha ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EasingSetting {
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "ease-in")]
    EaseIn,
    #[serde(rename = "ease-out")]
    EaseOut,
    #[serde(rename = "ease-in-out")]
    EaseInOut,
}

/// The `wallpapers` key accepts either a single directory/file path or an
/// explicit list of paths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WallpaperSource {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl WallpaperSource {
    pub fn paths(&self) -> Vec<PathBuf> {
        match self {
            WallpaperSource::One(path) => vec![path.clone()],
            WallpaperSource::Many(paths) => paths.clone(),
        }
    }
}

/// Immutable settings snapshot read once at start-up.
///
/// Durations accept an integer or float number of seconds, or a
/// humantime string such as `"1500ms"`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_wallpapers")]
    pub wallpapers: WallpaperSource,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    #[serde(default = "default_scale_mode")]
    pub scale_mode: ScaleSetting,
    #[serde(default = "default_easing")]
    pub easing: EasingSetting,
    #[serde(
        default = "default_fade_speed",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub fade_speed: Duration,
    #[serde(
        default = "default_delay",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub delay: Duration,
    #[serde(default = "default_framerate")]
    pub framerate_limit: u32,
    #[serde(default)]
    pub debug: bool,
}

fn default_wallpapers() -> WallpaperSource {
    WallpaperSource::One(PathBuf::from("~/Pictures/wallpapers"))
}

fn default_shuffle() -> bool {
    true
}

fn default_scale_mode() -> ScaleSetting {
    ScaleSetting::Vertical
}

fn default_easing() -> EasingSetting {
    EasingSetting::EaseInOut
}

fn default_fade_speed() -> Duration {
    Duration::from_secs(1)
}

fn default_delay() -> Duration {
    Duration::from_secs(300)
}

fn default_framerate() -> u32 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wallpapers: default_wallpapers(),
            shuffle: default_shuffle(),
            scale_mode: default_scale_mode(),
            easing: default_easing(),
            fade_speed: default_fade_speed(),
            delay: default_delay(),
            framerate_limit: default_framerate(),
            debug: false,
        }
    }
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Presentation rate clamped to the supported range.
    pub fn effective_framerate(&self) -> u32 {
        self.framerate_limit.clamp(1, 240)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wallpapers.paths().is_empty() {
            return Err(ConfigError::Invalid(
                "wallpapers must name at least one path".into(),
            ));
        }

        if self.fade_speed.is_zero() {
            return Err(ConfigError::Invalid(
                "fade_speed must be greater than zero".into(),
            ));
        }

        if self.delay.is_zero() {
            return Err(ConfigError::Invalid("delay must be greater than zero".into()));
        }

        if self.framerate_limit == 0 {
            return Err(ConfigError::Invalid(
                "framerate_limit must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

/// Search order for `smoothpaper.toml`: `$XDG_CONFIG_HOME/smoothpaper/`,
/// `~/.config/smoothpaper/`, then `/etc/xdg/smoothpaper/`.
pub fn candidate_paths(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(base) = xdg_config_home {
        candidates.push(base.join("smoothpaper").join("smoothpaper.toml"));
    }
    if let Some(home) = home {
        candidates.push(
            home.join(".config")
                .join("smoothpaper")
                .join("smoothpaper.toml"),
        );
    }
    candidates.push(PathBuf::from("/etc/xdg/smoothpaper/smoothpaper.toml"));
    candidates.dedup();
    candidates
}

/// Template written by `--install-config`.
pub const DEFAULT_CONFIG: &str = r#"# smoothpaper configuration

# Path to a directory of wallpapers (scanned recursively), or a list of paths.
wallpapers = "~/Pictures/wallpapers"

# Randomise the order after loading.
shuffle = true

# How images are mapped to the screen: center, stretched, horizontal, vertical.
scale_mode = "vertical"

# Alpha ramp for the cross-fade: linear, ease-in, ease-out, ease-in-out.
easing = "ease-in-out"

# Cross-fade duration in seconds (fractions allowed).
fade_speed = 1.0

# Seconds a wallpaper stays up between transitions.
delay = 300

# Presentation rate while fading, clamped to 1..=240.
framerate_limit = 60

# Verbose logging.
debug = false
"#;

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(value.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
wallpapers = "/srv/wallpapers"
shuffle = false
scale_mode = "center"
easing = "ease-out"
fade_speed = 2.5
delay = "5m"
framerate_limit = 144
"#;

    #[test]
    fn parses_sample_config() {
        let settings = Settings::from_toml_str(SAMPLE).expect("parse config");
        assert!(!settings.shuffle);
        assert_eq!(settings.scale_mode, ScaleSetting::Center);
        assert_eq!(settings.easing, EasingSetting::EaseOut);
        assert_eq!(settings.fade_speed, Duration::from_secs_f64(2.5));
        assert_eq!(settings.delay, Duration::from_secs(300));
        assert_eq!(settings.framerate_limit, 144);
    }

    #[test]
    fn empty_config_uses_documented_defaults() {
        let settings = Settings::from_toml_str("").expect("defaults");
        assert!(settings.shuffle);
        assert_eq!(settings.scale_mode, ScaleSetting::Vertical);
        assert_eq!(settings.easing, EasingSetting::EaseInOut);
        assert_eq!(settings.fade_speed, Duration::from_secs(1));
        assert_eq!(settings.delay, Duration::from_secs(300));
        assert_eq!(settings.framerate_limit, 60);
        assert!(!settings.debug);
        match settings.wallpapers {
            WallpaperSource::One(path) => {
                assert_eq!(path, PathBuf::from("~/Pictures/wallpapers"));
            }
            other => panic!("unexpected default wallpapers: {other:?}"),
        }
    }

    #[test]
    fn wallpapers_accepts_a_list() {
        let settings = Settings::from_toml_str(
            r#"
wallpapers = ["/a/one.png", "/b/two.jpg"]
"#,
        )
        .expect("list form");
        assert_eq!(settings.wallpapers.paths().len(), 2);
    }

    #[test]
    fn default_template_round_trips() {
        let settings = Settings::from_toml_str(DEFAULT_CONFIG).expect("template parses");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn rejects_zero_fade_speed() {
        let err = Settings::from_toml_str("fade_speed = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Settings::from_toml_str("frame_rate = 30").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn framerate_clamps_to_supported_range() {
        let settings = Settings::from_toml_str("framerate_limit = 1000").expect("parse");
        assert_eq!(settings.effective_framerate(), 240);
        let settings = Settings::from_toml_str("framerate_limit = 30").expect("parse");
        assert_eq!(settings.effective_framerate(), 30);
    }

    #[test]
    fn candidate_paths_prefer_xdg_config_home() {
        let candidates = candidate_paths(
            Some(Path::new("/custom/config")),
            Some(Path::new("/home/user")),
        );
        assert_eq!(
            candidates[0],
            PathBuf::from("/custom/config/smoothpaper/smoothpaper.toml")
        );
        assert_eq!(
            candidates.last().unwrap(),
            &PathBuf::from("/etc/xdg/smoothpaper/smoothpaper.toml")
        );
    }
}
