use crate::conductor::PersistenceConfig;
use crate::error::{EngineError, Result};
use crate::playback::PlaybackConfig;
use crate::tokenizer::TokenizerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub playback: PlaybackConfig,
    pub tokenizer: TokenizerConfig,
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::parse(&contents)?)
    }

    /// Parses TOML text. Missing sections and fields take their defaults.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - FLOW_RSVP_WPM → playback.wpm
    /// - FLOW_RSVP_CHUNK_SIZE → playback.chunk_size
    /// - FLOW_RSVP_INLINE → playback.inline_tokenizer (`1`/`true`)
    ///
    /// Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(wpm) = std::env::var("FLOW_RSVP_WPM")
            && let Ok(wpm) = wpm.trim().parse()
        {
            self.playback.wpm = wpm;
        }

        if let Ok(size) = std::env::var("FLOW_RSVP_CHUNK_SIZE")
            && let Ok(size) = size.trim().parse()
        {
            self.playback.chunk_size = size;
        }

        if let Ok(inline) = std::env::var("FLOW_RSVP_INLINE")
            && !inline.is_empty()
        {
            self.playback.inline_tokenizer =
                matches!(inline.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        self
    }

    /// Checks values serde cannot reject on its own.
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;
        if playback.min_wpm == 0 || playback.min_wpm > playback.max_wpm {
            return Err(invalid(
                "playback.min_wpm",
                format!(
                    "must be between 1 and max_wpm ({}), got {}",
                    playback.max_wpm, playback.min_wpm
                ),
            ));
        }
        if !(playback.min_wpm..=playback.max_wpm).contains(&playback.wpm) {
            return Err(invalid(
                "playback.wpm",
                format!(
                    "must be within {}..={}, got {}",
                    playback.min_wpm, playback.max_wpm, playback.wpm
                ),
            ));
        }
        if playback.chunk_size == 0 {
            return Err(invalid("playback.chunk_size", "must be at least 1"));
        }
        if playback.progress_interval == 0 {
            return Err(invalid("playback.progress_interval", "must be at least 1"));
        }
        if playback.ramp.iter().any(|m| !m.is_finite() || *m <= 0.0) {
            return Err(invalid("playback.ramp", "multipliers must be positive"));
        }
        check_non_negative(&[
            (
                "playback.sentence_boost_per_100_wpm",
                playback.sentence_boost_per_100_wpm,
            ),
            ("playback.max_sentence_boost", playback.max_sentence_boost),
            ("playback.clause_boost", playback.clause_boost),
        ])?;

        let tokenizer = &self.tokenizer;
        check_non_negative(&[
            ("tokenizer.one_syllable_factor", tokenizer.one_syllable_factor),
            ("tokenizer.syllable_step", tokenizer.syllable_step),
            ("tokenizer.function_word_factor", tokenizer.function_word_factor),
            ("tokenizer.emphasis_word_factor", tokenizer.emphasis_word_factor),
            ("tokenizer.conjunction_factor", tokenizer.conjunction_factor),
            ("tokenizer.sentence_start_factor", tokenizer.sentence_start_factor),
            ("tokenizer.dialogue_factor", tokenizer.dialogue_factor),
            ("tokenizer.sentence_pause_secs", tokenizer.sentence_pause_secs),
            ("tokenizer.ellipsis_pause_secs", tokenizer.ellipsis_pause_secs),
            ("tokenizer.semicolon_pause_secs", tokenizer.semicolon_pause_secs),
            ("tokenizer.dash_pause_secs", tokenizer.dash_pause_secs),
            ("tokenizer.comma_pause_secs", tokenizer.comma_pause_secs),
            (
                "tokenizer.max_punctuation_pause_secs",
                tokenizer.max_punctuation_pause_secs,
            ),
            ("tokenizer.paragraph_pause_secs", tokenizer.paragraph_pause_secs),
            ("tokenizer.reference_word_secs", tokenizer.reference_word_secs),
            ("tokenizer.min_multiplier", tokenizer.min_multiplier),
            ("tokenizer.max_multiplier", tokenizer.max_multiplier),
        ])?;
        if tokenizer.min_multiplier <= 0.0 || tokenizer.min_multiplier > tokenizer.max_multiplier {
            return Err(invalid(
                "tokenizer.min_multiplier",
                format!(
                    "must be positive and not above max_multiplier ({})",
                    tokenizer.max_multiplier
                ),
            ));
        }
        if tokenizer.reference_word_secs <= 0.0 {
            return Err(invalid("tokenizer.reference_word_secs", "must be positive"));
        }
        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/flow-rsvp/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flow-rsvp")
            .join("config.toml")
    }
}

/// NaN and infinities slip past ordinary range comparisons.
fn check_non_negative(values: &[(&str, f64)]) -> Result<()> {
    for &(key, value) in values {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(
                key,
                format!("must be a finite, non-negative number, got {value}"),
            ));
        }
    }
    Ok(())
}

fn invalid(key: &str, message: impl Into<String>) -> EngineError {
    EngineError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_flow_env() {
        remove_env("FLOW_RSVP_WPM");
        remove_env("FLOW_RSVP_CHUNK_SIZE");
        remove_env("FLOW_RSVP_INLINE");
    }

    fn temp_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.playback.wpm, 300);
        assert_eq!(config.playback.chunk_size, 10_000);
        assert!(!config.playback.inline_tokenizer);
        assert_eq!(config.tokenizer.min_multiplier, 0.5);
        assert_eq!(config.tokenizer.max_multiplier, 3.5);
        assert_eq!(config.persistence.zero_guard_window_ms, 5_000);
        assert_eq!(config.persistence.zero_guard_min_prior, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = temp_config(
            r#"
            [playback]
            wpm = 450
            chunk_size = 500
            context_rewind = false
            ramp = [1.8, 1.3]

            [tokenizer]
            comma_pause_secs = 0.07
            max_multiplier = 3.0

            [persistence]
            zero_guard_window_ms = 2000
            resume = false
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.playback.wpm, 450);
        assert_eq!(config.playback.chunk_size, 500);
        assert!(!config.playback.context_rewind);
        assert_eq!(config.playback.ramp, vec![1.8, 1.3]);
        assert_eq!(config.tokenizer.comma_pause_secs, 0.07);
        assert_eq!(config.tokenizer.max_multiplier, 3.0);
        assert_eq!(config.persistence.zero_guard_window_ms, 2000);
        assert!(!config.persistence.resume);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = temp_config(
            r#"
            [playback]
            wpm = 600
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.playback.wpm, 600);
        assert_eq!(config.playback.chunk_size, 10_000);
        assert_eq!(config.tokenizer, TokenizerConfig::default());
        assert_eq!(config.persistence, PersistenceConfig::default());
    }

    #[test]
    fn test_env_override_wpm() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_flow_env();

        set_env("FLOW_RSVP_WPM", "520");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.playback.wpm, 520);
        assert_eq!(config.playback.chunk_size, 10_000); // Not overridden

        clear_flow_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_flow_env();

        set_env("FLOW_RSVP_WPM", "250");
        set_env("FLOW_RSVP_CHUNK_SIZE", "64");
        set_env("FLOW_RSVP_INLINE", "true");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.playback.wpm, 250);
        assert_eq!(config.playback.chunk_size, 64);
        assert!(config.playback.inline_tokenizer);

        clear_flow_env();
    }

    #[test]
    fn test_env_override_garbage_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_flow_env();

        set_env("FLOW_RSVP_WPM", "fast");
        set_env("FLOW_RSVP_CHUNK_SIZE", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.playback.wpm, 300);
        assert_eq!(config.playback.chunk_size, 10_000);

        clear_flow_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = temp_config(
            r#"
            [playback
            wpm = "broken
        "#,
        );

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_parse_maps_toml_errors() {
        assert!(matches!(
            Config::parse("[tokenizer]\nmax_multiplier = \"high\""),
            Err(EngineError::Config(_))
        ));
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_validate_rejects_out_of_range_wpm() {
        let mut config = Config::default();
        config.playback.wpm = 5_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("playback.wpm"));
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = Config::default();
        config.playback.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::ConfigInvalidValue { ref key, .. }) if key == "playback.chunk_size"
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_multiplier_range() {
        let mut config = Config::default();
        config.tokenizer.min_multiplier = 4.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_numbers() {
        let config = Config::parse("[tokenizer]\nmin_multiplier = nan").unwrap();
        assert!(matches!(
            config.validate(),
            Err(EngineError::ConfigInvalidValue { ref key, .. }) if key == "tokenizer.min_multiplier"
        ));

        let config = Config::parse("[tokenizer]\nreference_word_secs = inf").unwrap();
        assert!(config.validate().is_err());

        let config = Config::parse("[playback]\nclause_boost = -1.0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_path_ends_with_app_dir() {
        let path = Config::default_path();
        assert!(path.ends_with("flow-rsvp/config.toml"));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_reports_invalid_toml() {
        let temp_file = temp_config("[playback\nwpm = ");
        let err = Config::load_or_default(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
