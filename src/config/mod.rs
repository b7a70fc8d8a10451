use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure for the cabinet host
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub games: GamesConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub keybindings: KeyBindings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamesConfig {
    /// Directory scanned for installable games
    #[serde(default = "default_games_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Target frames per second for the host loop
    #[serde(default = "default_target_fps")]
    pub target_fps: u16,

    /// Background color as a `#RRGGBB` hex string
    #[serde(default = "default_background")]
    pub background: String,

    /// Preview icon size in terminal cells
    #[serde(default = "default_preview_width")]
    pub preview_width: u16,
    #[serde(default = "default_preview_height")]
    pub preview_height: u16,

    /// Show the FPS readout in the menu
    #[serde(default)]
    pub show_fps: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub menu_left: String,
    pub menu_right: String,
    pub menu_select: String,
    pub quit: String,
    /// Forces a voluntary unload of the running game, back to the menu
    pub leave_game: String,
}

// Default value functions
fn default_games_dir() -> PathBuf {
    PathBuf::from("games")
}

fn default_target_fps() -> u16 {
    60
}

fn default_background() -> String {
    "#101018".to_string()
}

fn default_preview_width() -> u16 {
    24
}

fn default_preview_height() -> u16 {
    12
}

impl Default for GamesConfig {
    fn default() -> Self {
        Self {
            dir: default_games_dir(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            background: default_background(),
            preview_width: 24,
            preview_height: 12,
            show_fps: false,
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            menu_left: "Left".to_string(),
            menu_right: "Right".to_string(),
            menu_select: "Enter".to_string(),
            quit: "q".to_string(),
            leave_game: "Esc".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists
    ///
    /// # Errors
    /// Returns an error if a config file exists but cannot be parsed
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self).context("Failed to serialize config")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        fs::write(path.as_ref(), contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get default configuration path
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn default_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;

        Ok(home.join(".cabinet").join("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.games.dir, PathBuf::from("games"));
        assert_eq!(config.display.target_fps, 60);
        assert_eq!(config.keybindings.menu_select, "Enter");
        assert!(!config.display.show_fps);
    }

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
games:
  dir: /opt/cabinet/games
display:
  target_fps: 30
  show_fps: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.games.dir, PathBuf::from("/opt/cabinet/games"));
        assert_eq!(config.display.target_fps, 30);
        assert!(config.display.show_fps);
        // Omitted sections fall back to defaults
        assert_eq!(config.keybindings.leave_game, "Esc");
        assert_eq!(config.display.background, "#101018");
    }

    #[test]
    fn test_partial_keybindings_keep_defaults() {
        let yaml = r#"
keybindings:
  quit: x
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.keybindings.quit, "x");
        // Unlisted binds in a partial section keep their defaults
        assert_eq!(config.keybindings.menu_left, "Left");
        assert_eq!(config.keybindings.menu_select, "Enter");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = Config::default();
        config.display.target_fps = 144;
        config.save_to_file(&path).unwrap();

        let reloaded = Config::load_from_file(&path).unwrap();
        assert_eq!(reloaded.display.target_fps, 144);
    }
}
