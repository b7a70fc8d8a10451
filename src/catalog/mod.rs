//! Game discovery and validation.
//!
//! Each installable game lives in its own directory under the games dir and
//! must provide, under its own name: an entry script `<name>/<name>.lua`, a
//! preview icon `icon.png`, and an `info.txt` whose first line is the display
//! title and remaining lines are the description. Directories that fail
//! validation are skipped with a warning and never surfaced as a host fault.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Titles longer than this get a truncated `short_title`
const SHORT_TITLE_LIMIT: usize = 10;

/// Identity of one installable game. Immutable once discovered.
#[derive(Debug, Clone)]
pub struct GameDescriptor {
    /// Directory name, used as the unique id
    pub name: String,
    /// Path to the Lua entry script
    pub entry_path: PathBuf,
    /// Path to the preview icon
    pub icon_path: PathBuf,
    /// Display title (first line of info.txt)
    pub title: String,
    /// Title truncated for narrow carousel labels
    pub short_title: String,
    pub description: String,
}

impl GameDescriptor {
    fn from_dir(dir: &Path, name: &str) -> Option<Self> {
        let entry_path = dir.join(format!("{name}.lua"));
        let icon_path = dir.join("icon.png");
        let info_path = dir.join("info.txt");

        if !entry_path.exists() || !icon_path.exists() || !info_path.exists() {
            warn!(
                "Skipping game '{name}': requires {name}.lua, icon.png and info.txt in {}",
                dir.display()
            );
            return None;
        }

        let info = match fs::read_to_string(&info_path) {
            Ok(info) => info,
            Err(e) => {
                warn!("Skipping game '{name}': failed to read info.txt: {e}");
                return None;
            }
        };

        let mut lines = info.lines();
        let title = match lines.next().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => {
                warn!("Skipping game '{name}': info.txt must start with a title line");
                return None;
            }
        };
        let description = lines.collect::<Vec<_>>().join("\n").trim().to_string();

        let short_title = if title.chars().count() > SHORT_TITLE_LIMIT {
            let head: String = title.chars().take(6).collect();
            format!("{head}...")
        } else {
            title.clone()
        };

        Some(Self {
            name: name.to_string(),
            entry_path,
            icon_path,
            title,
            short_title,
            description,
        })
    }
}

/// The installable-game catalog, sorted by game name
#[derive(Debug, Default)]
pub struct GameCatalog {
    games: Vec<GameDescriptor>,
}

impl GameCatalog {
    /// Scan a games directory for valid games. A missing directory yields an
    /// empty catalog rather than an error, so a fresh install still reaches
    /// the menu.
    #[must_use]
    pub fn scan<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let mut games = Vec::new();

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read games directory {}: {e}", dir.display());
                return Self::default();
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(game) = GameDescriptor::from_dir(&path, name) {
                debug!("Discovered game '{}' ({})", game.title, game.name);
                games.push(game);
            }
        }

        games.sort_by(|a, b| a.name.cmp(&b.name));
        Self { games }
    }

    #[must_use]
    pub fn games(&self) -> &[GameDescriptor] {
        &self.games
    }

    /// Look a game up by its directory id
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GameDescriptor> {
        self.games.iter().find(|g| g.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.games.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}
