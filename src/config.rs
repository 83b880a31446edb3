// Copyright 2023 Remi Bernotavicius

use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SHORT_LINK_BASE: &str = "https://foodgram.example.org";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub busy_timeout: Duration,
    pub short_link_base: String,
}

impl Config {
    /// Fills in anything left unset with the defaults. The database lives under [`data_path`]
    /// unless a path is given.
    pub fn new(
        database_path: Option<PathBuf>,
        busy_timeout: Option<Duration>,
        short_link_base: Option<String>,
    ) -> Result<Self> {
        let database_path = match database_path {
            Some(path) => path,
            None => data_path()?.join("data.sqlite"),
        };
        Ok(Self {
            database_path,
            busy_timeout: busy_timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT),
            short_link_base: short_link_base
                .unwrap_or_else(|| DEFAULT_SHORT_LINK_BASE.into())
                .trim_end_matches('/')
                .into(),
        })
    }
}

/// This is where the database and other user-data lives on-disk. On Linux it should be like:
/// `~/.local/share/recipe_share/`
pub fn data_path() -> Result<PathBuf> {
    let dirs = directories::BaseDirs::new().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "failed to get user home directory",
        )
    })?;
    let path = dirs.data_dir().join("recipe_share");
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

#[test]
fn explicit_values_win() {
    let config = Config::new(
        Some("/tmp/recipes.sqlite".into()),
        Some(Duration::from_millis(250)),
        Some("https://example.com/".into()),
    )
    .unwrap();
    assert_eq!(config.database_path, PathBuf::from("/tmp/recipes.sqlite"));
    assert_eq!(config.busy_timeout, Duration::from_millis(250));
    assert_eq!(config.short_link_base, "https://example.com");
}

#[test]
fn defaults() {
    let config = Config::new(Some("db.sqlite".into()), None, None).unwrap();
    assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    assert_eq!(config.short_link_base, DEFAULT_SHORT_LINK_BASE);
}
