// ============================================================================
// CONFIGURATION - environment-derived settings with safe defaults
// ============================================================================

use std::env;
use std::path::PathBuf;

use tracing::info;

pub const DEFAULT_API_BASE: &str = "https://api.spoonacular.com";
pub const DEFAULT_LOGIN_EMAIL: &str = "student@mealmap.app";
pub const DEFAULT_LOGIN_PASSWORD: &str = "meal1234";

pub struct Config {
    pub api_base: String,
    pub api_key: Option<String>,
    pub recipes_file: Option<PathBuf>,
    pub data_dir_override: Option<PathBuf>,
    pub login_email: String,
    pub login_password: String,
    pub start_screen: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            api_base: try_load("MEALMAP_API_BASE", DEFAULT_API_BASE),
            api_key: opt("MEALMAP_API_KEY"),
            recipes_file: opt("MEALMAP_RECIPES_FILE").map(PathBuf::from),
            data_dir_override: opt("MEALMAP_DATA_DIR").map(PathBuf::from),
            login_email: try_load("MEALMAP_LOGIN_EMAIL", DEFAULT_LOGIN_EMAIL),
            login_password: try_load("MEALMAP_LOGIN_PASSWORD", DEFAULT_LOGIN_PASSWORD),
            start_screen: try_load("MEALMAP_START_SCREEN", "home"),
        }
    }

    /// Resolved blob/cache/log directory. None only when the platform
    /// reports no per-user data directory and no override is set.
    pub fn data_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.data_dir_override {
            return Some(dir.clone());
        }
        dirs::data_dir().map(|d| d.join("mealmap"))
    }
}

fn try_load(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
