//! Settings read from `quadclad.toml` and `QUADCLAD__*` environment variables.
//!
//! ```toml
//! database = "quads.db"       # leave out to keep everything in memory
//! id_generator = "counter"    # or "uuid", or "small_range" in tests
//! import = "seed.nq"
//! script = "startup.pq"
//!
//! [prefixes]
//! ex = "http://coordy.org/"
//!
//! [server]
//! enabled = true
//! bind = "127.0.0.1:8080"
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::identity::{IdGenerator, SmallRangeGenerator, UuidGenerator};
use crate::persist::PersistenceMode;
use crate::prefix::PrefixTable;
use crate::schema::SchemaMapper;
use crate::store::Store;

pub const DEFAULT_FILE: &str = "quadclad.toml";

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    #[default]
    Counter,
    Uuid,
    SmallRange,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSettings {
    pub enabled: bool,
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1:8080".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// SQLite file backing the store.
    pub database: Option<String>,
    pub prefixes: BTreeMap<String, String>,
    pub id_generator: GeneratorKind,
    /// N-Quads file imported at startup.
    pub import: Option<String>,
    /// Path script run at startup.
    pub script: Option<String>,
    pub server: ServerSettings,
}

impl Settings {
    /// Reads `path`, or an optional `quadclad.toml` when no path is given,
    /// with environment variables layered on top.
    pub fn load(path: Option<&str>) -> Result<Settings> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("QUADCLAD")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        debug!(?settings, "loaded settings");
        Ok(settings)
    }
    /// Parses settings from TOML text alone.
    pub fn from_toml(text: &str) -> Result<Settings> {
        Ok(Config::builder()
            .add_source(File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?)
    }
    pub fn persistence_mode(&self) -> PersistenceMode {
        match &self.database {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::InMemory,
        }
    }
    /// The core prefixes plus the configured ones.
    pub fn prefix_table(&self) -> Result<PrefixTable> {
        let mut table = PrefixTable::with_core();
        for (short, expansion) in &self.prefixes {
            table.register_prefix(short, expansion)?;
        }
        Ok(table)
    }
    pub fn id_generator(&self, store: &Store) -> Result<Arc<dyn IdGenerator>> {
        Ok(match self.id_generator {
            GeneratorKind::Counter => Arc::new(store.id_generator()?),
            GeneratorKind::Uuid => Arc::new(UuidGenerator),
            GeneratorKind::SmallRange => Arc::new(SmallRangeGenerator::default()),
        })
    }
    pub fn mapper(&self, store: &Store) -> Result<SchemaMapper> {
        Ok(SchemaMapper::new(
            Arc::clone(store.prefixes()),
            self.id_generator(store)?,
        ))
    }
}
