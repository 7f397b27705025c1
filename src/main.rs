use std::fs;
use std::io::BufReader;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use quadclad::config::Settings;
use quadclad::error::Result;
use quadclad::interface::QueryInterface;
use quadclad::server;
use quadclad::store::Store;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // an explicit settings file may be given as the only argument
    let path = std::env::args().nth(1);
    let settings = Settings::load(path.as_deref())?;
    let store = Arc::new(Store::with_prefixes(
        settings.persistence_mode(),
        settings.prefix_table()?,
    )?);

    if let Some(import) = &settings.import {
        let inserted = store.import_nquads(BufReader::new(fs::File::open(import)?))?;
        info!(file = %import, inserted, "imported");
    }

    let interface = Arc::new(QueryInterface::new(Arc::clone(&store)));
    if let Some(script) = &settings.script {
        let result = interface.run_sync(&fs::read_to_string(script)?)?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if settings.server.enabled {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(server::serve(Arc::clone(&interface), &settings.server.bind))?;
    }

    store.close()
}
