// Native binary for antelopex - one-shot lookups and deep links

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use antelopex::{
    app::{Explorer, Navigation},
    config::{load, Config},
    deep_link::{AddressBar, DeepLinkDecoder, MemoryAddressBar, PassOutcome},
    router,
    source::HttpSource,
    storage::{MemoryStorage, SessionStorage, SqliteStorage},
};

const SHARE_BASE: &str = "https://antelopex.app/";

fn open_storage(path: &str) -> Arc<dyn SessionStorage> {
    match SqliteStorage::open(path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::warn!("session db {path} unavailable ({e}); session will not persist");
            Arc::new(MemoryStorage::new())
        }
    }
}

async fn connect(app: &Explorer, cfg: &Config, link_names_chain: bool) -> Result<()> {
    let history = cfg.history_endpoint.as_deref();
    let connections = app.connections();
    if let Some(ref endpoint) = cfg.endpoint {
        connections
            .connect(endpoint, None, history)
            .await
            .with_context(|| format!("Failed to connect to {endpoint}"))?;
    } else if let Some(ref chain) = cfg.chain {
        connections
            .connect_preset(chain, history)
            .await
            .with_context(|| format!("Failed to connect to {chain}"))?;
    } else {
        match connections.restore_session(history).await {
            Ok(Some(conn)) => log::info!("restored session: {}", conn.name),
            Ok(None) if link_names_chain => {}
            Ok(None) => bail!("No chain selected. Pass --chain or --endpoint."),
            Err(e) if link_names_chain => log::warn!("session restore failed: {e}"),
            Err(e) => return Err(anyhow!(e).context("Failed to restore last session")),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = load().context("Failed to load configuration")?;
    cfg.print_summary();

    let source = Arc::new(HttpSource::new(cfg.rpc_timeout_ms, cfg.rpc_retries));
    let storage = open_storage(&cfg.session_db_path);
    let app = Explorer::new(source, storage, cfg.table_limit);

    let link_names_chain = cfg
        .link
        .as_deref()
        .map(|l| router::parse(l).chain.is_some())
        .unwrap_or(false);
    connect(&app, &cfg, link_names_chain).await?;

    if let Some(ref link) = cfg.link {
        let bar = MemoryAddressBar::new(link.clone());
        let outcome = DeepLinkDecoder::new().run(&app, &bar).await;
        log::info!("link pass: {outcome:?}");
        match outcome {
            PassOutcome::Resolved(_) | PassOutcome::Connected | PassOutcome::Idle => {}
            PassOutcome::Rejected => bail!("Malformed link: {link}"),
            other => bail!("Link could not be opened ({other:?})"),
        }
        let rest = bar.query();
        if !rest.is_empty() {
            log::debug!("address after link pass: ?{rest}");
        }
    } else if let Some(ref query) = cfg.query {
        match app.lookup(query).await {
            Ok(Navigation::Applied) => {}
            Ok(other) => bail!("Lookup of {query} was not applied ({other:?})"),
            Err(e) => bail!("Lookup of {query} failed: {e}"),
        }
    }

    if let Some(status) = app.chain_status() {
        eprintln!(
            "{} | head {} by {} | chain {}",
            status.name, status.head_block_num, status.head_producer, status.chain_id_short
        );
    }

    let ctx = app.context();
    if ctx.active_entity.is_some() {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
        let fields = app
            .action_form()
            .map(|form| {
                eprintln!("{}", app.cleos_command(&form, None));
                form.raw_values()
            })
            .unwrap_or_else(BTreeMap::new);
        if let Some(link) = app.share_link(SHARE_BASE, &fields) {
            eprintln!("share: {link}");
        }
    }

    Ok(())
}
