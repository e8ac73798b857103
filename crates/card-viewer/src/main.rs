mod cli;
mod commands;
mod config;
mod page;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use card_common::http::HttpCardClient;
use card_common::model::CreateCardFormData;
use card_store::CardStore;

use cli::{Cli, Command};
use config::ViewerConfig;

/// Backend client and the store built over it.
struct Backend {
    config: ViewerConfig,
    client: Arc<HttpCardClient>,
    store: CardStore,
}

impl Backend {
    fn connect(api_url: Option<String>) -> anyhow::Result<Self> {
        let config = ViewerConfig::from_env().with_api_url(api_url);
        let client = Arc::new(HttpCardClient::new(config.client.clone())?);
        let store = CardStore::with_options(client.clone(), config.store);
        info!(
            base_url = %client.config().base_url,
            timeout_ms = client.config().default_timeout.as_millis(),
            max_retries = client.config().max_retries,
            discard_stale_fetches = store.options().discard_stale_fetches,
            "card client configured"
        );
        Ok(Self {
            config,
            client,
            store,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let Cli { api_url, command } = Cli::parse();

    match command {
        Command::Render { path, html } => commands::render(&path, html).await,
        Command::List { title } => {
            let backend = Backend::connect(api_url)?;
            commands::list(&backend.store, title.as_deref()).await
        }
        Command::Show { id, html } => {
            let backend = Backend::connect(api_url)?;
            commands::show(&backend.store, &id, html).await
        }
        Command::Create {
            title,
            system_prompt,
            topics,
            context_file,
        } => {
            let backend = Backend::connect(api_url)?;
            let form = CreateCardFormData {
                title,
                system_prompt,
                topics_to_cover: topics,
                context_file: None,
            };
            commands::create(&backend.store, form, context_file.as_deref()).await
        }
        Command::Search => {
            let Backend { config, store, .. } = Backend::connect(api_url)?;
            commands::search(store, config.search_debounce).await
        }
        Command::Ask { id, question } => {
            let backend = Backend::connect(api_url)?;
            commands::ask(&backend.store, backend.client.as_ref(), &id, question).await
        }
        Command::Bias { id } => {
            let backend = Backend::connect(api_url)?;
            commands::bias(&backend.store, backend.client.as_ref(), &id).await
        }
    }
}
