use super::commands::{Cli, Commands};
use crate::catalog::{ModelCatalog, ModelSource};
use crate::config::Config;
use crate::extract::{self, Source};
use crate::providers::http_client::build_provider_client;
use crate::providers::{
    Provider, ProviderGateway, ProviderId, SummaryEvent, SummaryRequest, spawn_summary,
};
use crate::storage::{self, FileStore, KeyValueStore, SavedSummary};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, Stdout};

const STORE_FILE: &str = "store.json";
const CHANNEL_CAPACITY: usize = 32;

struct Session {
    config: Config,
    store: Arc<dyn KeyValueStore>,
    catalog: ModelCatalog,
}

impl Session {
    async fn open(config: Config) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(
            FileStore::open(config.data_dir.join(STORE_FILE))
                .await
                .context("Failed to open summary store")?,
        );
        let gateways: Vec<ProviderGateway> = ProviderId::all()
            .map(|id| ProviderGateway::from_config(id, &config))
            .collect();
        let source: Arc<dyn ModelSource> = Arc::new(gateways);
        let catalog = ModelCatalog::load(Arc::clone(&store), source, &config.catalog).await;
        Ok(Self {
            config,
            store,
            catalog,
        })
    }

    /// Configured key for `id`, else the one saved with `set-key`.
    async fn credential(&self, id: ProviderId) -> Result<Option<String>> {
        if let Some(key) = self.config.credential(id) {
            return Ok(Some(key.to_string()));
        }
        storage::load_credential(self.store.as_ref(), id)
            .await
            .context("Failed to read saved API key")
    }

    fn provider(&self, flag: Option<&str>) -> Result<ProviderId> {
        let id = match flag {
            Some(name) => ProviderId::parse(name)?,
            None => self.config.provider_id()?,
        };
        Ok(id)
    }
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let session = Session::open(config).await?;
    let mut out = tokio::io::stdout();

    match cli.command {
        Commands::Summarize {
            source,
            provider,
            model,
            language,
            prompt,
            save,
        } => {
            let id = session.provider(provider.as_deref())?;
            let args = SummarizeArgs {
                source: Source::parse(&source),
                model,
                language,
                prompt,
                save,
            };
            run_summarize(&session, id, args, &mut out).await
        }
        Commands::Models { provider, refresh } => {
            let id = session.provider(provider.as_deref())?;
            run_models(&session, id, refresh, &mut out).await
        }
        Commands::Validate { provider, key } => {
            let id = session.provider(provider.as_deref())?;
            run_validate(&session, id, key, &mut out).await
        }
        Commands::SetKey {
            provider,
            key,
            no_check,
        } => {
            let id = session.provider(provider.as_deref())?;
            run_set_key(&session, id, &key, !no_check, &mut out).await
        }
        Commands::Availability => {
            let gateway = ProviderGateway::from_config(ProviderId::OnDevice, &session.config);
            let availability = gateway.availability().await;
            write_line(&mut out, &format!("on-device: {availability}")).await
        }
        Commands::Saved { limit } => run_saved(&session, limit, &mut out).await,
    }
}

struct SummarizeArgs {
    source: Source,
    model: Option<String>,
    language: Option<String>,
    prompt: Option<String>,
    save: bool,
}

async fn run_summarize(
    session: &Session,
    id: ProviderId,
    args: SummarizeArgs,
    out: &mut Stdout,
) -> Result<()> {
    let config = &session.config;
    let client = build_provider_client(&config.http);
    let extracted = extract::extract(&args.source, &client).await?;

    let model = args
        .model
        .or_else(|| config.pinned_model(id).map(String::from))
        .unwrap_or_else(|| session.catalog.default_model(id));
    let language = args.language.unwrap_or_else(|| config.language.clone());

    let request = SummaryRequest::new(extracted.content, model.clone())
        .with_language(language.clone())
        .with_custom_prompt(args.prompt.or_else(|| config.custom_prompt.clone()))
        .with_credential(session.credential(id).await?);
    tracing::info!(provider = %id, %model, title = %extracted.title, "summarizing");

    let gateway = Arc::new(ProviderGateway::from_config(id, config));
    let mut events = spawn_summary(gateway, request, CHANNEL_CAPACITY);
    let mut summary = String::new();

    while let Some(event) = events.recv().await {
        match event {
            SummaryEvent::Fragment(fragment) => {
                out.write_all(fragment.as_str().as_bytes()).await?;
                out.flush().await?;
                summary.push_str(fragment.as_str());
            }
            SummaryEvent::Completed => break,
            SummaryEvent::Failed(err) => {
                if !summary.is_empty() {
                    write_line(out, "").await?;
                }
                return Err(err).with_context(|| format!("{id} summary failed"));
            }
        }
    }
    write_line(out, "").await?;

    if args.save {
        let count = storage::append_saved(
            session.store.as_ref(),
            SavedSummary {
                title: extracted.title,
                source: match &args.source {
                    Source::Stdin => None,
                    other => Some(other.to_string()),
                },
                provider: id,
                model,
                language,
                summary,
                saved_at: Utc::now(),
            },
        )
        .await
        .context("Failed to save summary")?;
        tracing::info!(count, "summary saved");
    }
    Ok(())
}

async fn run_models(
    session: &Session,
    id: ProviderId,
    refresh: bool,
    out: &mut Stdout,
) -> Result<()> {
    if refresh {
        let credential = session.credential(id).await?;
        if !session.catalog.refresh(id, credential.as_deref()).await {
            tracing::warn!(provider = %id, "refresh failed; showing cached models");
        }
    }

    let default = session.catalog.default_model(id);
    for model in session.catalog.get(id) {
        let marker = if model == default { "*" } else { " " };
        write_line(out, &format!("{marker} {model}")).await?;
    }
    Ok(())
}

async fn run_validate(
    session: &Session,
    id: ProviderId,
    key: Option<String>,
    out: &mut Stdout,
) -> Result<()> {
    let key = match key {
        Some(key) => Some(key),
        None => session.credential(id).await?,
    };
    let Some(key) = key else {
        bail!("No API key configured for {id}; pass --key, run `gistline set-key`, or set it in config.toml");
    };

    let gateway = ProviderGateway::from_config(id, &session.config);
    if !gateway.validate_key(&key).await {
        bail!("{id} rejected the API key");
    }

    write_line(out, &format!("{id}: key accepted")).await?;
    session.catalog.refresh(id, Some(&key)).await;
    Ok(())
}

async fn run_set_key(
    session: &Session,
    id: ProviderId,
    key: &str,
    check: bool,
    out: &mut Stdout,
) -> Result<()> {
    let gateway = ProviderGateway::from_config(id, &session.config);
    if !gateway.descriptor().requires_credential {
        bail!("{id} does not use an API key");
    }
    if check && !gateway.validate_key(key).await {
        bail!("{id} rejected the API key");
    }
    if session.config.credential(id).is_some() {
        tracing::warn!(provider = %id, "config.toml or the environment sets a key; it takes precedence");
    }

    let mut follower = session.catalog.follow_credentials();
    storage::save_credential(session.store.as_ref(), id, key)
        .await
        .context("Failed to save API key")?;
    follower.next_edit().await;
    session.catalog.settled().await;

    let count = session.catalog.get(id).len();
    write_line(out, &format!("{id}: key saved, {count} models available")).await
}

async fn run_saved(session: &Session, limit: Option<usize>, out: &mut Stdout) -> Result<()> {
    let saved = storage::list_saved(session.store.as_ref())
        .await
        .context("Failed to read saved summaries")?;
    if saved.is_empty() {
        return write_line(out, "No saved summaries.").await;
    }

    let skip = limit.map_or(0, |n| saved.len().saturating_sub(n));
    for entry in saved.iter().skip(skip) {
        write_line(
            out,
            &format!(
                "## {} ({} / {}, {})\n{}\n",
                entry.title,
                entry.provider,
                entry.model,
                entry.saved_at.format("%Y-%m-%d %H:%M"),
                entry.summary
            ),
        )
        .await?;
    }
    Ok(())
}

async fn write_line(out: &mut Stdout, line: &str) -> Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
