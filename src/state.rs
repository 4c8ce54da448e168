use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::clients::anidb::AnidbClient;
use crate::clients::anilist::AnilistClient;
use crate::clients::jikan::JikanClient;
use crate::clients::omdb::OmdbClient;
use crate::clients::tmdb::TmdbClient;
use crate::clients::tvmaze::TvmazeClient;
use crate::config::Config;
use crate::db::Store;
use crate::domain::Source;
use crate::services::backfill::{BackfillConfig, RatingBackfillService};
use crate::services::catalog::{CuratedImport, ImportRunner};
use crate::services::enrichment::EnrichmentService;
use crate::services::quota::QuotaProvider;
use crate::services::scheduler::SyncManager;
use crate::services::sync::{
    AnidbCatalog, AnilistCatalog, JikanCatalog, JikanCurated, TmdbCatalog, TvmazeCatalog,
};

/// Build a shared HTTP client with reasonable defaults for API calls.
/// Reused across every API client for connection pooling.
fn build_shared_http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent(concat!("Metarr/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

/// Every service constructed exactly once at process start and passed by
/// reference; the per-source in-process run guards live on the
/// [`ImportRunner`] instances in `runners`.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub quota: Arc<QuotaProvider>,

    pub enrichment: Arc<EnrichmentService>,

    pub tvmaze: Arc<TvmazeClient>,

    pub jikan: Arc<JikanClient>,

    pub anilist: Arc<AnilistClient>,

    pub tmdb: Option<Arc<TmdbClient>>,

    pub anidb: Option<Arc<AnidbClient>>,

    pub omdb: Option<Arc<OmdbClient>>,

    pub runners: HashMap<Source, Arc<ImportRunner>>,

    pub backfill: Arc<RatingBackfillService>,

    pub sync_manager: Arc<SyncManager>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let http_client = build_shared_http_client()?;

        let tvmaze = Arc::new(TvmazeClient::new(http_client.clone()));
        let jikan = Arc::new(JikanClient::new(http_client.clone()));
        let anilist = Arc::new(AnilistClient::new(http_client.clone()));

        let tmdb = config
            .sources
            .tmdb
            .resolved_api_key()
            .map(|key| Arc::new(TmdbClient::new(http_client.clone(), key)));

        let anidb = config.sources.anidb.resolved_client().map(|client_name| {
            Arc::new(AnidbClient::new(
                http_client.clone(),
                client_name,
                config.sources.anidb.resolved_clientver(),
            ))
        });

        let omdb = match config.omdb.resolved_api_key() {
            Some(key) => Some(Arc::new(OmdbClient::new(http_client, key))),
            None => {
                warn!("No OMDb API key configured, rating enrichment disabled");
                None
            }
        };

        let quota = Arc::new(QuotaProvider::new(store.clone(), config.omdb.daily_limit));
        let enrichment = Arc::new(EnrichmentService::new(
            store.clone(),
            omdb.clone(),
            Arc::clone(&quota),
        ));

        let mut runners: HashMap<Source, Arc<ImportRunner>> = HashMap::new();

        if config.sources.tvmaze.enabled {
            runners.insert(
                Source::Tvmaze,
                Arc::new(ImportRunner::new(
                    store.clone(),
                    Arc::new(TvmazeCatalog::new(Arc::clone(&tvmaze))),
                    Arc::clone(&enrichment),
                )),
            );
        }

        if config.sources.jikan.enabled {
            let curated: Arc<dyn CuratedImport> = Arc::new(JikanCurated::new(
                Arc::clone(&jikan),
                config.sources.jikan.top_list_max_pages,
                config.sources.jikan.seasonal_min_year,
                config.sources.jikan.seasons_per_run,
            ));
            runners.insert(
                Source::Jikan,
                Arc::new(
                    ImportRunner::new(
                        store.clone(),
                        Arc::new(JikanCatalog::new(Arc::clone(&jikan))),
                        Arc::clone(&enrichment),
                    )
                    .with_curated(curated),
                ),
            );
        }

        if config.sources.anilist.enabled {
            runners.insert(
                Source::Anilist,
                Arc::new(ImportRunner::new(
                    store.clone(),
                    Arc::new(AnilistCatalog::new(Arc::clone(&anilist))),
                    Arc::clone(&enrichment),
                )),
            );
        }

        if config.sources.tmdb.enabled {
            if let Some(tmdb) = &tmdb {
                runners.insert(
                    Source::Tmdb,
                    Arc::new(ImportRunner::new(
                        store.clone(),
                        Arc::new(TmdbCatalog::new(Arc::clone(tmdb))),
                        Arc::clone(&enrichment),
                    )),
                );
            }
        }

        if config.sources.anidb.enabled {
            if let Some(anidb) = &anidb {
                runners.insert(
                    Source::Anidb,
                    Arc::new(ImportRunner::new(
                        store.clone(),
                        Arc::new(AnidbCatalog::new(Arc::clone(anidb))),
                        Arc::clone(&enrichment),
                    )),
                );
            }
        }

        info!(
            sources = runners.len(),
            "Import runners constructed: {}",
            runners
                .keys()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let backfill = Arc::new(RatingBackfillService::new(
            store.clone(),
            Arc::clone(&quota),
            Arc::clone(&enrichment),
            tmdb.clone(),
            Arc::clone(&tvmaze),
            BackfillConfig {
                batch_size: config.omdb.batch_size,
                interval_minutes: config.omdb.interval_minutes,
                lock_minutes: config.omdb.lock_minutes,
                startup_delay_secs: config.omdb.startup_delay_secs,
            },
        ));

        let sync_manager = Arc::new(SyncManager::new(
            store.clone(),
            runners.clone(),
            config.scheduler.clone(),
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            quota,
            enrichment,
            tvmaze,
            jikan,
            anilist,
            tmdb,
            anidb,
            omdb,
            runners,
            backfill,
            sync_manager,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }

    #[must_use]
    pub fn runner(&self, source: Source) -> Option<&Arc<ImportRunner>> {
        self.runners.get(&source)
    }
}
