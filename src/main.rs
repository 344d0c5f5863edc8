use clanstats::{
    achievement::{
        AchievementEvaluator, AchievementRepository, InMemoryAchievementRepository,
        PostgresAchievementRepository,
    },
    activity::{
        ActivityRepository, ActivityTracker, InMemoryActivityRepository,
        PostgresActivityRepository,
    },
    client::ClashApiClient,
    config::Config,
    delta::{DeltaRepository, DeltaService, InMemoryDeltaRepository, PostgresDeltaRepository},
    http,
    jobs::{spawn_schedulers, Pipeline},
    notification::NotificationBus,
    passport::{InMemoryPassportDirectory, PassportDirectory, PostgresPassportDirectory},
    period::{
        InMemoryPeriodSummaryRepository, PeriodService, PeriodSummaryRepository,
        PostgresPeriodSummaryRepository,
    },
    shared::AppState,
    snapshot::{InMemorySnapshotRepository, PostgresSnapshotRepository, SnapshotRepository, SnapshotStore},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Storage backends selected at startup
struct Stores {
    snapshots: Arc<dyn SnapshotRepository>,
    deltas: Arc<dyn DeltaRepository>,
    summaries: Arc<dyn PeriodSummaryRepository>,
    activity: Arc<dyn ActivityRepository>,
    awards: Arc<dyn AchievementRepository>,
    directory: Arc<dyn PassportDirectory>,
}

impl Stores {
    fn in_memory() -> Self {
        Self {
            snapshots: Arc::new(InMemorySnapshotRepository::new()),
            deltas: Arc::new(InMemoryDeltaRepository::new()),
            summaries: Arc::new(InMemoryPeriodSummaryRepository::new()),
            activity: Arc::new(InMemoryActivityRepository::new()),
            awards: Arc::new(InMemoryAchievementRepository::new()),
            directory: Arc::new(InMemoryPassportDirectory::new()),
        }
    }

    async fn postgres(database_url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = sqlx::PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");

        Ok(Self {
            snapshots: Arc::new(PostgresSnapshotRepository::new(pool.clone())),
            deltas: Arc::new(PostgresDeltaRepository::new(pool.clone())),
            summaries: Arc::new(PostgresPeriodSummaryRepository::new(pool.clone())),
            activity: Arc::new(PostgresActivityRepository::new(pool.clone())),
            awards: Arc::new(PostgresAchievementRepository::new(pool.clone())),
            directory: Arc::new(PostgresPassportDirectory::new(pool)),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clanstats=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clanstats");

    let config = Config::from_env();
    config.require_tokens()?;

    let stores = match &config.database_url {
        Some(url) => Stores::postgres(url).await?,
        None => {
            warn!("DATABASE_URL not set, using in-memory storage");
            Stores::in_memory()
        }
    };

    let client = Arc::new(ClashApiClient::new(&config.clash)?);

    let bus = Arc::new(NotificationBus::new());
    let _log_subscriber = bus.spawn_log_subscriber();

    let evaluator = Arc::new(
        AchievementEvaluator::builder(stores.activity.clone(), stores.awards.clone())
            .with_sink(bus.clone())
            .build(),
    );
    let snapshots = Arc::new(SnapshotStore::new(
        stores.snapshots.clone(),
        config.schedule.day_offset,
    ));
    let deltas = Arc::new(DeltaService::new(
        stores.snapshots.clone(),
        stores.deltas.clone(),
        stores.activity.clone(),
        stores.directory.clone(),
    ));
    let periods = Arc::new(PeriodService::new(stores.deltas.clone(), stores.summaries.clone()));
    let tracker = Arc::new(ActivityTracker::new(
        stores.activity.clone(),
        evaluator.clone(),
        config.schedule.day_offset,
    ));

    let pipeline = Arc::new(
        Pipeline::builder(
            client,
            snapshots,
            deltas,
            periods.clone(),
            evaluator.clone(),
            stores.directory.clone(),
        )
        .with_sink(bus)
        .with_ingest_config(config.ingest.clone())
        .with_schedule(config.schedule.clone())
        .build(),
    );

    let shutdown = CancellationToken::new();
    let schedulers = spawn_schedulers(pipeline.clone(), shutdown.clone());

    let app_state = AppState::new(pipeline, periods, evaluator, tracker, shutdown.clone());
    let app = http::router(app_state);

    let address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Server running on http://{}", address);

    let shutdown_signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for shutdown signal");
            }
            info!("Shutdown requested");
            shutdown_signal.cancel();
        })
        .await?;

    shutdown.cancel();
    for handle in schedulers {
        if let Err(e) = handle.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
    }

    info!("clanstats stopped");
    Ok(())
}
