use anyhow::Context;
use chrono::Duration;
use chrono_tz::Tz;
use marquee_api::metrics::Metrics;
use marquee_api::state::{AppState, AuthConfig, WebhookSecrets};
use marquee_api::worker::{run_reminder_schedule, JobWorker};
use marquee_api::app;
use marquee_booking::notifications::{Notifier, ReminderWindow};
use marquee_booking::user_sync::UserSync;
use marquee_booking::{ExpirySweeper, JobDispatcher, PaymentOrchestrator, ReservationPolicy, ReservationService};
use marquee_catalog::{Dashboard, ShowListing, ShowPlanner};
use marquee_store::app_config::Config;
use marquee_store::{
    DbClient, EventProducer, PgBookingLedger, PgMovieStore, PgShowStore, PgUserDirectory, RedisClient,
    RedisJobQueue, SmtpMailer, StripeCheckoutGateway, TmdbCatalog,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const REMINDER_PERIOD: StdDuration = StdDuration::from_secs(8 * 60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "marquee_api=debug,marquee_booking=debug,marquee_store=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Redis
    let redis = RedisClient::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;

    // Kafka
    let events = Arc::new(EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?);

    let show_store = Arc::new(PgShowStore::new(db.pool.clone()));
    let ledger = Arc::new(PgBookingLedger::new(db.pool.clone()));
    let movies = Arc::new(PgMovieStore::new(db.pool.clone()));
    let users = Arc::new(PgUserDirectory::new(db.pool.clone()));
    let queue = RedisJobQueue::new(redis.clone(), Duration::seconds(config.worker.lease_seconds));
    let jobs = Arc::new(queue.clone());

    let gateway = Arc::new(StripeCheckoutGateway::new(config.stripe.api_key.clone()).context("Failed to build Stripe client")?);
    let catalog = Arc::new(
        TmdbCatalog::new(config.tmdb.access_token.clone(), config.tmdb.base_url.clone())
            .context("Failed to build TMDB client")?
            .with_cache(redis.clone()),
    );
    let mailer = Arc::new(
        SmtpMailer::new(
            &config.smtp.host,
            config.smtp.port,
            config.smtp.username.clone(),
            config.smtp.password.clone(),
            &config.smtp.sender,
        )
        .context("Failed to build SMTP transport")?,
    );

    let rules = &config.business_rules;
    let policy = ReservationPolicy {
        hold_timeout: Duration::seconds(rules.hold_timeout_seconds),
        max_seats: rules.max_seats_per_booking,
        currency: config.stripe.currency.clone(),
        ..ReservationPolicy::for_origin(&config.server.public_url)
    };
    let timezone: Tz = rules
        .display_timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid display_timezone {}: {}", rules.display_timezone, e))?;
    let reminders = ReminderWindow {
        lead: Duration::hours(rules.reminder_lead_hours),
        width: Duration::minutes(rules.reminder_window_minutes),
    };

    let sweeper = Arc::new(ExpirySweeper::new(
        ledger.clone(),
        show_store.clone(),
        jobs.clone(),
        events.clone(),
        Duration::seconds(rules.sweep_retry_seconds),
    ));
    let notifier = Arc::new(Notifier::new(
        ledger.clone(),
        show_store.clone(),
        movies.clone(),
        users.clone(),
        mailer,
        timezone,
        reminders,
    ));
    let dispatcher = Arc::new(JobDispatcher::new(
        sweeper,
        notifier,
        Arc::new(UserSync::new(users.clone())),
        show_store.clone(),
    ));

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);

    let app_state = AppState {
        reservations: Arc::new(ReservationService::new(
            show_store.clone(),
            show_store.clone(),
            ledger.clone(),
            gateway,
            jobs.clone(),
            movies.clone(),
            events.clone(),
            policy,
        )),
        orchestrator: Arc::new(PaymentOrchestrator::new(ledger.clone(), jobs.clone(), events)),
        planner: Arc::new(ShowPlanner::new(show_store.clone(), movies.clone(), catalog.clone(), jobs.clone())),
        listing: Arc::new(ShowListing::new(show_store.clone(), movies.clone())),
        dashboard: Arc::new(Dashboard::new(show_store.clone(), ledger.clone(), movies.clone(), users.clone())),
        shows: show_store.clone(),
        inventory: show_store,
        ledger,
        movies,
        users,
        catalog,
        jobs: jobs.clone(),
        limiter: Some(Arc::new(redis)),
        metrics: metrics.clone(),
        auth: AuthConfig {
            jwt_secret: config.auth.jwt_secret.clone(),
        },
        webhooks: WebhookSecrets {
            stripe: config.stripe.webhook_secret.clone(),
            identity: config.auth.identity_webhook_secret.clone(),
            tolerance_seconds: config.stripe.webhook_tolerance_seconds,
        },
    };

    // Background work
    let worker = JobWorker::new(
        queue,
        dispatcher,
        metrics,
        StdDuration::from_millis(config.worker.poll_interval_ms),
        config.worker.batch_size,
    );
    tokio::spawn(worker.run());
    tokio::spawn(run_reminder_schedule(jobs, REMINDER_PERIOD));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
