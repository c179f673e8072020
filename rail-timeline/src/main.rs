use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rail_timeline::cache::{CacheConfig, CachedFeedClient};
use rail_timeline::config::{Config, ReconcileConfig};
use rail_timeline::domain::{Direction, Signature};
use rail_timeline::feed::{FeedClient, FeedConfig};
use rail_timeline::poll::{PollTask, Scheduler};
use rail_timeline::service::ScheduleService;
use rail_timeline::stations::{StationCache, StationCacheConfig, StationDirectory};

type Service = ScheduleService<CachedFeedClient<FeedClient>>;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();
    let station = match Signature::parse(&config.station) {
        Ok(sig) => sig,
        Err(e) => {
            error!(station = %config.station, error = %e, "Invalid STATION_SIGNATURE");
            return;
        }
    };

    let mut feed_config = FeedConfig::new(&config.api_key);
    if let Some(url) = &config.base_url {
        feed_config = feed_config.with_base_url(url);
    }
    let feed = match FeedClient::new(feed_config) {
        Ok(feed) => feed,
        Err(e) => {
            error!(error = %e, "Failed to create feed client");
            return;
        }
    };
    let cached = CachedFeedClient::new(feed, &CacheConfig::default());

    let directory = StationDirectory::new().with_cache(StationCache::new(StationCacheConfig::new(
        &config.station_cache_path,
    )));
    let reconcile = ReconcileConfig::default();
    let poll = reconcile.poll.clone();
    let service = ScheduleService::new(cached, reconcile).with_directory(directory);

    spawn_event_logger(&service);

    if !service.warm_start().await {
        match service.refresh_stations().await {
            Ok(count) => info!(count, "Loaded stations"),
            Err(e) => warn!(error = %e, "Starting without station metadata"),
        }
    }
    refresh_schedule(&service, &station).await;
    log_schedule(&service, &station).await;

    let mut scheduler = Scheduler::from_config(&poll, service.now());
    let tick = scheduler.tick_interval().unwrap_or(Duration::from_secs(30));
    info!(station = %station, tick_secs = tick.as_secs(), "Polling");

    let mut interval = tokio::time::interval(tick);
    interval.tick().await; // First tick is immediate, skip it
    loop {
        interval.tick().await;
        for task in scheduler.due(service.now()) {
            debug!(task = %task, "Running task");
            match task {
                PollTask::Schedule => refresh_schedule(&service, &station).await,
                PollTask::ClockTick => log_schedule(&service, &station).await,
                PollTask::StationMetadata => {
                    if let Err(e) = service.refresh_stations().await {
                        warn!(error = %e, "Station metadata refresh failed");
                    }
                }
                PollTask::FullRefresh => service.full_refresh(std::slice::from_ref(&station)).await,
            }
        }
    }
}

async fn refresh_schedule(service: &Service, station: &Signature) {
    match service.refresh_station(station).await {
        Ok(changed) => debug!(station = %station, changed, "Schedule refreshed"),
        Err(e) => warn!(station = %station, error = %e, "Schedule refresh failed"),
    }
    if let Err(e) = service.refresh_positions().await {
        warn!(error = %e, "Position refresh failed");
    }
}

async fn log_schedule(service: &Service, station: &Signature) {
    let now = service.now();
    let schedule = service.get_station_schedule(station, now).await;
    info!(
        station = %station,
        arrivals = schedule.arrivals.len(),
        departures = schedule.departures.len(),
        "Station schedule"
    );

    for direction in [Direction::Arrivals, Direction::Departures] {
        for entry in schedule.entries(direction) {
            info!(
                direction = direction.as_str(),
                train = %entry.train,
                time = %entry.time.format("%H:%M"),
                eta = %entry.eta_label,
                status = %entry.status,
                delay = entry.delay_minutes.unwrap_or(0),
                route = entry.route_label.as_deref().unwrap_or("-"),
                track = entry.stop.track.as_deref().unwrap_or("-"),
                live = entry.is_live,
                "Entry"
            );
        }
    }
}

/// Log store changes at debug level.
fn spawn_event_logger(service: &Service) {
    let mut events = service.store().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(?event, "Store updated"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
