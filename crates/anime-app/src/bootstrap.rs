//! Program bootstrap (SPEC_FULL §4.12): load configuration, install telemetry, wire
//! every service in dependency order, run until shutdown, then tear down in reverse.

use std::sync::Arc;

use anime_config::{
    ConfigStore, DownloaderConfig, DownloaderType, NotificationConfig, NotificationKind, ProgramConfig,
    ProxyConfig as ConfigProxyConfig, ProxyKind as ConfigProxyKind, RssParserConfig,
};
use anime_core::Downloader;
use anime_data::DataStore;
use anime_download::{DownloadDispatchTask, DownloadQueue, DownloadSession, QbittorrentDownloader};
use anime_events::{Event, EventBus};
use anime_net::proxy::{ProxyConfig as NetProxyConfig, ProxyKind as NetProxyKind};
use anime_net::{NetClient, NetClientConfig};
use anime_notify::{BarkNotifier, Notifier, TelegramNotifier};
use anime_rename::RenameService;
use anime_scheduler::{ScheduledTask, Scheduler};
use anime_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging};
use anyhow::{Context, Result, bail};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CONFIG_PATH_ENV: &str = "ANIME_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "./config/config.json";
const DATABASE_URL_ENV: &str = "ANIME_DATABASE_URL";
const DEFAULT_DATABASE_URL: &str = "sqlite://./config/anime.db";

/// Every service the bootstrap wires together, held so they can be torn down in the
/// reverse order they were started.
struct Services {
    scheduler: Scheduler,
    background: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

/// Load configuration, wire every service, and block until shutdown is requested.
pub async fn run_app() -> Result<()> {
    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = ConfigStore::load(config_path).context("loading configuration store")?;

    let program: ProgramConfig = config.get_or_default("program").context("loading program config")?;
    init_logging(&LoggingConfig {
        level: if program.debug_enable { "debug" } else { "info" },
        format: LogFormat::infer(),
        build_sha: anime_telemetry::build_sha(),
    })
    .context("installing tracing subscriber")?;

    let _context_guard = GlobalContextGuard::new("bootstrap");
    info!("starting acquisition pipeline");

    run_app_with(config, program).await
}

async fn run_app_with(config: ConfigStore, program: ProgramConfig) -> Result<()> {
    let metrics = Metrics::new().context("building metrics registry")?;

    let proxy: ConfigProxyConfig = config.get_or_default("proxy").context("loading proxy config")?;
    let net_proxy = proxy.enable.then(|| convert_proxy(&proxy));

    let net = NetClient::new(NetClientConfig { proxy: net_proxy.clone() }).context("building network client")?;
    let identify_net = Arc::new(
        NetClient::new(NetClientConfig { proxy: net_proxy.clone() }).context("building identify network client")?,
    );

    let database_url = std::env::var(DATABASE_URL_ENV).unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let store = Arc::new(DataStore::connect(&database_url).await.context("connecting to data store")?);

    let bus = EventBus::new();

    let downloader_config: DownloaderConfig = config.get_or_default("downloader").context("loading downloader config")?;
    let downloader: Arc<dyn Downloader> = match downloader_config.kind {
        DownloaderType::Qbittorrent => {
            Arc::new(QbittorrentDownloader::new(&downloader_config).context("building qBittorrent adapter")?)
        }
        DownloaderType::Transmission => bail!("downloader.type = transmission has no adapter implemented yet"),
        DownloaderType::Aria2 => bail!("downloader.type = aria2 has no adapter implemented yet"),
    };

    let cancel = CancellationToken::new();
    let session = DownloadSession::spawn(downloader, cancel.clone());

    let queue = Arc::new(DownloadQueue::new(session.clone(), net, downloader_config.path.clone(), bus.clone()));
    let dispatch_task: Arc<dyn ScheduledTask> = Arc::new(DownloadDispatchTask::new(queue.clone()));

    let progress_handle = anime_download::progress::spawn(bus.clone(), session.clone(), store.clone(), cancel.clone());

    let rename_config = config.rename_config().context("loading rename config")?;
    let rename_handle = RenameService::new(bus.clone(), session.clone(), store.clone(), rename_config, downloader_config.path.clone())
        .spawn(cancel.clone());

    let notification_config: NotificationConfig =
        config.get_or_default("notification").context("loading notification config")?;
    let notify_net = Arc::new(
        NetClient::new(NetClientConfig { proxy: net_proxy }).context("building notification network client")?,
    );
    let notify_handle = spawn_notification_dispatch(&notification_config, &notify_net, bus.clone(), cancel.clone())?;

    let rss_parser_config: RssParserConfig = config.get_or_default("rss_parser").context("loading rss_parser config")?;
    let refresh_task: Arc<dyn ScheduledTask> = Arc::new(crate::refresh::RefreshTask::new(
        identify_net,
        store,
        queue,
        metrics,
        &rss_parser_config,
        program.rss_time,
    ));

    let scheduler = Scheduler::new();
    scheduler.start(vec![dispatch_task, refresh_task]);

    let services = Services {
        scheduler,
        background: vec![progress_handle, rename_handle, notify_handle],
        cancel,
    };

    wait_for_shutdown().await;
    info!("shutdown requested, tearing down services");
    shutdown(services).await;
    Ok(())
}

fn convert_proxy(proxy: &ConfigProxyConfig) -> NetProxyConfig {
    NetProxyConfig {
        kind: match proxy.kind {
            ConfigProxyKind::Http | ConfigProxyKind::Https => NetProxyKind::Http,
            ConfigProxyKind::Socks5 => NetProxyKind::Socks5,
        },
        host: proxy.host.clone(),
        port: proxy.port,
        username: proxy.username.clone(),
        password: proxy.password.clone(),
    }
}

/// Subscribes to [`Event::Notification`] and dispatches each message to the configured
/// sink. No component in the pipeline otherwise drains this topic.
fn spawn_notification_dispatch(
    config: &NotificationConfig,
    net: &Arc<NetClient>,
    bus: EventBus,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>> {
    if !config.enable {
        return Ok(tokio::spawn(async move {
            cancel.cancelled().await;
        }));
    }

    let notifier: Arc<dyn Notifier> = match config.kind {
        NotificationKind::Telegram => Arc::new(
            TelegramNotifier::new(net.clone(), config.token.clone(), config.chat_id.clone())
                .context("building Telegram notifier")?,
        ),
        NotificationKind::Bark => {
            Arc::new(BarkNotifier::new(net.clone(), config.token.clone(), None).context("building Bark notifier")?)
        }
    };

    Ok(tokio::spawn(async move {
        let mut stream = bus.subscribe(None);
        loop {
            let envelope = tokio::select! {
                () = cancel.cancelled() => break,
                envelope = stream.next() => envelope,
            };
            let Some(envelope) = envelope else { break };
            let Event::Notification { message } = envelope.event else {
                continue;
            };
            if let Err(err) = notifier.post(&message).await {
                warn!(error = %err, "notification delivery failed");
            }
        }
    }))
}

async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c"),
        Err(err) => warn!(error = %err, "failed to listen for ctrl-c, shutting down anyway"),
    }
}

async fn shutdown(services: Services) {
    services.cancel.cancel();
    services.scheduler.stop().await;
    for handle in services.background {
        if let Err(err) = handle.await {
            warn!(error = %err, "background task panicked during shutdown");
        }
    }
}
