use std::sync::Arc;
use std::time::Duration;

use catalog::{Geocoder, ImageRecord, ImageService, ServiceError, StaticGeocoder};
use clap::Parser;
use dashboard::commands::{self, Command, HELP};
use dashboard::{
    Dashboard, DashboardConfig, FetchOutcome, HeadlessGlobe, HttpImageService, UploadTicket,
    run_upload,
};
use foundation::GeoCoord;
use runtime::{EventKind, RequestToken};
use scene::{GlobeRenderer, PickOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Interactive shell over the globe image dashboard.
///
/// Flags override the matching environment variables.
#[derive(Debug, Parser)]
#[command(name = "dashboard", version)]
struct Cli {
    /// Image service base URL [env: DASHBOARD_SERVICE_URL]
    #[arg(long)]
    service_url: Option<String>,

    /// Clustering distance in kilometers [env: CLUSTER_THRESHOLD_KM]
    #[arg(long)]
    cluster_threshold_km: Option<f64>,

    /// Camera altitude in meters above which clusters aggregate [env: ALTITUDE_THRESHOLD_M]
    #[arg(long)]
    altitude_threshold_m: Option<f64>,

    /// Per-request timeout in milliseconds [env: FETCH_TIMEOUT_MS]
    #[arg(long)]
    fetch_timeout_ms: Option<u64>,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 1280.0)]
    width: f64,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 720.0)]
    height: f64,

    /// Frame interval in milliseconds
    #[arg(long, default_value_t = 100)]
    frame_ms: u64,
}

impl Cli {
    fn config(&self) -> DashboardConfig {
        let mut config = DashboardConfig::from_env();
        if let Some(url) = &self.service_url {
            config = config.with_service_url(url.clone());
        }
        if let Some(km) = self.cluster_threshold_km {
            config = config.with_cluster_threshold_km(km);
        }
        if let Some(m) = self.altitude_threshold_m {
            config = config.with_altitude_threshold_m(m);
        }
        if let Some(ms) = self.fetch_timeout_ms {
            config = config.with_fetch_timeout(Duration::from_millis(ms));
        }
        config
    }
}

/// Everything the shell loop reacts to. Network completions come back
/// through the same queue as user input, so the loop is the only writer.
enum Message {
    Input(String),
    InputClosed,
    Fetched(RequestToken, Result<Vec<ImageRecord>, ServiceError>),
    Uploaded(UploadTicket, Result<ImageRecord, ServiceError>),
    Located(RequestToken, Result<GeoCoord, ServiceError>),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    let service = match HttpImageService::new(config.service_url.clone(), config.fetch_timeout) {
        Ok(service) => Arc::new(service),
        Err(err) => {
            error!("{err}");
            std::process::exit(2);
        }
    };
    let geocoder = Arc::new(StaticGeocoder::capitals());

    info!(
        service_url = %config.service_url,
        cluster_threshold_km = config.cluster_threshold_km,
        altitude_threshold_m = config.altitude_threshold_m,
        "dashboard starting"
    );

    let start = GeoCoord::new(20.0, 0.0).unwrap();
    let mut globe = HeadlessGlobe::new(cli.width, cli.height, start, 1.5e7);
    let mut dash = Dashboard::new(&config);

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    spawn_stdin_reader(tx.clone());
    spawn_fetch(&mut dash, &service, &tx);

    let mut ticker = tokio::time::interval(Duration::from_millis(cli.frame_ms.max(1)));
    let mut last_visibility = None;

    println!("{HELP}");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = dash.on_frame(&mut globe);
                if last_visibility != Some(stats.visibility) || stats.reclustered {
                    debug!(
                        frame = stats.frame,
                        reclustered = stats.reclustered,
                        clusters = stats.visibility.clusters,
                        aggregates = stats.visibility.aggregates_shown,
                        members = stats.visibility.members_shown,
                        occluded = stats.visibility.occluded,
                        "visibility changed"
                    );
                    last_visibility = Some(stats.visibility);
                }
            }
            message = rx.recv() => {
                let Some(message) = message else { break };
                let keep_running = match message {
                    Message::Input(line) => {
                        handle_line(&line, &mut dash, &mut globe, &service, &geocoder, &tx)
                    }
                    Message::InputClosed => false,
                    Message::Fetched(token, result) => {
                        match dash.finish_fetch(token, result) {
                            FetchOutcome::Loaded { accepted, rejected } => {
                                println!("loaded {accepted} image(s), skipped {rejected}");
                            }
                            FetchOutcome::Empty => println!("no images yet"),
                            FetchOutcome::Failed(_) | FetchOutcome::Stale => {}
                        }
                        true
                    }
                    Message::Uploaded(ticket, result) => {
                        if let Ok(Some(id)) = dash.finish_upload(ticket, result, &mut globe) {
                            println!("uploaded as {id}");
                        }
                        true
                    }
                    Message::Located(token, result) => {
                        if let Ok(Some(coord)) = dash.finish_locate(token, result, &mut globe) {
                            println!("pending location {:.5}, {:.5}", coord.lat(), coord.lon());
                        }
                        true
                    }
                };
                for notice in dash.drain_notices() {
                    let tag = match notice.kind {
                        EventKind::Info => "info",
                        EventKind::Warning => "warning",
                        EventKind::Error => "error",
                    };
                    println!("[{tag}] {}", notice.message);
                }
                if !keep_running {
                    break;
                }
            }
        }
    }
    info!("dashboard stopped");
}

fn spawn_stdin_reader(tx: mpsc::UnboundedSender<Message>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(Message::Input(line)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = tx.send(Message::InputClosed);
                    break;
                }
                Err(err) => {
                    warn!("stdin: {err}");
                    let _ = tx.send(Message::InputClosed);
                    break;
                }
            }
        }
    });
}

fn spawn_fetch(
    dash: &mut Dashboard,
    service: &Arc<HttpImageService>,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let token = dash.begin_fetch();
    let service = Arc::clone(service);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = service.list_images().await;
        let _ = tx.send(Message::Fetched(token, result));
    });
}

fn handle_line(
    line: &str,
    dash: &mut Dashboard,
    globe: &mut HeadlessGlobe,
    service: &Arc<HttpImageService>,
    geocoder: &Arc<StaticGeocoder>,
    tx: &mpsc::UnboundedSender<Message>,
) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    let command = match commands::parse(line) {
        Ok(command) => command,
        Err(err) => {
            println!("{err}");
            return true;
        }
    };

    match command {
        Command::Refresh => spawn_fetch(dash, service, tx),
        Command::Look { target, altitude_m } => globe.fly_to(target, altitude_m),
        Command::Click(screen) => match dash.primary_pick(screen, globe) {
            PickOutcome::Selected(selected) => println!("selected {}", selected.url),
            PickOutcome::ZoomedToCluster { center, .. } => {
                println!("zooming to {:.5}, {:.5}", center.lat(), center.lon());
            }
            PickOutcome::Nothing => {}
            PickOutcome::Blocked => println!("close the selected image first"),
        },
        Command::Place(screen) => {
            if let Some(coord) = dash.secondary_pick(screen, globe) {
                println!("pending location {:.5}, {:.5}", coord.lat(), coord.lon());
            }
        }
        Command::Locate(address) => {
            if let Ok(token) = dash.begin_locate(&address) {
                let geocoder = Arc::clone(geocoder);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = geocoder.geocode(&address).await;
                    let _ = tx.send(Message::Located(token, result));
                });
            }
        }
        Command::Upload(path) => {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    println!("cannot read {}: {err}", path.display());
                    return true;
                }
            };
            if let Ok(ticket) = dash.begin_upload(bytes) {
                let service = Arc::clone(service);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = run_upload(service.as_ref(), service.as_ref(), &ticket).await;
                    let _ = tx.send(Message::Uploaded(ticket, result));
                });
            }
        }
        Command::Close => {
            if dash.close_selection().is_none() {
                println!("nothing selected");
            }
        }
        Command::Clear => dash.clear(globe),
        Command::Markers => {
            for (key, marker) in globe.visible_markers() {
                println!(
                    "{key:?} at {:.5}, {:.5} ({:?})",
                    marker.position.lat(),
                    marker.position.lon(),
                    marker.style
                );
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
    }
    true
}
