pub mod models {
    pub mod agri;
}

pub mod client;
pub mod config;
pub mod observable;
pub mod session;
pub mod storage;
pub mod transport;
pub mod services {
    pub mod polling;
    pub mod recommendation;
}
pub mod views;

use crate::client::AgriClient;
use crate::config::Config;
use crate::models::agri::{AnomalyEvent, AnomalyId, FarmId, NewAccount, PlotId, SensorType, Severity};
use crate::session::SessionStore;
use crate::storage::FileStorage;
use crate::transport::UreqTransport;
use crate::views::ViewError;
use crate::views::alerts::{AlertFilter, AlertsView};
use crate::views::dashboard::DashboardView;
use crate::views::plot_detail::PlotDetailView;
use log::{error, info};
use std::path::PathBuf;
use std::rc::Rc;

const USAGE: &str = "usage: agri-monitor [--env-file PATH] <command>

commands:
  login [USER] [PASS]      obtain tokens and store the session
  logout                   clear the stored session
  whoami [--refresh]       show the session user
  refresh-token            exchange the refresh token for a new access token
  register USER EMAIL PASS create an account
  farms                    list farms
  plots [--farm ID]        list plots
  dashboard                watch the dashboard
  alerts [--severity S]    watch anomalies
  plot ID                  watch one plot
  recommend ID [--force]   generate a recommendation for an anomaly
  resolve ID               mark an anomaly resolved
  apply ID                 apply the stored recommendation of an anomaly";

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

#[derive(Debug)]
struct Cli {
    env_file: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_cli(args: impl Iterator<Item = String>) -> Result<Cli, String> {
    let mut args = args.peekable();
    let mut env_file: Option<PathBuf> = None;

    while let Some(arg) = args.next_if(|a| a.starts_with("--")) {
        match arg.as_str() {
            "--env-file" => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
                env_file = Some(PathBuf::from(value));
            }
            s if s.starts_with("--env-file=") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let path_str = &s["--env-file=".len()..];
                if path_str.is_empty() {
                    return Err("`--env-file` requires a path argument".to_string());
                }
                env_file = Some(PathBuf::from(path_str));
            }
            "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unrecognised argument: {}\n\n{}", other, USAGE)),
        }
    }

    let command: Vec<String> = args.collect();
    if command.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok(Cli { env_file, command })
}

/// Values already present in the process environment win over the file.
fn load_env(env_file: Option<PathBuf>) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = env_file {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        dotenvy::from_path(&path).map_err(|e| format!("failed to load {}: {}", path.display(), e))?;
        return Ok(Some(LoadedEnvFile { path, explicit: true }));
    }
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(LoadedEnvFile { path, explicit: false })),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(format!("failed to load .env: {}", e)),
    }
}

fn parse_id(raw: Option<&String>, what: &str) -> Result<i64, String> {
    let raw = raw.ok_or_else(|| format!("missing {} id", what))?;
    raw.parse::<i64>().map_err(|_| format!("invalid {} id: {}", what, raw))
}

fn parse_severity(raw: &str) -> Result<Severity, String> {
    match raw.to_lowercase().as_str() {
        "low" => Ok(Severity::Low),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        other => Err(format!("unknown severity: {} (expected low, medium or high)", other)),
    }
}

/// Value following `flag`, if the flag is present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a String>, String> {
    match args.iter().position(|a| a == flag) {
        Some(i) => args
            .get(i + 1)
            .map(Some)
            .ok_or_else(|| format!("`{}` requires a value", flag)),
        None => Ok(None),
    }
}

fn view_err(e: ViewError) -> String {
    match e {
        ViewError::SessionExpired => "session expired; run `agri-monitor login` again".to_string(),
        other => other.to_string(),
    }
}

fn print_anomaly(a: &AnomalyEvent) {
    let when = a
        .detected_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let state = if a.resolved { "resolved" } else { "open" };
    println!(
        "#{:<5} {:<7} {:<28} {:<16} {} conf={:.2} {}",
        a.id.0,
        a.severity.as_str(),
        a.anomaly_type,
        a.plot_label(),
        when,
        a.confidence,
        state
    );
    if let Some(r) = &a.recommendation {
        println!("       -> {} ({:.0}%)", r.action, r.confidence * 100.0);
    }
}

fn print_dashboard(view: &DashboardView) {
    let state = view.state();
    if let Some(e) = &state.error {
        println!("! {}", e);
    }
    let s = &state.stats;
    println!(
        "farms={} plots={} anomalies={} active_alerts={}",
        s.total_farms, s.total_plots, s.total_anomalies, s.active_alerts
    );
    let by_status = view
        .plots_by_status()
        .iter()
        .map(|(k, v)| format!("{:?}={}", k, v).to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    println!("plots by status: {}", by_status);
    for p in view.plots_needing_attention() {
        println!("  attention: plot {} {} ({:?}, {} anomalies)", p.id.0, p.crop_variety, p.status, p.anomaly_count);
    }
    println!("recent anomalies:");
    for a in &state.recent_anomalies {
        print_anomaly(a);
    }
    println!("{}", view.poller().label());
}

fn print_alerts(view: &AlertsView) {
    let state = view.state();
    if let Some(e) = &state.error {
        println!("! {}", e);
    }
    let c = view.severity_counts();
    println!("open={} high={} medium={} low={}", c.unresolved, c.high, c.medium, c.low);
    for a in view.visible() {
        print_anomaly(&a);
    }
    println!("{}", view.poller().label());
}

fn print_plot(view: &PlotDetailView) {
    let state = view.state();
    if let Some(e) = &state.error {
        println!("! {}", e);
    }
    if let Some(p) = &state.plot {
        println!("plot {} {} ({:?}, {} anomalies)", p.id.0, p.crop_variety, p.status, p.anomaly_count);
    }
    for sensor in [SensorType::Temperature, SensorType::Humidity, SensorType::SoilMoisture] {
        if let Some(point) = view.latest(sensor) {
            let n = state.series.get(&sensor).map_or(0, Vec::len);
            println!(
                "  {:?}: {:.1}{} at {} ({} readings)",
                sensor,
                point.value,
                sensor.unit(),
                point.timestamp.format("%Y-%m-%d %H:%M"),
                n
            );
        }
    }
    for a in &state.anomalies {
        print_anomaly(a);
    }
    println!("{}", view.poller().label());
}

fn require_login(session: &SessionStore) -> Result<(), String> {
    if session.is_logged_in() {
        Ok(())
    } else {
        Err("not logged in; run `agri-monitor login` first".to_string())
    }
}

fn run(cfg: Config, command: &[String]) -> Result<(), String> {
    let storage = Rc::new(FileStorage::open(&cfg.session_file));
    let session = SessionStore::rehydrate(storage);
    let transport = Rc::new(UreqTransport::new(&cfg.api_base_url, cfg.http_timeout));
    let client = AgriClient::new(transport, session.clone());
    let _session_log = session.subscribe(|s| {
        info!(
            "Session changed: logged_in={} role={}",
            s.logged_in,
            s.role.map(|r| r.as_str()).unwrap_or("-")
        );
    });

    let (name, args) = command.split_first().ok_or_else(|| USAGE.to_string())?;
    match name.as_str() {
        "login" => {
            let username = args
                .first()
                .cloned()
                .or(cfg.username.clone())
                .ok_or("missing username (argument or AGRI_USERNAME)")?;
            let password = args
                .get(1)
                .cloned()
                .or(cfg.password.clone())
                .ok_or("missing password (argument or AGRI_PASSWORD)")?;
            let user = session
                .login(&client, &username, &password)
                .map_err(|e| format!("login failed: {}", e))?;
            println!("Logged in as {} ({})", user.display_name(), user.role.as_str());
        }
        "logout" => {
            session.logout();
            println!("Logged out");
        }
        "whoami" => {
            require_login(&session)?;
            let user = if args.iter().any(|a| a == "--refresh") {
                session.refresh_profile(&client).map_err(|e| e.to_string())?
            } else {
                session.current_user().ok_or("no stored user")?
            };
            println!(
                "{} <{}> id={} role={}",
                user.display_name(),
                user.email.as_deref().unwrap_or("-"),
                user.id.0,
                user.role.as_str()
            );
        }
        "refresh-token" => {
            session.refresh_token(&client).map_err(|e| format!("token refresh failed: {}", e))?;
            println!("Access token refreshed");
        }
        "register" => {
            let [username, email, password] = args else {
                return Err("usage: register USER EMAIL PASS".to_string());
            };
            let account = NewAccount {
                username: username.clone(),
                email: email.clone(),
                password: password.clone(),
                first_name: None,
                last_name: None,
            };
            client
                .register(&account)
                .map_err(|e| format!("registration failed: {}", e))?;
            println!("Account {} created; run `agri-monitor login` to sign in", username);
        }
        "farms" => {
            require_login(&session)?;
            let farms = session.check_auth(client.list_farms()).map_err(|e| e.to_string())?;
            for f in farms {
                println!("#{:<5} {:<24} {:>8.2} ha  {}", f.id.0, f.location, f.size, f.crop_type);
            }
        }
        "plots" => {
            require_login(&session)?;
            let farm = flag_value(args, "--farm")?
                .map(|raw| parse_id(Some(raw), "farm").map(FarmId))
                .transpose()?;
            let plots = session.check_auth(client.list_plots(farm)).map_err(|e| e.to_string())?;
            for p in plots {
                println!(
                    "#{:<5} {:<24} {:?} anomalies={} farm={}",
                    p.id.0,
                    p.crop_variety,
                    p.status,
                    p.anomaly_count,
                    p.farm.map(|f| f.0.to_string()).unwrap_or_else(|| "-".to_string())
                );
            }
        }
        "dashboard" => {
            require_login(&session)?;
            let view = DashboardView::new(client, cfg.dashboard_cadence);
            view.load().map_err(view_err)?;
            print_dashboard(&view);
            view.run(cfg.max_poll_cycles, print_dashboard);
            require_login(&session)?;
        }
        "alerts" => {
            require_login(&session)?;
            let view = AlertsView::new(client, cfg.alerts_cadence);
            let severity = flag_value(args, "--severity")?.map(|s| parse_severity(s)).transpose()?;
            view.set_filter(AlertFilter {
                severity,
                ..Default::default()
            });
            view.load().map_err(view_err)?;
            print_alerts(&view);
            view.run(cfg.max_poll_cycles, print_alerts);
            require_login(&session)?;
        }
        "plot" => {
            require_login(&session)?;
            let plot_id = PlotId(parse_id(args.first(), "plot")?);
            let view = PlotDetailView::new(client, plot_id, cfg.dashboard_cadence);
            view.load().map_err(view_err)?;
            print_plot(&view);
            view.run(cfg.max_poll_cycles, print_plot);
            require_login(&session)?;
        }
        "recommend" => {
            require_login(&session)?;
            let anomaly_id = AnomalyId(parse_id(args.first(), "anomaly")?);
            let force = args.iter().any(|a| a == "--force");
            let view = AlertsView::new(client, cfg.alerts_cadence);
            view.load().map_err(view_err)?;
            let rec = view.generate_recommendation(anomaly_id, force).map_err(view_err)?;
            println!("{} ({:.0}% confidence, {:?})", rec.action, rec.confidence * 100.0, rec.origin);
            println!("{}", rec.explanation);
        }
        "resolve" => {
            require_login(&session)?;
            let anomaly_id = AnomalyId(parse_id(args.first(), "anomaly")?);
            let view = AlertsView::new(client, cfg.alerts_cadence);
            view.resolve(anomaly_id).map_err(view_err)?;
            println!("Anomaly {} resolved", anomaly_id.0);
        }
        "apply" => {
            require_login(&session)?;
            let anomaly_id = AnomalyId(parse_id(args.first(), "anomaly")?);
            let view = AlertsView::new(client, cfg.alerts_cadence);
            view.load().map_err(view_err)?;
            view.apply_recommendation(anomaly_id).map_err(view_err)?;
            println!("Recommendation for anomaly {} applied", anomaly_id.0);
        }
        other => return Err(format!("unknown command: {}\n\n{}", other, USAGE)),
    }
    Ok(())
}

fn main() {
    let cli = match parse_cli(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
    };
    let loaded_env = match load_env(cli.env_file) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "agri-monitor {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    let result = Config::from_env().and_then(|cfg| {
        info!(
            "Config loaded (api={}, session_file={}, alerts_every={}s, dashboard_every={}s)",
            cfg.api_base_url,
            cfg.session_file.display(),
            cfg.alerts_cadence.period().as_secs(),
            cfg.dashboard_cadence.period().as_secs()
        );
        run(cfg, &cli.command)
    });
    if let Err(e) = result {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn env_file_flag_precedes_command() {
        let cli = parse_cli(args(&["--env-file", "prod.env", "alerts", "--severity", "high"])).unwrap();
        assert_eq!(cli.env_file, Some(PathBuf::from("prod.env")));
        assert_eq!(cli.command, vec!["alerts", "--severity", "high"]);

        let cli = parse_cli(args(&["--env-file=dev.env", "farms"])).unwrap();
        assert_eq!(cli.env_file, Some(PathBuf::from("dev.env")));
    }

    #[test]
    fn bad_invocations_are_rejected() {
        assert!(parse_cli(args(&[])).is_err());
        assert!(parse_cli(args(&["--env-file"])).is_err());
        assert!(parse_cli(args(&["--env-file=a", "--env-file=b", "farms"])).is_err());
        assert!(parse_cli(args(&["--verbose", "farms"])).is_err());
    }

    #[test]
    fn flag_values_and_ids_parse() {
        let cmd: Vec<String> = vec!["--farm".into(), "7".into()];
        let farm = flag_value(&cmd, "--farm").unwrap();
        assert_eq!(parse_id(farm, "farm"), Ok(7));
        assert!(flag_value(&cmd[..1], "--farm").is_err());
        assert_eq!(flag_value(&cmd, "--severity"), Ok(None));
        assert!(parse_id(Some(&"x".to_string()), "plot").is_err());
        assert_eq!(parse_severity("HIGH"), Ok(Severity::High));
        assert!(parse_severity("critical").is_err());
    }
}
