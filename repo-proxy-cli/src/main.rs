use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use error::AppError;
use repo_proxy::{
    CachingProxy, CachingProxyConfig, CooperationConfig, CooperationRegistry, HttpProxyConfig,
    HttpRemoteFormat, ProxyAuth, ProxyType, ThreadLimitScope,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;
mod error;
mod storm;
mod utils;

use cli::CliArgs;
use storm::{Tally, run_round};
use utils::{format_duration, parse_duration, parse_headers};

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

fn init_logging(args: &CliArgs) -> Result<(), AppError> {
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = FmtSubscriber::builder().with_env_filter(filter);

    let result = if let Some(path) = &args.log_file {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let subscriber = builder
            .with_writer(MakeWriterExt::and(std::io::stdout, log_file))
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        tracing::subscriber::set_global_default(builder.with_ansi(true).finish())
    };

    result.map_err(|e| AppError::Initialization(e.to_string()))
}

fn proxy_config(args: &CliArgs) -> Option<HttpProxyConfig> {
    let url = args.proxy.as_ref()?;
    let proxy_type = match args.proxy_type.as_str() {
        "http" => ProxyType::Http,
        "https" => ProxyType::Https,
        "socks5" => ProxyType::Socks5,
        _ => ProxyType::All,
    };

    // Configure proxy authentication if both username and password are provided
    let auth = match (&args.proxy_user, &args.proxy_pass) {
        (Some(username), Some(password)) => Some(ProxyAuth {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };

    info!(
        proxy_url = %url,
        proxy_type = ?proxy_type,
        has_auth = auth.is_some(),
        "Using explicit proxy configuration for upstream"
    );

    Some(HttpProxyConfig {
        url: url.clone(),
        proxy_type,
        auth,
    })
}

fn build_config(args: &CliArgs) -> Result<CachingProxyConfig, AppError> {
    let scope = if args.global_limit {
        ThreadLimitScope::Global
    } else {
        ThreadLimitScope::PerKey
    };
    let cooperation = CooperationConfig::new(
        !args.no_cooperation,
        parse_duration(&args.passive_timeout)?,
        parse_duration(&args.active_timeout)?,
        args.thread_limit,
    )
    .with_thread_limit_scope(scope);

    let mut builder = CachingProxyConfig::builder()
        .with_name("cli")
        .with_remote_url(args.remote_url.clone())
        .with_cooperation_config(cooperation)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_headers(parse_headers(&args.headers)?);

    if let Some(max_age) = &args.content_max_age {
        builder = builder.with_content_max_age(Some(parse_duration(max_age)?));
    }

    builder = if args.no_proxy {
        info!("All proxy settings disabled (--no-proxy flag)");
        builder.with_system_proxy(false)
    } else if let Some(proxy) = proxy_config(args) {
        builder.with_proxy(proxy)
    } else {
        builder.with_system_proxy(true)
    };

    Ok(builder.build())
}

fn print_summary(label: &str, tally: &Tally, elapsed: Duration) {
    println!(
        "{label}: {} requests in {} | ok {} | rejected {} | timed out {} | failed {} | {} bytes",
        tally.total(),
        format_duration(elapsed),
        tally.ok,
        tally.rejected,
        tally.timed_out,
        tally.failed,
        tally.bytes
    );
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();
    init_logging(&args)?;

    let config = build_config(&args)?;
    info!(
        remote = %config.remote_url,
        cooperation = ?config.cooperation,
        clients = args.clients,
        rounds = args.rounds,
        "Starting request storm"
    );

    let format = Arc::new(HttpRemoteFormat::from_config(&config)?);
    let proxy = Arc::new(CachingProxy::from_config(
        &config,
        format.clone(),
        Arc::new(CooperationRegistry::new()),
    ));

    let started = Instant::now();
    let mut totals = Tally::default();
    for round in 1..=args.rounds {
        let round_started = Instant::now();
        let tally = run_round(&proxy, &args.paths, args.clients).await?;
        print_summary(&format!("round {round}"), &tally, round_started.elapsed());
        totals.merge(&tally);
    }

    print_summary("total", &totals, started.elapsed());
    println!(
        "upstream requests: {} | cache hits: {} | distinct paths: {}",
        format.upstream_requests(),
        format.cache_hits(),
        args.paths.len()
    );
    Ok(())
}
