use gossip_membership::membership::service::MembershipService;
use gossip_membership::membership::{NodeConfig, ProtocolMode, SuspicionState};
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

const STATS_INTERVAL: Duration = Duration::from_secs(5);

struct Args {
    bind: SocketAddr,
    introducer: Option<SocketAddr>,
    protocol: ProtocolMode,
    suspicion: bool,
    drop_rate: f64,
    log_file: Option<String>,
    verbose: bool,
}

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} --bind <addr:port> [--introducer <addr:port>] [--protocol gossip|pingack] \
         [--suspicion] [--drop-rate <0..1>] [--log-file <path>] [--verbose]",
        program
    );
    eprintln!("Example: {} --bind 127.0.0.1:5051", program);
    eprintln!(
        "Example: {} --bind 127.0.0.1:5052 --introducer 127.0.0.1:5051 --protocol pingack --suspicion",
        program
    );

    std::process::exit(1);
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("membership-node");

    let mut bind: Option<SocketAddr> = None;
    let mut introducer: Option<SocketAddr> = None;
    let mut protocol = ProtocolMode::Gossip;
    let mut suspicion = false;
    let mut drop_rate = 0.0;
    let mut log_file = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--bind", Some(v)) => {
                bind = Some(v.parse()?);
                i += 2;
            }
            ("--introducer", Some(v)) => {
                introducer = Some(v.parse()?);
                i += 2;
            }
            ("--protocol", Some(v)) => {
                protocol = v.parse().map_err(anyhow::Error::msg)?;
                i += 2;
            }
            ("--drop-rate", Some(v)) => {
                drop_rate = v.parse()?;
                i += 2;
            }
            ("--log-file", Some(v)) => {
                log_file = Some(v.clone());
                i += 2;
            }
            ("--suspicion", _) => {
                suspicion = true;
                i += 1;
            }
            ("--verbose", _) => {
                verbose = true;
                i += 1;
            }
            ("--help", _) | ("-h", _) => usage(program),
            _ => {
                i += 1;
            }
        }
    }

    let Some(bind) = bind else { usage(program) };

    Ok(Args {
        bind,
        introducer,
        protocol,
        suspicion,
        drop_rate,
        log_file,
        verbose,
    })
}

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_max_level(level).init();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    init_tracing(&args)?;

    let introducer = args.introducer.unwrap_or(args.bind);
    let mut config = NodeConfig::joining(args.bind, introducer)
        .with_protocol(args.protocol)
        .with_suspicion(args.suspicion);
    config.drop_rate = args.drop_rate;

    tracing::info!("Starting node on {}", args.bind);
    if introducer == args.bind {
        tracing::info!("Starting as introducer");
    } else {
        tracing::info!("Introducer: {}", introducer);
    }
    tracing::info!(
        "Protocol: {}, suspicion: {}, drop rate: {}",
        config.protocol,
        config.suspicion,
        config.drop_rate
    );

    // 1. Sockets (fatal on bind failure):
    let membership = MembershipService::new(config).await?;
    tracing::info!("Node identity: {}", membership.ctx.identity());

    // 2. Control surface, which is also the introducer's join endpoint:
    let control = {
        let service = membership.clone();
        tokio::spawn(async move { service.serve_control().await })
    };

    // 3. Bootstrap (fatal if the introducer is silent):
    membership.bootstrap().await?;

    // 4. Periodic loops:
    membership.clone().start().await;

    // 5. Stats reporter:
    let stats_service = membership.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);

        loop {
            interval.tick().await;
            let snapshot = stats_service.table.snapshot();
            let alive = snapshot
                .iter()
                .filter(|r| r.state == SuspicionState::Alive)
                .count();
            let traffic = stats_service.traffic.snapshot();
            tracing::info!(
                "Cluster stats: {} members, {} alive, sent={}B recv={}B dropped={}",
                snapshot.len(),
                alive,
                traffic.bytes_sent,
                traffic.bytes_received,
                traffic.datagrams_dropped
            );
            for record in snapshot {
                tracing::debug!("  - {}", record);
            }
        }
    });

    tracing::info!("Press Ctrl+C to shutdown");

    tokio::select! {
        result = control => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
