use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webm_probe::reader::{FileReader, HttpReader};
use webm_probe::serve::{self, ServeState};
use webm_probe::synth::SyntheticWebm;
use webm_probe::webm::{self, ScanOptions, WebmMeta};

#[derive(Parser)]
#[command(name = "webm-probe", about = "Reads WebM metadata without decoding the file", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the metadata of a local file or an http(s) URL as JSON
    Probe {
        source: String,
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Write a synthetic WebM file
    Synth(SynthArgs),
    /// Serve a directory with range support and a probe endpoint
    Serve {
        #[arg(short, long, env = "WEBM_PROBE_DIR", default_value = "recordings")]
        dir: PathBuf,
        #[arg(short, long, env = "WEBM_PROBE_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
        /// Maximum bytes sent per ranged response
        #[arg(long)]
        max_chunk: Option<u64>,
        #[command(flatten)]
        scan: ScanArgs,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Bytes from the start of the file searched for the segment header
    #[arg(long, env = "WEBM_PROBE_HEADER_SCAN_LIMIT", default_value_t = webm::DEFAULT_HEADER_SCAN_LIMIT)]
    header_scan_limit: u64,
    /// Bytes from the end of the file searched for clusters
    #[arg(long, env = "WEBM_PROBE_TAIL_WINDOW", default_value_t = webm::DEFAULT_TAIL_WINDOW)]
    tail_window: u64,
}

impl ScanArgs {
    fn options(&self) -> ScanOptions {
        ScanOptions::builder()
            .header_scan_limit(self.header_scan_limit)
            .tail_window(self.tail_window)
            .build()
    }
}

#[derive(Args)]
struct SynthArgs {
    out: PathBuf,
    #[arg(long, default_value_t = 10)]
    clusters: usize,
    /// Distance between cluster timecodes
    #[arg(long, default_value_t = 1000)]
    cluster_ms: u64,
    /// Write Info.Duration
    #[arg(long)]
    duration: bool,
    /// Write a Cues index referenced from a SeekHead
    #[arg(long)]
    cues: bool,
    /// Leave the Segment size unknown, as a live recorder does
    #[arg(long)]
    unknown_size: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,tower_http=info", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Probe { source, scan } => {
            let meta = probe(&source, &scan.options()).await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Command::Synth(args) => synth(args).await?,
        Command::Serve {
            dir,
            bind,
            max_chunk,
            scan,
        } => {
            let state = ServeState::with_options(dir, max_chunk, scan.options());
            let app = serve::router(state.clone());

            let listener = TcpListener::bind(bind)
                .await
                .with_context(|| format!("binding to {bind}"))?;
            info!(root = %state.root().display(), "listening on {}", listener.local_addr()?);

            axum::serve(listener, app).await.context("running server")?;
        }
    }

    Ok(())
}

async fn probe(source: &str, options: &ScanOptions) -> anyhow::Result<WebmMeta> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let reader = HttpReader::open(source)
            .await
            .with_context(|| format!("opening {source}"))?;
        webm::parse_webm_with(&reader, options)
            .await
            .with_context(|| format!("probing {}", reader.url()))
    } else {
        let reader = FileReader::open(source)
            .await
            .with_context(|| format!("opening {source}"))?;
        webm::parse_webm_with(&reader, options)
            .await
            .with_context(|| format!("probing {}", reader.path().display()))
    }
}

async fn synth(args: SynthArgs) -> anyhow::Result<()> {
    let mut file = SyntheticWebm::sample(args.clusters, args.cluster_ms);
    if args.duration {
        file = file.with_duration_ticks((args.clusters as u64 * args.cluster_ms) as f64);
    }
    if args.cues {
        file = file.with_cues_from_clusters();
    }
    if args.unknown_size {
        file = file.with_unknown_segment_size();
    }

    let bytes = file.build();
    tokio::fs::write(&args.out, &bytes)
        .await
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!(path = %args.out.display(), size = bytes.len(), "wrote synthetic file");
    Ok(())
}
