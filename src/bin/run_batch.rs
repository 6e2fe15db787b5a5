//! CLI: run a batch transformation over a JSON table snapshot.
//!
//! Loads the snapshot into a [MemoryTable], runs the chosen strategy over one
//! table, then writes the updated snapshot (new attachments go to `blobs/` next
//! to it) and `run.log.json` under the run directory.
//!
//! Usage: `run_batch [OPTIONS] <names|images|inspect> ...`
//! Example: run_batch --snapshot base.json images --table tbl --source photo --target cropped --ratio 1:1
//!
//! Set RUST_LOG=rowforge=trace for TRACE-level span enter/exit and events.

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use rowforge::run_log_io::{DEFAULT_RUN_DIR, RUN_LOG_FILENAME};
use rowforge::snapshot_io::{SNAPSHOT_FILENAME, load_snapshot, save_snapshot};
use rowforge::table::{FieldKind, MEMORY_SCHEME};
use rowforge::types::{DEFAULT_PAGE_SIZE, DuplicatePolicy};
use rowforge::{
  AspectRatio, AttachmentFetcher, BatchRunner, DefaultFetcher, FetchError, MappingConfig,
  MemoryTable, RunConfig, RunOptions, StrategyConfig, TableClient,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Run a batch transformation over a table snapshot.
#[derive(Parser, Debug)]
#[command(name = "run_batch")]
#[command(
  after_help = r#"Environment variables (override the matching flags when set):
  ROWFORGE_SNAPSHOT       Snapshot file to load (default: tables.json).
  ROWFORGE_RUN_DIR        Directory for run.log.json (default: .rowforge).
  ROWFORGE_TIMEOUT_SECS   Upper bound in seconds for each table or download call.

Examples:
  run_batch --snapshot base.json inspect
  run_batch --snapshot base.json images --table tbl --source photo --target square --ratio 1:1
  run_batch names --table tasks --source who --target owner \
    --mapping-table people --mapping-name-field name --mapping-user-field user"#
)]
struct Args {
  /// Snapshot file to load. Overridden by ROWFORGE_SNAPSHOT if set.
  #[arg(long, value_name = "PATH", default_value = SNAPSHOT_FILENAME)]
  snapshot: PathBuf,

  /// Where to write the updated snapshot. Default: the loaded snapshot.
  #[arg(long, value_name = "PATH")]
  output: Option<PathBuf>,

  /// Directory for run.log.json. Overridden by ROWFORGE_RUN_DIR if set.
  #[arg(long, value_name = "DIR", default_value = DEFAULT_RUN_DIR)]
  run_dir: PathBuf,

  /// Per-call timeout in seconds. Overridden by ROWFORGE_TIMEOUT_SECS if set.
  #[arg(long, value_name = "SECS")]
  timeout_secs: Option<u64>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Resolve free-text names to users through a mapping table.
  Names {
    #[arg(long)]
    table: String,
    #[arg(long)]
    source: String,
    #[arg(long)]
    target: String,
    #[arg(long)]
    mapping_table: String,
    #[arg(long)]
    mapping_name_field: String,
    #[arg(long)]
    mapping_user_field: String,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
    /// last | first | reject
    #[arg(long, default_value = "last")]
    duplicates: DuplicatePolicy,
  },
  /// Center-crop image attachments to a fixed aspect ratio.
  Images {
    #[arg(long)]
    table: String,
    #[arg(long)]
    source: String,
    #[arg(long)]
    target: String,
    /// W:H or WxH
    #[arg(long, default_value = "1:1")]
    ratio: AspectRatio,
  },
  /// List tables with their text, user and attachment fields.
  Inspect,
}

/// Serves blobs held by the snapshot table and falls back to the network/filesystem.
struct SnapshotFetcher {
  table: Arc<MemoryTable>,
  fallback: DefaultFetcher,
}

#[async_trait]
impl AttachmentFetcher for SnapshotFetcher {
  async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
    if url.starts_with(MEMORY_SCHEME) {
      self.table.fetch(url).await
    } else {
      self.fallback.fetch(url).await
    }
  }
}

fn fail(message: impl std::fmt::Display) -> ! {
  eprintln!("Error: {}", message);
  process::exit(1);
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .with_writer(std::io::stderr)
    .init();

  info!("run_batch starting");
  let args = Args::parse();

  // Env vars override flags. These are the values used by the program (not read from env again).
  let snapshot_path = env::var("ROWFORGE_SNAPSHOT")
    .ok()
    .map(PathBuf::from)
    .unwrap_or_else(|| args.snapshot.clone());
  let run_dir = env::var("ROWFORGE_RUN_DIR")
    .ok()
    .map(PathBuf::from)
    .unwrap_or_else(|| args.run_dir.clone());
  let timeout_secs = match env::var("ROWFORGE_TIMEOUT_SECS") {
    Ok(v) => match v.trim().parse::<u64>() {
      Ok(secs) => Some(secs),
      Err(_) => fail(format!("ROWFORGE_TIMEOUT_SECS must be a whole number, got {:?}", v)),
    },
    Err(_) => args.timeout_secs,
  };
  let output_path = args.output.clone().unwrap_or_else(|| snapshot_path.clone());

  info!(snapshot = %snapshot_path.display(), run_dir = %run_dir.display(), timeout_secs = ?timeout_secs, "options (env or flags)");

  let snapshot = match load_snapshot(&snapshot_path) {
    Ok(s) => s,
    Err(e) => fail(format!("reading {}: {}", snapshot_path.display(), e)),
  };
  let base_dir = snapshot_path
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_default();
  let table = Arc::new(MemoryTable::new(snapshot).with_base_dir(base_dir));

  let config = match args.command {
    Command::Inspect => {
      inspect(table.as_ref()).await;
      return;
    }
    Command::Names {
      table: table_id,
      source,
      target,
      mapping_table,
      mapping_name_field,
      mapping_user_field,
      page_size,
      duplicates,
    } => {
      let mut mapping = MappingConfig::new(mapping_table, mapping_name_field, mapping_user_field);
      mapping.page_size = page_size;
      mapping.duplicate_policy = duplicates;
      RunConfig::new(table_id, source, target, StrategyConfig::NameResolution { mapping })
    }
    Command::Images {
      table: table_id,
      source,
      target,
      ratio,
    } => RunConfig::new(table_id, source, target, StrategyConfig::ImageRatio { ratio }),
  };
  let config = match timeout_secs {
    Some(secs) => config.with_call_timeout(Duration::from_secs(secs)),
    None => config,
  };

  let fetcher = Arc::new(SnapshotFetcher {
    table: Arc::clone(&table),
    fallback: DefaultFetcher::new(),
  });
  let runner = BatchRunner::new(table.clone(), fetcher);

  let cancel = CancellationToken::new();
  let on_signal = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, stopping after the current record");
      on_signal.cancel();
    }
  });

  let mut updates = runner.progress().stream();
  let printer = tokio::spawn(async move {
    let mut last = (usize::MAX, String::new());
    while let Some(state) = updates.next().await {
      if !state.running {
        continue;
      }
      let key = (state.current_index, state.status_message.clone());
      if key != last {
        println!("[{}/{}] {}", state.current_index, state.total, state.status_message);
        last = key;
      }
    }
  });

  let result = runner
    .run(
      &config,
      RunOptions {
        run_dir: Some(run_dir.as_path()),
        cancel,
      },
    )
    .await;
  printer.abort();

  let blob_dir = output_path
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_default()
    .join("blobs");
  let blob_dir = match std::fs::create_dir_all(&blob_dir).and_then(|_| std::fs::canonicalize(&blob_dir)) {
    Ok(dir) => dir,
    Err(e) => fail(format!("creating {}: {}", blob_dir.display(), e)),
  };
  if let Err(e) = table.persist_uploads(&blob_dir).await {
    fail(format!("writing blobs to {}: {}", blob_dir.display(), e));
  }
  if let Err(e) = save_snapshot(&output_path, &table.snapshot().await) {
    fail(format!("writing {}: {}", output_path.display(), e));
  }

  println!("Run finished.");
  println!("  Status: {}", result.report.status);
  for entry in &result.report.log {
    println!("  [{:?}] {}", entry.severity, entry.message);
  }
  println!("  Report: {}", run_dir.join(RUN_LOG_FILENAME).display());
  println!("  Snapshot: {}", output_path.display());

  match result.outcome {
    Ok(summary) => {
      info!(%summary, cancelled = summary.cancelled, "run completed");
      println!("  Summary: {}", summary);
      if !summary.is_clean() {
        process::exit(1);
      }
    }
    Err(e) => {
      eprintln!("Run failed: {}", e);
      process::exit(1);
    }
  }
}

async fn inspect(table: &MemoryTable) {
  let tables = match table.list_tables().await {
    Ok(t) => t,
    Err(e) => fail(e),
  };
  for meta in tables {
    println!("{} ({})", meta.name, meta.id);
    for kind in [FieldKind::Text, FieldKind::User, FieldKind::Attachment] {
      let fields = match table.list_fields(&meta.id, Some(kind)).await {
        Ok(f) => f,
        Err(e) => fail(e),
      };
      let names: Vec<String> = fields
        .iter()
        .map(|f| format!("{} ({})", f.name, f.id))
        .collect();
      println!("  {:?}: {}", kind, names.join(", "));
    }
  }
}
