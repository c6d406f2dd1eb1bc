use clap::Parser;
use mirror_sync::{
    CollectionWatcher, EnvSecrets, FileSecrets, MirrorConfig, MirrorContext, MongoConnector,
    PrimaryConnection, SecondaryProvider, SecretSource, TriggerSet, Watch, WatchManager,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[clap(version = env!("CARGO_PKG_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
struct Opts {
    /// configuration file path.
    #[clap(short, long, default_value = "mirror.toml")]
    conf: String,
    /// log file path, if not specified, all log information will be output to stdout.
    #[clap(long)]
    log_path: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts: Opts = Opts::parse();
    let collector = tracing_subscriber::fmt();
    let (non_blocking, _guard) = match opts.log_path {
        Some(path) => {
            let path = Path::new(&path);
            let dir_name = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or("log path should contains a file name")?;
            let file_appender = tracing_appender::rolling::daily(dir_name, file_name);
            tracing_appender::non_blocking(file_appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };
    collector.with_writer(non_blocking).init();

    let conf = MirrorConfig::from_file(&opts.conf)?;
    let primary = PrimaryConnection::new(&conf)?;
    if let Err(e) = primary.check_permissions() {
        error!(?e, "Check permission failed.");
        std::process::exit(1);
    }

    let secrets: Box<dyn SecretSource> = match conf.get_secret_dir() {
        Some(dir) => Box::new(FileSecrets::new(dir)),
        None => Box::new(EnvSecrets),
    };
    let provider = SecondaryProvider::new(
        conf.get_secret_name(),
        conf.get_secondary_app_name(),
        secrets,
        Box::new(MongoConnector),
    );
    let ctx = Arc::new(MirrorContext::new(provider));

    let triggers = TriggerSet::register_all(conf.get_collections(), conf.get_secret_name());
    let db = primary.get_db();
    let watchers: Vec<Box<dyn Watch>> = triggers
        .iter()
        .map(|trigger| {
            info!(path = %trigger.document_path(), secret = %trigger.secret(), "Register trigger.");
            Box::new(CollectionWatcher::new(&db, trigger.clone(), ctx.clone())) as Box<dyn Watch>
        })
        .collect();

    info!(count = watchers.len(), "Starting collection watchers...");
    let manager = WatchManager::new(
        Duration::from_secs(conf.get_restart_delay_secs()),
        conf.get_max_restarts(),
    );
    if let Err(e) = manager.run(watchers) {
        error!(?e, "Mirror stopped with error.");
        return Err(e.into());
    }
    info!("All watchers finished, I'm leaving now.");
    Ok(())
}
