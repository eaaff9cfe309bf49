use std::io::Read;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use filer_core::{Filer, InstanceRef, SweepReport, UploadFile};
use filer_crypto::DigestPipeline;
use filer_server::{FilerServer, ServerConfig};
use filer_types::ContentDigest;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::cli::*;

const READ_CHUNK: usize = 64 * 1024;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Gc(args) => cmd_gc(args, format).await,
        Command::Digest(args) => cmd_digest(args, format),
        Command::Store(args) => cmd_store(args, format).await,
        Command::Fetch(args) => cmd_fetch(args).await,
        Command::Rm(args) => cmd_rm(args).await,
    }
}

/// Defaults, then the config file, then flags.
pub fn load_config(args: &BackendArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(root) = &args.root {
        config.content_root = root.clone();
    }
    if let Some(redis) = &args.redis {
        config.redis_url = redis.clone();
    }
    Ok(config)
}

async fn open(args: &BackendArgs) -> anyhow::Result<Filer> {
    let config = load_config(args)?;
    FilerServer::open_filer(&config)
        .await
        .with_context(|| format!("opening {} with registry {}", config.content_root.display(), config.redis_url))
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.backend)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!(
        "filer on {} (root: {}, registry: {})",
        config.bind_addr.to_string().bold(),
        config.content_root.display(),
        config.redis_url
    );
    FilerServer::new(config).serve().await?;
    Ok(())
}

async fn cmd_gc(args: BackendArgs, format: OutputFormat) -> anyhow::Result<()> {
    let filer = open(&args).await?;
    let report = filer.reconciler().sweep().await?;
    match format {
        OutputFormat::Json => println!("{}", sweep_json(&report)),
        OutputFormat::Text => {
            let mark = if report.failed == 0 { "✓".green() } else { "!".yellow() };
            println!(
                "{} GC: {} blobs scanned, {} removed, {} spared, {} failed",
                mark,
                report.scanned,
                report.deleted.to_string().bold(),
                report.spared,
                report.failed
            );
        }
    }
    Ok(())
}

fn sweep_json(report: &SweepReport) -> serde_json::Value {
    json!({
        "scanned": report.scanned,
        "deleted": report.deleted,
        "spared": report.spared,
        "failed": report.failed,
    })
}

fn cmd_digest(args: DigestArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut failed = 0;
    for path in &args.paths {
        let result = digest_file(path);
        match (format, result) {
            (OutputFormat::Text, Ok(digest)) => println!("{}  {}", digest.to_hex().cyan(), path.display()),
            (OutputFormat::Json, Ok(digest)) => {
                println!("{}", json!({ "path": path.display().to_string(), "digest": digest.to_hex() }))
            }
            (_, Err(e)) => {
                failed += 1;
                eprintln!("{} {}: {e:#}", "✗".red(), path.display());
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} files could not be digested", args.paths.len());
    }
    Ok(())
}

/// Hash a local file the same way an upload is hashed.
pub fn digest_file(path: &Path) -> anyhow::Result<ContentDigest> {
    let mut file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut pipeline = DigestPipeline::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        pipeline.update(&buf[..n]);
    }
    Ok(pipeline.finalize()?)
}

async fn cmd_store(args: StoreArgs, format: OutputFormat) -> anyhow::Result<()> {
    let filer = open(&args.backend).await?;

    let mut files = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?;
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        files.push(UploadFile::new(name, args.content_type.clone(), ReaderStream::new(file)));
    }

    let mut failed = 0;
    for (name, result) in filer.store_batch(files).await {
        match (format, result) {
            (OutputFormat::Text, Ok(stored)) => println!(
                "{} {} {} ({} bytes)",
                "✓".green(),
                name.bold(),
                stored.instance.to_string().yellow(),
                stored.size
            ),
            (OutputFormat::Json, Ok(stored)) => {
                println!("{}", json!({ "file": name, "stored": stored.instance.to_string(), "size": stored.size }))
            }
            (_, Err(e)) => {
                failed += 1;
                eprintln!("{} {}: {e}", "✗".red(), name);
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} files were not stored", args.paths.len());
    }
    Ok(())
}

async fn cmd_fetch(args: FetchArgs) -> anyhow::Result<()> {
    let instance: InstanceRef = args.instance.parse()?;
    let filer = open(&args.backend).await?;
    let retrieved = filer.retrieve(&instance).await?;
    let mut reader = retrieved.blob.reader;

    match &args.output {
        Some(path) => {
            let mut out = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?;
            tokio::io::copy(&mut reader, &mut out).await?;
            out.flush().await?;
            eprintln!(
                "{} {} -> {}",
                "✓".green(),
                retrieved.metadata.name.bold(),
                path.display()
            );
        }
        None => {
            let mut out = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut out).await?;
            out.flush().await?;
        }
    }
    Ok(())
}

async fn cmd_rm(args: RmArgs) -> anyhow::Result<()> {
    let instance: InstanceRef = args.instance.parse()?;
    let filer = open(&args.backend).await?;
    filer.delete(&instance).await?;
    println!("{} Deleted {}", "✓".green(), instance.to_string().yellow());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn digest_matches_known_vector() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        assert_eq!(
            digest_file(file.path()).unwrap().to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn digest_of_empty_file_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(digest_file(file.path()).is_err());
    }

    #[test]
    fn digest_of_large_file_spans_chunks() {
        let data = vec![7u8; READ_CHUNK * 3 + 11];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        assert_eq!(digest_file(file.path()).unwrap(), ContentDigest::of(&data));
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "content_root = \"/srv/files\"\nredis_url = \"redis://cache:6379\"").unwrap();

        let args = BackendArgs {
            config: Some(file.path().to_path_buf()),
            root: None,
            redis: Some("redis://other:6379".into()),
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.content_root, std::path::PathBuf::from("/srv/files"));
        assert_eq!(config.redis_url, "redis://other:6379");
    }

    #[test]
    fn no_flags_means_defaults() {
        let config = load_config(&BackendArgs::default()).unwrap();
        assert_eq!(config, ServerConfig::default());
    }
}
