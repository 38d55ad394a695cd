//! Behaviour every [`ConnectionStream`] backend must share.
//!
//! Each check takes a factory producing fresh, disconnected streams that all
//! see the same remote tree, and the credentials that open it.

use anyhow::ensure;
use std::path::Path;
use tempfile::TempDir;

use crate::{credentials::Credentials, error::ErrorKind, stream::ConnectionStream, INVALID_FILE_SIZE};

pub async fn run_all<S, F>(factory: F, credentials: Credentials) -> anyhow::Result<()>
where
    S: ConnectionStream,
    F: Fn() -> S,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let local = tempfile::tempdir()?;

    offline_operations_fail(factory(), &credentials, &local).await?;
    disconnect_is_idempotent(factory(), &credentials).await?;
    failed_reconnect_disconnects(factory(), &credentials).await?;
    upload_exists_remove(factory(), &credentials, &local).await?;
    download_round_trip(factory(), &credentials, &local).await?;
    rename_round_trip(factory(), &credentials, &local).await?;
    search_empty_dir(factory(), &credentials).await?;
    missing_file_size(factory(), &credentials).await?;
    directory_lifecycle(factory(), &credentials).await?;
    logs_scenario(factory(), &credentials, &local).await?;
    Ok(())
}

fn local_file(dir: &TempDir, name: &str, contents: &[u8]) -> anyhow::Result<String> {
    let path = dir.path().join(name);
    std::fs::write(&path, contents)?;
    Ok(path.to_string_lossy().into_owned())
}

pub async fn offline_operations_fail<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
    local: &TempDir,
) -> anyhow::Result<()> {
    let source = local_file(local, "offline.txt", b"offline")?;
    let target = local.path().join("offline-download.txt");
    let target = target.to_string_lossy();

    ensure!(!stream.is_connected());
    ensure!(!stream.upload(&source, "offline.txt").await);
    ensure!(!stream.download("offline.txt", &target).await);
    ensure!(!stream.make_dir("offline").await);
    ensure!(!stream.change_dir("/").await);
    ensure!(!stream.remove_dir("offline").await);
    ensure!(stream.current_dir().await.is_empty());
    ensure!(stream.search_dir("*.*").await.is_empty());
    ensure!(!stream.remove("offline.txt").await);
    ensure!(!stream.rename("offline.txt", "other.txt").await);
    ensure!(!stream.exists("offline.txt").await);
    ensure!(stream.file_size("offline.txt").await == INVALID_FILE_SIZE);
    ensure!(stream.file_data("offline.txt").await.is_none());
    ensure!(!stream.command("NOOP").await);
    ensure!(stream.last_error().map(|e| e.kind()) == Some(ErrorKind::NotConnected));
    ensure!(!Path::new(target.as_ref()).exists());

    ensure!(stream.connect(credentials).await);
    ensure!(!stream.exists("offline").await);
    ensure!(!stream.exists("offline.txt").await);
    ensure!(stream.disconnect().await);
    Ok(())
}

pub async fn disconnect_is_idempotent<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
) -> anyhow::Result<()> {
    ensure!(stream.disconnect().await);

    ensure!(stream.connect(credentials).await);
    ensure!(stream.is_connected());
    ensure!(stream.last_error_code() == 0);

    ensure!(stream.disconnect().await);
    ensure!(stream.disconnect().await);
    ensure!(!stream.is_connected());
    Ok(())
}

pub async fn failed_reconnect_disconnects<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
) -> anyhow::Result<()> {
    ensure!(stream.connect(credentials).await);
    ensure!(!stream.connect(&Credentials::new("ftp://bad host")).await);
    ensure!(!stream.is_connected());
    ensure!(stream.last_error().is_some());
    ensure!(!stream.make_dir("after-failure").await);
    ensure!(stream.last_error().map(|e| e.kind()) == Some(ErrorKind::NotConnected));
    Ok(())
}

pub async fn upload_exists_remove<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
    local: &TempDir,
) -> anyhow::Result<()> {
    let source = local_file(local, "source.txt", b"round trip")?;
    let implicit = local_file(local, "implicit.txt", b"named after the source")?;

    ensure!(stream.connect(credentials).await);
    ensure!(stream.upload(&source, "x.txt").await);
    ensure!(stream.exists("x.txt").await);
    ensure!(!stream.exists("").await);
    ensure!(stream.file_data("").await.is_none());
    ensure!(stream.remove("x.txt").await);
    ensure!(!stream.exists("x.txt").await);
    ensure!(!stream.remove("x.txt").await);

    ensure!(stream.upload(&implicit, "").await);
    ensure!(stream.exists("implicit.txt").await);
    ensure!(stream.remove("implicit.txt").await);

    let missing = local.path().join("missing.txt");
    ensure!(!stream.upload(&missing.to_string_lossy(), "missing.txt").await);
    ensure!(stream.last_error().is_some());
    ensure!(!stream.exists("missing.txt").await);

    ensure!(stream.disconnect().await);
    Ok(())
}

pub async fn download_round_trip<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
    local: &TempDir,
) -> anyhow::Result<()> {
    let source = local_file(local, "report.bin", &[0, 1, 2, 3, 255])?;
    let target = local.path().join("report-copy.bin");

    ensure!(stream.connect(credentials).await);
    ensure!(stream.upload(&source, "report.bin").await);
    ensure!(stream.download("report.bin", &target.to_string_lossy()).await);
    ensure!(std::fs::read(&target)? == vec![0, 1, 2, 3, 255]);

    let missing = local.path().join("never.bin");
    ensure!(!stream.download("never.bin", &missing.to_string_lossy()).await);
    ensure!(!missing.exists());

    ensure!(stream.remove("report.bin").await);
    ensure!(stream.disconnect().await);
    Ok(())
}

pub async fn rename_round_trip<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
    local: &TempDir,
) -> anyhow::Result<()> {
    let source = local_file(local, "a.txt", b"rename me")?;

    ensure!(stream.connect(credentials).await);
    ensure!(stream.upload(&source, "a.txt").await);
    ensure!(stream.rename("a.txt", "b.txt").await);
    ensure!(!stream.exists("a.txt").await);
    ensure!(stream.exists("b.txt").await);
    ensure!(!stream.rename("a.txt", "c.txt").await);

    ensure!(stream.remove("b.txt").await);
    ensure!(stream.disconnect().await);
    Ok(())
}

pub async fn search_empty_dir<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
) -> anyhow::Result<()> {
    ensure!(stream.connect(credentials).await);
    ensure!(stream.make_dir("empty").await);
    ensure!(stream.change_dir("empty").await);
    ensure!(stream.search_dir("*.*").await.is_empty());
    ensure!(stream.search_dir("*.txt").await.is_empty());

    ensure!(stream.change_dir("..").await);
    ensure!(stream.remove_dir("empty").await);
    ensure!(stream.disconnect().await);
    Ok(())
}

pub async fn missing_file_size<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
) -> anyhow::Result<()> {
    ensure!(stream.connect(credentials).await);
    ensure!(stream.file_size("nothing-here.txt").await == INVALID_FILE_SIZE);
    ensure!(stream.last_error().map(|e| e.kind()) == Some(ErrorKind::PathNotFound));
    ensure!(stream.file_data("nothing-here.txt").await.is_none());
    ensure!(stream.disconnect().await);
    Ok(())
}

pub async fn directory_lifecycle<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
) -> anyhow::Result<()> {
    ensure!(stream.connect(credentials).await);
    ensure!(stream.make_dir("data").await);
    ensure!(!stream.make_dir("data").await);
    ensure!(!stream.change_dir("no-such-dir").await);
    ensure!(!stream.remove_dir("no-such-dir").await);
    ensure!(stream.exists("data").await);
    ensure!(!stream.exists("data/").await);

    let entry = stream.file_data("data").await;
    ensure!(entry.as_ref().map(|e| e.file_name()) == Some("data"));

    ensure!(stream.remove_dir("data").await);
    ensure!(!stream.exists("data").await);
    ensure!(stream.disconnect().await);
    Ok(())
}

pub async fn logs_scenario<S: ConnectionStream>(
    mut stream: S,
    credentials: &Credentials,
    local: &TempDir,
) -> anyhow::Result<()> {
    let source = local_file(local, "ten.txt", b"0123456789")?;

    ensure!(stream.connect(credentials).await);
    ensure!(stream.current_dir().await == "/");
    ensure!(stream.make_dir("logs").await);
    ensure!(stream.change_dir("logs").await);
    ensure!(stream.current_dir().await == "/logs");
    ensure!(stream.upload(&source, "a.txt").await);
    ensure!(stream.file_size("a.txt").await == 10);
    ensure!(stream.search_dir("*.txt").await == vec!["a.txt".to_owned()]);

    ensure!(stream.remove("a.txt").await);
    ensure!(stream.change_dir("/").await);
    ensure!(stream.remove_dir("logs").await);
    ensure!(stream.disconnect().await);
    Ok(())
}
