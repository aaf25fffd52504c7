use std::process::Command;

use anyhow::Context as _;
use gwbench_testserver::TestServer;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_gwbench")
}

#[test]
fn missing_target_url_exits_2() -> anyhow::Result<()> {
    let out = Command::new(bin())
        .arg("run")
        .env_remove("TARGET_URL")
        .output()
        .context("run gwbench binary")?;

    anyhow::ensure!(
        status_code(out.status) == 2,
        "expected exit code 2, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[test]
fn invalid_duration_exits_2() -> anyhow::Result<()> {
    let out = Command::new(bin())
        .arg("run")
        .arg("--target-url")
        .arg("http://127.0.0.1:1")
        .arg("--duration")
        .arg("10x")
        .output()
        .context("run gwbench binary")?;

    anyhow::ensure!(status_code(out.status) == 2, "expected exit code 2");
    Ok(())
}

#[test]
fn unknown_mode_exits_2() -> anyhow::Result<()> {
    let out = Command::new(bin())
        .arg("run")
        .arg("--target-url")
        .arg("http://127.0.0.1:1")
        .arg("--mode")
        .arg("bogus")
        .output()
        .context("run gwbench binary")?;

    anyhow::ensure!(status_code(out.status) == 2, "expected exit code 2");
    Ok(())
}

#[test]
fn invalid_weight_override_exits_2() -> anyhow::Result<()> {
    let out = Command::new(bin())
        .arg("run")
        .arg("--target-url")
        .arg("http://127.0.0.1:1")
        .arg("--weight")
        .arg("no_such_scenario=2.0")
        .output()
        .context("run gwbench binary")?;

    anyhow::ensure!(
        status_code(out.status) == 2,
        "expected exit code 2, stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[tokio::test]
async fn passing_run_exits_0() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();

    let out = tokio::task::spawn_blocking(move || {
        Command::new(bin())
            .arg("run")
            .arg("--gateway")
            .arg("rest")
            .arg("--mode")
            .arg("iterations")
            .arg("--iterations")
            .arg("20")
            .arg("--concurrency")
            .arg("4")
            .arg("--target-url")
            .arg(&base_url)
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run gwbench binary")?;

    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 0,
        "expected exit code 0, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}

#[tokio::test]
async fn failing_threshold_exits_1() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let base_url = server.base_url().to_string();

    let out = tokio::task::spawn_blocking(move || {
        Command::new(bin())
            .arg("run")
            .arg("--gateway")
            .arg("rest")
            .arg("--mode")
            .arg("iterations")
            .arg("--iterations")
            .arg("5")
            .arg("--target-url")
            .arg(&base_url)
            // A max below zero can never pass once data exists.
            .arg("--threshold")
            .arg("http_req_duration:max<0")
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run gwbench binary")?;

    server.shutdown().await;

    anyhow::ensure!(
        status_code(out.status) == 1,
        "expected exit code 1, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );

    Ok(())
}
