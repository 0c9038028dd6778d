//! `leancanvas doctor` - active health diagnostics.
//!
//! Validates configuration and probes the upstream service so problems
//! surface before a wizard session or the BFF hits them.

use std::path::Path;
use std::time::Duration;

use crate::config::{Config, ServerConfig, UpstreamConfig};
use crate::llm::probe_upstream;
use crate::settings::Settings;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run diagnostic checks and print results.
pub async fn run_doctor_command(config_path: Option<&Path>, strict: bool) -> anyhow::Result<()> {
    println!("leancanvas doctor");
    println!("=================\n");

    let mut passed = 0u32;
    let mut failed = 0u32;

    crate::bootstrap::load_env();
    check(
        "Settings file",
        check_settings_file(config_path),
        &mut passed,
        &mut failed,
    );

    let config = crate::config::load_settings(config_path)
        .and_then(|settings| Config::build(&settings))
        .map_err(|e| e.to_string());
    check(
        "Configuration",
        match &config {
            Ok(config) => CheckResult::Pass(format!(
                "upstream {}, timeout {}s",
                config.upstream.base_url,
                config.workflow.timeout.as_secs()
            )),
            Err(e) => CheckResult::Fail(e.clone()),
        },
        &mut passed,
        &mut failed,
    );

    match &config {
        Ok(config) => {
            check(
                "Upstream API key",
                check_api_key(&config.upstream),
                &mut passed,
                &mut failed,
            );
            check(
                "Upstream reachability",
                check_upstream_reachability(&config.upstream).await,
                &mut passed,
                &mut failed,
            );
            check(
                "BFF bind address",
                check_bind_address(&config.server),
                &mut passed,
                &mut failed,
            );
        }
        Err(_) => {
            for name in ["Upstream API key", "Upstream reachability", "BFF bind address"] {
                check(
                    name,
                    CheckResult::Skip("configuration invalid".to_string()),
                    &mut passed,
                    &mut failed,
                );
            }
        }
    }

    println!();
    println!("  {passed} passed, {failed} failed");

    if failed > 0 && strict {
        anyhow::bail!("doctor strict mode failed with {failed} check(s)");
    }
    Ok(())
}

// ── Individual checks ───────────────────────────────────────

fn check(name: &str, result: CheckResult, passed: &mut u32, failed: &mut u32) {
    match result {
        CheckResult::Pass(detail) => {
            *passed += 1;
            println!("  [pass] {name}: {detail}");
        }
        CheckResult::Fail(detail) => {
            *failed += 1;
            println!("  [FAIL] {name}: {detail}");
        }
        CheckResult::Skip(reason) => {
            println!("  [skip] {name}: {reason}");
        }
    }
}

#[derive(Debug, PartialEq)]
enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

fn check_settings_file(explicit: Option<&Path>) -> CheckResult {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::default_toml_path);
    match Settings::load_toml(&path) {
        Ok(Some(_)) => CheckResult::Pass(format!("loaded {}", path.display())),
        Ok(None) if explicit.is_some() => {
            CheckResult::Fail(format!("{} does not exist", path.display()))
        }
        Ok(None) => CheckResult::Skip(format!("{} not found, using defaults", path.display())),
        Err(e) => CheckResult::Fail(e),
    }
}

fn check_api_key(upstream: &UpstreamConfig) -> CheckResult {
    if upstream.has_api_key() {
        CheckResult::Pass("DIFY_API_KEY is set".to_string())
    } else {
        CheckResult::Fail(
            "DIFY_API_KEY is not set; add it to .env or ~/.leancanvas/.env".to_string(),
        )
    }
}

async fn check_upstream_reachability(upstream: &UpstreamConfig) -> CheckResult {
    let health = probe_upstream(upstream, PROBE_TIMEOUT.min(upstream.timeout)).await;
    if health.is_healthy() {
        CheckResult::Pass(format!("{} ({})", health.url, health.detail))
    } else {
        CheckResult::Fail(format!(
            "{} {}: {}",
            health.url,
            health.state.as_str(),
            health.detail
        ))
    }
}

fn check_bind_address(server: &ServerConfig) -> CheckResult {
    let addr = match server.socket_addr() {
        Ok(addr) => addr,
        Err(e) => return CheckResult::Fail(e.to_string()),
    };
    match std::net::TcpListener::bind(addr) {
        Ok(listener) => {
            drop(listener);
            CheckResult::Pass(format!("{addr} is available"))
        }
        Err(error) => CheckResult::Fail(format!(
            "{addr} is unavailable ({error}); free the port or change BFF_PORT"
        )),
    }
}
