/// Docker and Docker Compose integration
///
/// Wraps the engine client behind the `ContainerEngine` trait consumed by
/// the poller, and exposes the lifecycle operations the panel dispatches.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use bollard::container::{
    ListContainersOptions, LogsOptions, RemoveContainerOptions, Stats, StatsOptions,
};
use bollard::models::ContainerSummary;
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use thiserror::Error;

use crate::core::metrics::RawSample;
use crate::utils::constants::COMPOSE_SERVICE_LABEL;
use crate::utils::{AppConfig, ContainerState};

/// Engine failure taxonomy. `Unreachable` degrades a whole poll cycle;
/// the other variants are isolated to a single container's row.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unreachable: {0}")]
    Unreachable(String),

    #[error("query for {name} failed: {reason}")]
    Query { name: String, reason: String },

    #[error("{name}: missing or malformed {field}")]
    Malformed { name: String, field: &'static str },
}

/// One container as reported by the engine's list endpoint.
#[derive(Debug, Clone)]
pub struct ContainerBrief {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub state: ContainerState,
    pub compose_service: Option<String>,
}

/// The slice of the engine the poller depends on. Kept narrow so poll
/// cycles can be exercised against a stub in tests.
pub trait ContainerEngine {
    /// List all containers known to the engine, including non-running ones.
    async fn list_containers(&self) -> Result<Vec<ContainerBrief>, EngineError>;

    /// Fetch one two-point counter reading for a container.
    async fn sample_counters(&self, name: &str) -> Result<RawSample, EngineError>;

    /// Fetch a container's start timestamp.
    async fn started_at(&self, name: &str) -> Result<DateTime<Utc>, EngineError>;
}

#[derive(Clone)]
pub struct DockerManager {
    docker: Docker,
    compose: Vec<String>,
    project_root: Option<PathBuf>,
}

impl DockerManager {
    /// Create a new Docker manager (synchronous, used before the UI starts)
    pub fn new_sync(config: &AppConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon. Is Docker running?")?;

        let compose = config
            .compose_command
            .clone()
            .filter(|cmd| !cmd.is_empty())
            .unwrap_or_else(detect_compose_command);

        let project_root = config
            .project_root
            .as_ref()
            .map(PathBuf::from)
            .or_else(find_project_root);

        Ok(Self {
            docker,
            compose,
            project_root,
        })
    }

    /// Check if the Docker daemon is accessible
    pub async fn check_engine(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    /* ───────────── lifecycle operations ───────────── */

    pub async fn start_container(&self, name: &str) -> Result<()> {
        self.docker
            .start_container::<String>(name, None)
            .await
            .with_context(|| format!("Failed to start {}", name))?;
        Ok(())
    }

    pub async fn stop_container(&self, name: &str) -> Result<()> {
        self.docker
            .stop_container(name, None)
            .await
            .with_context(|| format!("Failed to stop {}", name))?;
        Ok(())
    }

    pub async fn restart_container(&self, name: &str) -> Result<()> {
        self.docker
            .restart_container(name, None)
            .await
            .with_context(|| format!("Failed to restart {}", name))?;
        Ok(())
    }

    pub async fn remove_container(&self, name: &str) -> Result<()> {
        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .with_context(|| format!("Failed to remove {}", name))?;
        Ok(())
    }

    /// Fetch the last `tail` lines of a container's log output.
    pub async fn tail_logs(&self, name: &str, tail: usize) -> Result<Vec<String>> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(name, Some(options));
        let mut lines = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Failed to read logs for {}", name))?;
            let text = chunk.to_string();
            for line in text.lines() {
                lines.push(line.to_string());
            }
        }

        Ok(lines)
    }

    /* ───────────── compose integration ───────────── */

    /// Map a container back to its compose service name, falling back to the
    /// container name when the label is absent.
    pub async fn resolve_compose_service(&self, name: &str) -> String {
        match self.list_containers().await {
            Ok(briefs) => briefs
                .into_iter()
                .find(|b| b.name == name)
                .and_then(|b| b.compose_service)
                .unwrap_or_else(|| name.to_string()),
            Err(_) => name.to_string(),
        }
    }

    /// Rebuild a compose service: build it, then bring it back up detached.
    /// Nonzero exit status of either step is a failure.
    pub async fn rebuild_service(&self, service: &str) -> Result<()> {
        self.compose_command(&["build", service]).await?;
        self.compose_command(&["up", "-d", service]).await?;
        Ok(())
    }

    async fn compose_command(&self, args: &[&str]) -> Result<String> {
        let root = self.project_root.as_ref().ok_or_else(|| {
            anyhow!("No compose project found; set project_root in the config file")
        })?;

        let mut cmd = tokio::process::Command::new(&self.compose[0]);
        cmd.args(&self.compose[1..])
            .args(args)
            .current_dir(root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .context("Failed to execute compose command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "compose {} failed: {}",
                args.join(" "),
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl ContainerEngine for DockerManager {
    async fn list_containers(&self) -> Result<Vec<ContainerBrief>, EngineError> {
        let options = Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        });

        let containers = self
            .docker
            .list_containers(options)
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;

        Ok(containers.into_iter().map(summary_to_brief).collect())
    }

    async fn sample_counters(&self, name: &str) -> Result<RawSample, EngineError> {
        // stream:false makes the daemon take both readings itself; the
        // previous sample arrives in the same response as precpu counters.
        let mut stats_stream = self.docker.stats(
            name,
            Some(StatsOptions {
                stream: false,
                one_shot: false,
            }),
        );

        match stats_stream.next().await {
            Some(Ok(stats)) => Ok(raw_sample(&stats)),
            Some(Err(e)) => Err(EngineError::Query {
                name: name.to_string(),
                reason: e.to_string(),
            }),
            None => Err(EngineError::Query {
                name: name.to_string(),
                reason: "no stats returned".to_string(),
            }),
        }
    }

    async fn started_at(&self, name: &str) -> Result<DateTime<Utc>, EngineError> {
        let inspect = self
            .docker
            .inspect_container(name, None)
            .await
            .map_err(|e| EngineError::Query {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let started = inspect
            .state
            .as_ref()
            .and_then(|s| s.started_at.as_deref())
            .ok_or(EngineError::Malformed {
                name: name.to_string(),
                field: "State.StartedAt",
            })?;

        DateTime::parse_from_rfc3339(started)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| EngineError::Malformed {
                name: name.to_string(),
                field: "State.StartedAt",
            })
    }
}

/// Convert a ContainerSummary to a ContainerBrief
fn summary_to_brief(summary: ContainerSummary) -> ContainerBrief {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .or_else(|| summary.id.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let state = summary
        .state
        .as_deref()
        .unwrap_or("unknown")
        .into();

    let compose_service = summary
        .labels
        .as_ref()
        .and_then(|labels| labels.get(COMPOSE_SERVICE_LABEL))
        .cloned();

    ContainerBrief {
        id: summary.id.unwrap_or_default(),
        name,
        image: summary.image.unwrap_or_else(|| "unknown".to_string()),
        status: summary.status.unwrap_or_else(|| "unknown".to_string()),
        state,
        compose_service,
    }
}

/// Extract the raw counters the deriver needs from one stats response.
fn raw_sample(stats: &Stats) -> RawSample {
    let online_cpus = stats.cpu_stats.online_cpus.or_else(|| {
        stats
            .cpu_stats
            .cpu_usage
            .percpu_usage
            .as_ref()
            .map(|percpu| percpu.len() as u64)
    });

    let interfaces = stats
        .networks
        .as_ref()
        .map(|nets| nets.values().map(|n| (n.rx_bytes, n.tx_bytes)).collect())
        .unwrap_or_default();

    RawSample {
        cpu_total: stats.cpu_stats.cpu_usage.total_usage,
        precpu_total: stats.precpu_stats.cpu_usage.total_usage,
        system_cpu: stats.cpu_stats.system_cpu_usage,
        presystem_cpu: stats.precpu_stats.system_cpu_usage,
        online_cpus,
        memory_usage: stats.memory_stats.usage,
        memory_limit: stats.memory_stats.limit,
        interfaces,
    }
}

/// Prefer the standalone docker-compose binary when present, otherwise use
/// the compose plugin.
fn detect_compose_command() -> Vec<String> {
    let probe = std::process::Command::new("docker-compose")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match probe {
        Ok(status) if status.success() => vec!["docker-compose".to_string()],
        _ => vec!["docker".to_string(), "compose".to_string()],
    }
}

/// Walk up from the current directory looking for a compose file.
fn find_project_root() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        if dir.join("docker-compose.yml").exists()
            || dir.join("docker-compose.yaml").exists()
            || dir.join("compose.yaml").exists()
        {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_mapping_strips_leading_slash_and_reads_label() {
        let summary = ContainerSummary {
            id: Some("abc123".to_string()),
            names: Some(vec!["/web-1".to_string()]),
            image: Some("nginx:latest".to_string()),
            status: Some("Up 2 hours".to_string()),
            state: Some("running".to_string()),
            labels: Some(
                [(COMPOSE_SERVICE_LABEL.to_string(), "web".to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };

        let brief = summary_to_brief(summary);
        assert_eq!(brief.name, "web-1");
        assert_eq!(brief.state, ContainerState::Running);
        assert_eq!(brief.compose_service.as_deref(), Some("web"));
    }

    #[test]
    fn summary_mapping_tolerates_missing_fields() {
        let brief = summary_to_brief(ContainerSummary::default());
        assert_eq!(brief.name, "unknown");
        assert_eq!(brief.image, "unknown");
        assert_eq!(brief.state, ContainerState::Unknown);
        assert!(brief.compose_service.is_none());
    }
}
