mod app;
mod cli;
mod core;
mod screens;
mod utils;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::app::App;
use crate::cli::{Cli, Commands};
use crate::core::docker::{ContainerEngine, DockerManager};
use crate::core::poller::Poller;
use crate::utils::{AppConfig, ContainerState};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.command.is_none());

    let config = AppConfig::load()?;
    let docker = DockerManager::new_sync(&config)?;

    match cli.command {
        None => {
            // No command - run the interactive panel
            if !docker.check_engine().await {
                eprintln!("Warning: Docker daemon is not responding; starting anyway");
            }

            let (poller, snapshot_rx, poller_handle) = Poller::new(
                docker.clone(),
                config.poll_interval(),
                config.query_timeout(),
            );
            tokio::spawn(poller.run());

            let mut app = App::new(docker, config, snapshot_rx, poller_handle);
            app.run().await?;
        }
        Some(Commands::Status { json }) => {
            handle_status(&docker, json).await?;
        }
        Some(Commands::Start { name }) => {
            docker.start_container(&name).await?;
            println!("Started {}", name);
        }
        Some(Commands::Stop { name }) => {
            docker.stop_container(&name).await?;
            println!("Stopped {}", name);
        }
        Some(Commands::Restart { name }) => {
            docker.restart_container(&name).await?;
            println!("Restarted {}", name);
        }
        Some(Commands::Remove { name }) => {
            docker.remove_container(&name).await?;
            println!("Removed {}", name);
        }
        Some(Commands::Logs { name, tail }) => {
            for line in docker.tail_logs(&name, tail).await? {
                println!("{}", line);
            }
        }
        Some(Commands::Rebuild { name }) => {
            let service = docker.resolve_compose_service(&name).await;
            println!("Rebuilding {}...", service);
            docker.rebuild_service(&service).await?;
            println!("Rebuilt {}", service);
        }
    }

    Ok(())
}

async fn handle_status(docker: &DockerManager, json: bool) -> Result<()> {
    let containers = docker.list_containers().await?;

    if json {
        let rows: Vec<_> = containers
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "name": c.name,
                    "image": c.image,
                    "status": c.status,
                    "state": c.state.as_str(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<28} {:<12} {:<24} {}", "Name", "State", "Status", "Image");
    println!("{}", "-".repeat(84));

    for container in containers {
        let state = format!("{:<12}", container.state.as_str());
        let state = match container.state {
            ContainerState::Running => state.green(),
            ContainerState::Paused | ContainerState::Restarting => state.yellow(),
            ContainerState::Exited | ContainerState::Dead => state.red(),
            _ => state.normal(),
        };

        println!(
            "{:<28} {} {:<24} {}",
            container.name, state, container.status, container.image
        );
    }

    Ok(())
}

/// Quiet by default in TUI mode so nothing scribbles over the alternate
/// screen; RUST_LOG overrides either way.
fn init_tracing(interactive: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if interactive { "off" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
