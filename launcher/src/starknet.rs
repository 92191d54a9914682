//! Starknet family launcher (starknet-devnet).

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

use sandbox_types::{BackendKind, InstanceId, NodeInfo, TeamId};

use crate::banner::{BannerError, BannerParser, DevnetBanner};
use crate::probe::{LivenessProbe, ProbeFailure};
use crate::process::pick_free_port;
use crate::{BackendLauncher, LaunchError, LauncherConfig};

/// One devnet process per team with two pre-deployed accounts, whose
/// credentials are scraped from the startup banner.
pub struct StarknetLauncher {
    config: LauncherConfig,
}

impl StarknetLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    fn command(&self, port: u16) -> Command {
        let binary = self
            .config
            .node_binary
            .clone()
            .unwrap_or_else(|| BackendKind::Starknet.default_binary().into());
        let mut command = Command::new(binary);
        command
            .arg(format!("--port={port}"))
            .arg(format!("--accounts={}", BackendKind::Starknet.account_arity()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        command
    }
}

/// Read one line as raw bytes. Devnet output is not guaranteed to be UTF-8,
/// so invalid sequences are replaced rather than rejected. `None` on EOF.
async fn next_line<R: AsyncBufRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String> {
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let line = String::from_utf8_lossy(buf);
            Some(line.trim_end_matches(['\n', '\r']).to_string())
        }
    }
}

async fn read_banner<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    parser: &mut BannerParser,
) -> Result<DevnetBanner, BannerError> {
    let mut buf = Vec::new();
    while let Some(line) = next_line(reader, &mut buf).await {
        if parser.push_line(&line) {
            return parser.finish();
        }
    }
    // EOF before completion: report what was missing
    if parser.text().is_empty() {
        return Err(BannerError::Eof);
    }
    parser.finish()
}

#[async_trait]
impl BackendLauncher for StarknetLauncher {
    fn backend(&self) -> BackendKind {
        BackendKind::Starknet
    }

    async fn launch(&self, team: &TeamId) -> Result<NodeInfo, LaunchError> {
        let backend = BackendKind::Starknet;
        let port = pick_free_port(backend, self.config.port_low, self.config.port_high)?;

        let mut child = self.command(port).spawn().map_err(|e| LaunchError::Spawn {
            backend,
            reason: e.to_string(),
        })?;
        let pid = child.id().ok_or_else(|| LaunchError::Spawn {
            backend,
            reason: "process exited immediately".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| LaunchError::Spawn {
            backend,
            reason: "stdout not captured".into(),
        })?;
        tracing::info!(team = %team, port, pid, "starknet-devnet spawned");

        let mut reader = BufReader::new(stdout);
        let mut parser = BannerParser::new(backend.account_arity());
        let banner = match tokio::time::timeout(
            self.config.banner_timeout,
            read_banner(&mut reader, &mut parser),
        )
        .await
        {
            Ok(Ok(banner)) => banner,
            Ok(Err(e)) => {
                let _ = child.start_kill();
                return Err(e.into());
            }
            Err(_) => {
                let _ = child.start_kill();
                return Err(BannerError::Timeout.into());
            }
        };

        // keep draining so the devnet never blocks on a full pipe
        let log_team = team.clone();
        tokio::spawn(async move {
            let mut buf = Vec::new();
            while let Some(line) = next_line(&mut reader, &mut buf).await {
                tracing::trace!(team = %log_team, "devnet: {line}");
            }
        });

        let probe = LivenessProbe::starknet(format!("http://127.0.0.1:{port}"));
        match probe.wait_until_live(&self.config.probe, Some(&mut child)).await {
            Ok(attempts) => tracing::debug!(team = %team, attempts, "starknet-devnet live"),
            Err(ProbeFailure::Exited(status)) => {
                return Err(LaunchError::ExitedEarly {
                    backend,
                    status: status.to_string(),
                })
            }
            Err(ProbeFailure::Exhausted { attempts }) => {
                let _ = child.start_kill();
                return Err(LaunchError::NotLive { backend, attempts });
            }
        }

        Ok(NodeInfo {
            backend,
            port,
            accounts: banner.accounts,
            process_id: pid,
            uuid: InstanceId::random(),
            team_id: team.clone(),
            seed: Some(banner.seed),
            contract_addr: None,
        })
    }
}
