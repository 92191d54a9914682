//! Per-challenge collaborators: deploying the challenge onto a fresh
//! instance and deciding whether an instance has been solved.
//!
//! Both are supplied by the surrounding challenge. The command-backed
//! implementations run an external program with the instance described in
//! environment variables; the built-in solved checks issue a single
//! read-only call against the deployed artifact.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use sandbox_crypto::{evm_selector, starknet_selector};
use sandbox_launcher::JsonRpcClient;
use sandbox_types::{AccountInfo, BackendKind, NodeInfo};

/// Everything a deploy script needs to reach and fund a fresh instance.
#[derive(Clone, Debug)]
pub struct DeployContext {
    pub backend: BackendKind,
    pub rpc_url: String,
    pub accounts: Vec<AccountInfo>,
    pub seed: Option<String>,
    /// Base58 keypair able to fund accounts, for the Solana family.
    pub funder: Option<String>,
}

impl DeployContext {
    pub fn from_node(node: &NodeInfo, funder: Option<String>) -> Self {
        Self {
            backend: node.backend,
            rpc_url: node.rpc_url(),
            accounts: node.accounts.clone(),
            seed: node.seed.clone(),
            funder,
        }
    }

    pub fn deployer(&self) -> Option<&AccountInfo> {
        self.accounts.get(self.backend.deployer_index())
    }

    pub fn player(&self) -> Option<&AccountInfo> {
        self.accounts.get(self.backend.player_index())
    }

    pub fn context(&self) -> Option<&AccountInfo> {
        self.backend.context_index().and_then(|i| self.accounts.get(i))
    }

    fn env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("RPC_URL", self.rpc_url.clone()),
            ("BACKEND", self.backend.to_string()),
        ];
        if let Some(a) = self.deployer() {
            env.push(("DEPLOYER_ADDRESS", a.address.clone()));
            env.push(("DEPLOYER_PRIVATE_KEY", a.private_key.clone()));
        }
        if let Some(a) = self.player() {
            env.push(("PLAYER_ADDRESS", a.address.clone()));
            env.push(("PLAYER_PRIVATE_KEY", a.private_key.clone()));
        }
        if let Some(a) = self.context() {
            env.push(("CONTEXT_PUBLIC_KEY", a.public_key.clone()));
            env.push(("CONTEXT_PRIVATE_KEY", a.private_key.clone()));
        }
        if let Some(seed) = &self.seed {
            env.push(("SEED", seed.clone()));
        }
        if let Some(funder) = &self.funder {
            env.push(("FUNDER_KEYPAIR", funder.clone()));
        }
        env
    }
}

/// Deploys the challenge artifact and returns its address.
#[async_trait]
pub trait DeployHandler: Send + Sync {
    async fn deploy(&self, ctx: DeployContext) -> Result<String, String>;
}

/// Read-only view of a deployed instance.
#[derive(Clone, Debug)]
pub struct SolvedContext {
    pub deploy: DeployContext,
    pub contract_addr: String,
}

impl SolvedContext {
    pub fn from_node(node: &NodeInfo, contract_addr: impl Into<String>) -> Self {
        Self {
            deploy: DeployContext::from_node(node, None),
            contract_addr: contract_addr.into(),
        }
    }
}

/// Decides whether the instance reached its solved state. Must not mutate
/// chain state.
#[async_trait]
pub trait SolvedPredicate: Send + Sync {
    async fn is_solved(&self, ctx: SolvedContext) -> Result<bool, String>;
}

async fn run_program(
    program: &Path,
    args: &[String],
    env: Vec<(&'static str, String)>,
) -> Result<String, String> {
    let output = Command::new(program)
        .args(args)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| format!("failed to run {}: {e}", program.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
        return Err(format!("{} exited with {}: {tail}", program.display(), output.status));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("{} printed nothing", program.display()))
}

/// Runs a deploy program; its last non-empty stdout line is the address.
pub struct CommandDeployHandler {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandDeployHandler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[async_trait]
impl DeployHandler for CommandDeployHandler {
    async fn deploy(&self, ctx: DeployContext) -> Result<String, String> {
        run_program(&self.program, &self.args, ctx.env()).await
    }
}

/// Runs a check program. Its last non-empty stdout line is `true`/`false`,
/// or a JSON object whose `message` is `"true"` when solved.
pub struct CommandSolvedPredicate {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSolvedPredicate {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

fn parse_verdict(line: &str) -> Result<bool, String> {
    if line.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if line.eq_ignore_ascii_case("false") {
        return Ok(false);
    }
    let doc: Value = serde_json::from_str(line).map_err(|_| format!("unrecognised verdict: {line}"))?;
    match doc.get("message").and_then(Value::as_str) {
        Some(message) => Ok(message == "true"),
        None => Err(format!("unrecognised verdict: {line}")),
    }
}

#[async_trait]
impl SolvedPredicate for CommandSolvedPredicate {
    async fn is_solved(&self, ctx: SolvedContext) -> Result<bool, String> {
        let mut env = ctx.deploy.env();
        env.push(("CONTRACT_ADDR", ctx.contract_addr.clone()));
        let line = run_program(&self.program, &self.args, env).await?;
        parse_verdict(&line)
    }
}

fn hex_body(s: &str) -> Result<&str, String> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    if body.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(body)
    } else {
        Err(format!("not a hex quantity: {s}"))
    }
}

/// `eth_call` of `isSolved()`; solved iff the returned word equals 1.
pub struct EvmSolvedCheck;

#[async_trait]
impl SolvedPredicate for EvmSolvedCheck {
    async fn is_solved(&self, ctx: SolvedContext) -> Result<bool, String> {
        let data = format!("0x{}", hex::encode(evm_selector("isSolved()")));
        let result = JsonRpcClient::new(&ctx.deploy.rpc_url)
            .call(
                "eth_call",
                json!([{ "to": ctx.contract_addr, "data": data }, "latest"]),
            )
            .await
            .map_err(|e| e.to_string())?;
        let word = result.as_str().ok_or("eth_call returned a non-string result")?;
        let body = hex_body(word)?.trim_start_matches('0');
        Ok(body == "1")
    }
}

/// `starknet_call` of `is_solved`; solved iff the first felt is non-zero.
pub struct StarknetSolvedCheck;

#[async_trait]
impl SolvedPredicate for StarknetSolvedCheck {
    async fn is_solved(&self, ctx: SolvedContext) -> Result<bool, String> {
        let result = JsonRpcClient::new(&ctx.deploy.rpc_url)
            .call(
                "starknet_call",
                json!({
                    "request": {
                        "contract_address": ctx.contract_addr,
                        "entry_point_selector": starknet_selector("is_solved"),
                        "calldata": [],
                    },
                    "block_id": "latest",
                }),
            )
            .await
            .map_err(|e| e.to_string())?;
        let first = result
            .as_array()
            .and_then(|felts| felts.first())
            .and_then(Value::as_str)
            .ok_or("starknet_call returned no felts")?;
        Ok(!hex_body(first)?.trim_start_matches('0').is_empty())
    }
}

/// The solved check for `backend`: the configured program when present,
/// otherwise the family's built-in call. Solana has no built-in check.
pub fn solved_predicate_for(
    backend: BackendKind,
    program: Option<PathBuf>,
) -> Option<Arc<dyn SolvedPredicate>> {
    match (program, backend) {
        (Some(program), _) => Some(Arc::new(CommandSolvedPredicate::new(program))),
        (None, BackendKind::Evm) => Some(Arc::new(EvmSolvedCheck)),
        (None, BackendKind::Starknet) => Some(Arc::new(StarknetSolvedCheck)),
        (None, BackendKind::Solana) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_types::{InstanceId, TeamId};

    fn node(backend: BackendKind) -> NodeInfo {
        NodeInfo {
            backend,
            port: 40000,
            accounts: (0..backend.account_arity())
                .map(|i| AccountInfo::new(format!("addr{i}"), format!("key{i}"), format!("pub{i}")))
                .collect(),
            process_id: 1,
            uuid: InstanceId::random(),
            team_id: TeamId::new("team").unwrap(),
            seed: Some("seed words".into()),
            contract_addr: None,
        }
    }

    fn env_value(env: &[(&'static str, String)], key: &str) -> Option<String> {
        env.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn starknet_roles_follow_devnet_order() {
        let ctx = DeployContext::from_node(&node(BackendKind::Starknet), None);
        let env = ctx.env();
        assert_eq!(env_value(&env, "DEPLOYER_ADDRESS").as_deref(), Some("addr1"));
        assert_eq!(env_value(&env, "PLAYER_ADDRESS").as_deref(), Some("addr0"));
        assert!(env_value(&env, "CONTEXT_PUBLIC_KEY").is_none());
    }

    #[test]
    fn solana_env_exposes_context_and_funder() {
        let ctx = DeployContext::from_node(&node(BackendKind::Solana), Some("funderkp".into()));
        let env = ctx.env();
        assert_eq!(env_value(&env, "CONTEXT_PUBLIC_KEY").as_deref(), Some("pub2"));
        assert_eq!(env_value(&env, "FUNDER_KEYPAIR").as_deref(), Some("funderkp"));
        assert_eq!(env_value(&env, "RPC_URL").as_deref(), Some("http://127.0.0.1:40000"));
        assert_eq!(env_value(&env, "BACKEND").as_deref(), Some("solana"));
    }

    #[test]
    fn verdicts_parse() {
        assert_eq!(parse_verdict("true"), Ok(true));
        assert_eq!(parse_verdict("FALSE"), Ok(false));
        assert_eq!(parse_verdict(r#"{"message": "true"}"#), Ok(true));
        assert_eq!(parse_verdict(r#"{"message": "not yet"}"#), Ok(false));
        assert!(parse_verdict("maybe").is_err());
    }

    #[test]
    fn solana_requires_a_program() {
        assert!(solved_predicate_for(BackendKind::Solana, None).is_none());
        assert!(solved_predicate_for(BackendKind::Solana, Some("/bin/true".into())).is_some());
        assert!(solved_predicate_for(BackendKind::Evm, None).is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_deployer_takes_last_line_as_address() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("deploy.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho \"deploying to $RPC_URL as $DEPLOYER_ADDRESS\"\necho 0xC0FFEE\necho\n",
        )
        .unwrap();

        let handler = CommandDeployHandler::new("/bin/sh").arg(script.display().to_string());
        let addr = handler
            .deploy(DeployContext::from_node(&node(BackendKind::Evm), None))
            .await
            .unwrap();
        assert_eq!(addr, "0xC0FFEE");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_deploy_program_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("deploy.sh");
        std::fs::write(&script, "#!/bin/sh\necho 'insufficient funds' >&2\nexit 3\n").unwrap();

        let err = CommandDeployHandler::new("/bin/sh")
            .arg(script.display().to_string())
            .deploy(DeployContext::from_node(&node(BackendKind::Evm), None))
            .await
            .unwrap_err();
        assert!(err.contains("insufficient funds"), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_predicate_sees_contract_address() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("check.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nif [ \"$CONTRACT_ADDR\" = \"0xabc\" ]; then echo '{\"message\": \"true\"}'; else echo false; fi\n",
        )
        .unwrap();

        let predicate = CommandSolvedPredicate::new("/bin/sh").arg(script.display().to_string());
        let node = node(BackendKind::Solana);
        assert!(predicate.is_solved(SolvedContext::from_node(&node, "0xabc")).await.unwrap());
        assert!(!predicate.is_solved(SolvedContext::from_node(&node, "0xdef")).await.unwrap());
    }
}
