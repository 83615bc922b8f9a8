use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use shamrock_bot::cli::Cli;
use shamrock_bot::dispatch::{Dispatcher, Inbound, Outbound};
use shamrock_bot::proxy::ProxyClient;
use shamrock_bot::{BotConfig, logging};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = run(cli).await {
		error!(target = "shamrock", error = %err, "fatal");
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let proxies = match &cli.proxy_token {
		Some(token) => Some(ProxyClient::new(token)?.build_pool().await.context("building proxy pool")?),
		None => None,
	};
	let config = Arc::new(BotConfig {
		session: cli.session_config(),
		policy: cli.retry_policy(),
		session_timeout: cli.session_timeout(),
		proxies,
		..BotConfig::default()
	});

	let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
	let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
	let dispatcher = tokio::spawn(Dispatcher::new(config, outbound_tx).run(inbound_rx));
	let printer = tokio::spawn(print_replies(outbound_rx));

	// Line-based terminal front end: each stdin line is one message in a
	// single local conversation. A chat platform adapter would feed the same
	// channels with real session ids instead.
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	while let Some(line) = lines.next_line().await.context("reading stdin")? {
		if line.trim().is_empty() {
			continue;
		}
		if inbound_tx.send(Inbound { session_id: "local".into(), text: line }).is_err() {
			break;
		}
	}

	drop(inbound_tx);
	dispatcher.await.context("dispatcher task")?;
	printer.await.context("printer task")?;
	Ok(())
}

async fn print_replies(mut outbound: mpsc::UnboundedReceiver<Outbound>) {
	let mut stdout = tokio::io::stdout();
	while let Some(reply) = outbound.recv().await {
		let line = format!("{}\n", reply.text);
		if stdout.write_all(line.as_bytes()).await.is_err() {
			break;
		}
	}
}
