use std::time::Duration;

use colored::Colorize;
use sessionlink::channel::{ChannelNotice, ConnectionStatus, SessionChannel};
use sessionlink::cli::{Cli, Commands};
use sessionlink::config::Config;
use sessionlink::notify::SystemNotifier;
use sessionlink::protocol::ChannelError;
use sessionlink::{AppResult, init_logging};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse_args();

    let config = Config::load_or_default(&cli.config_file);
    let _log_guard = init_logging(&cli.effective_log_level(), Some(&config.log))?;

    tracing::info!("Sessionlink session channel client starting...");
    tracing::debug!("CLI arguments: {:?}", cli);

    match cli.command.clone() {
        Commands::Run { userid, url } => run_session(config, userid, url).await,
        Commands::Kick {
            target,
            userid,
            url,
        } => run_kick(config, target, userid, url).await,
        Commands::Config { action } => {
            Config::handle_command(&action, &cli.config_file)?;
            Ok(())
        }
    }
}

/// Attach a session channel and stream server events until Ctrl-C, a
/// forced logout, or reconnect exhaustion.
async fn run_session(config: Config, userid: String, url: Option<String>) -> AppResult<()> {
    let url = url.unwrap_or_else(|| config.channel.url.clone());
    let notifier = SystemNotifier::new(env!("CARGO_PKG_NAME"));

    let (channel, mut notices) = SessionChannel::new(config.channel.clone());
    let mut status_rx = channel.status_stream();
    channel.connect(&url, &userid)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "closing session".yellow());
                channel.close()?;
                wait_for_teardown(&mut status_rx).await;
                break;
            }

            notice = notices.recv() => {
                match notice {
                    Some(ChannelNotice::Message(frame)) => {
                        println!("{} {}", frame.e.cyan(), frame.d);
                    }
                    Some(ChannelNotice::Error { message }) => {
                        eprintln!("{} {}", "channel error:".red(), message);
                    }
                    Some(ChannelNotice::ForcedLogout { userid }) => {
                        let message = format!(
                            "session for {} was revoked by the server, please log in again",
                            userid
                        );
                        eprintln!("{}", message.red().bold());
                        notifier.notify("Session revoked", message);
                        print_stats(&channel);
                        return Err(Box::new(ChannelError::ForcedLogout));
                    }
                    Some(ChannelNotice::ReconnectExhausted { attempts }) => {
                        let message = format!("gave up reconnecting after {} attempts", attempts);
                        eprintln!("{}", message.red());
                        notifier.notify("Connection lost", message);
                        print_stats(&channel);
                        return Err(Box::new(ChannelError::ReconnectExhausted(attempts)));
                    }
                    None => break,
                }
            }

            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                match status {
                    ConnectionStatus::Connected => {
                        println!("{}", "connected".green());
                    }
                    ConnectionStatus::Reconnecting { attempt } => {
                        println!("{} (attempt {})", "reconnecting".yellow(), attempt);
                    }
                    other => {
                        println!("{} {:?}", "status:".blue(), other);
                    }
                }
            }
        }
    }

    print_stats(&channel);
    Ok(())
}

/// Connect, log in, request revocation of another user's session, close.
async fn run_kick(
    config: Config,
    target: String,
    userid: String,
    url: Option<String>,
) -> AppResult<()> {
    let url = url.unwrap_or_else(|| config.channel.url.clone());

    let (channel, _notices) = SessionChannel::new(config.channel.clone());
    let mut status_rx = channel.status_stream();
    channel.connect(&url, &userid)?;

    loop {
        let status = status_rx.borrow_and_update().clone();
        match status {
            ConnectionStatus::Connected => break,
            ConnectionStatus::ReconnectExhausted => {
                return Err(Box::new(ChannelError::OpenFailed(format!(
                    "could not reach {}",
                    url
                ))));
            }
            ConnectionStatus::ForcedLogout => {
                return Err(Box::new(ChannelError::ForcedLogout));
            }
            _ => {}
        }
        if status_rx.changed().await.is_err() {
            return Err("channel actor terminated".into());
        }
    }

    // Commands are processed in order, so the frame is on the wire
    // before the close runs.
    channel.send_force_offline(&target)?;
    channel.close()?;
    wait_for_teardown(&mut status_rx).await;
    println!("{} {}", "revocation requested for".green(), target);

    Ok(())
}

/// Block until the actor reports a terminal state, so queued commands
/// (sends, the close itself) are on the wire before the process exits.
async fn wait_for_teardown(status_rx: &mut watch::Receiver<ConnectionStatus>) {
    let settled = async {
        loop {
            let status = status_rx.borrow_and_update().clone();
            if matches!(
                status,
                ConnectionStatus::Disconnected
                    | ConnectionStatus::ReconnectExhausted
                    | ConnectionStatus::ForcedLogout
            ) {
                break;
            }
            if status_rx.changed().await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(2), settled).await.is_err() {
        tracing::warn!("timed out waiting for channel teardown");
    }
}

fn print_stats(channel: &SessionChannel) {
    let stats = channel.stats();
    println!(
        "frames sent: {}, received: {}, pings: {}, reconnect attempts: {}, dropped frames: {}",
        stats.frames_sent,
        stats.frames_received,
        stats.pings_sent,
        stats.reconnect_attempts,
        stats.decode_failures
    );
}
