//! gatehouse-gateway: runs a gateway, or connects to one as a test client.
//!
//! `serve` starts a gateway with an in-process login service and an
//! in-memory presence store. `login` connects to a running gateway, logs
//! in, and prints every frame it receives until the server hangs up.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gatehouse::prelude::*;
use gatehouse_protocol::{encode_frame, read_frame, FrameError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gatehouse-gateway", version, about = "TCP game gateway")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a gateway
    Serve(ServeArgs),
    /// Log in to a running gateway and print what it sends
    Login(LoginArgs),
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:9000")]
    bind: String,

    /// Identity recorded in the presence store
    #[arg(long, default_value = "gateway_01")]
    gateway_id: String,

    /// Seconds a new connection has to log in
    #[arg(long, default_value_t = 30)]
    login_grace_secs: u64,

    /// Login service timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    login_timeout_ms: u64,

    /// Failed logins before a connection is dropped
    #[arg(long, default_value_t = 3)]
    max_login_attempts: u32,
}

#[derive(clap::Args, Debug)]
struct LoginArgs {
    /// Gateway address
    #[arg(long, default_value = "127.0.0.1:9000")]
    addr: String,

    #[arg(long, default_value = "admin")]
    username: String,

    #[arg(long, default_value = "password123")]
    password: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Login(args) => login(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "exiting");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: ServeArgs) -> Result<(), GatewayError> {
    let config = GatewayConfig {
        gateway_id: args.gateway_id,
        login_timeout: Duration::from_millis(args.login_timeout_ms),
        max_login_attempts: args.max_login_attempts,
        login_grace: Duration::from_secs(args.login_grace_secs),
        ..GatewayConfig::default()
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %args.bind,
        gateway_id = %config.gateway_id,
        "starting gateway"
    );

    let bus = LocalBus::new();
    gatehouse::login_service::spawn(&bus).await;

    let server = GatewayServer::builder()
        .bind(&args.bind)
        .gateway_config(config)
        .build(bus, MemoryPresenceStore::new())
        .await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        }
    }
}

async fn login(args: LoginArgs) -> Result<(), GatewayError> {
    let mut stream = TcpStream::connect(&args.addr)
        .await
        .map_err(FrameError::Io)?;
    info!(addr = %args.addr, username = %args.username, "connected");

    let request = LoginRequest {
        username: args.username,
        password: args.password,
    };
    let payload = JsonCodec.encode(&request)?;
    stream
        .write_all(&encode_frame(msg_id::LOGIN, &payload))
        .await
        .map_err(FrameError::Io)?;

    let config = FrameConfig::default();
    loop {
        let frame = match read_frame(&mut stream, &config).await {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                info!("server closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match frame.msg_id {
            msg_id::LOGIN => {
                let resp: LoginResponse = JsonCodec.decode(&frame.payload)?;
                println!(
                    "login: code={} message={:?} player_id={:?} token={:?}",
                    resp.code, resp.message, resp.player_id, resp.token
                );
            }
            msg_id::NOTICE => {
                let notice: LoginNotice = JsonCodec.decode(&frame.payload)?;
                println!("notice: {}", notice.message);
            }
            other => println!("frame {other}: {} bytes", frame.payload.len()),
        }
    }
}
