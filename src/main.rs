use std::process::ExitCode;

use env_logger::{Env, Target};
use log::{debug, error, info};

mod addr;
mod cli;
mod config;
mod framing;
mod relay;

use config::RelayConfig;
use relay::Relay;

#[tokio::main]
async fn main() -> ExitCode {
    let config = cli::parse();
    init_logger(config.verbose);
    print_banner(&config);

    let relay = match Relay::bind(config) {
        Ok(relay) => relay,
        Err(err) => {
            error!("{:#}", err);
            // exit with the POSIX error number when the OS supplied one
            let errno = err
                .root_cause()
                .downcast_ref::<std::io::Error>()
                .and_then(std::io::Error::raw_os_error)
                .unwrap_or(1);
            return ExitCode::from(errno.clamp(1, 255) as u8);
        }
    };
    if let Ok(bound) = relay.local_addr() {
        debug!("listen socket bound to {}", addr::format_endpoint(bound));
    }
    if let Err(err) = relay.run().await {
        error!("{:#}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .target(Target::Stdout)
        .init();
}

fn print_banner(config: &RelayConfig) {
    info!("udp listen addr: {}", addr::format_endpoint(config.listen.addr));
    info!("tcp remote addr: {}", addr::format_endpoint(config.upstream.addr));
    if let Some(count) = config.upstream.syn_retries {
        info!("enable TCP_SYNCNT: {}", count);
    }
    if config.listen.ipv6_only {
        info!("enable IPV6_V6ONLY for listen socket");
    }
    if config.listen.reuse_port {
        info!("enable SO_REUSEPORT for listen socket");
    }
    if config.upstream.quick_ack {
        info!("enable TCP_QUICKACK for remote socket");
    }
    if config.upstream.fast_open {
        info!("enable TCP_FASTOPEN for remote socket");
    }
    if config.verbose {
        info!("verbose mode (for debug)");
    }
}
