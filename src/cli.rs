use std::net::SocketAddr;
use std::process::exit;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use crate::addr;
use crate::config::{ListenOpts, RelayConfig, UpstreamOpts, DEFAULT_SESSION_TIMEOUT};

#[derive(Debug, Parser)]
#[command(name = "dns2tcp", version, about = "simple relay that converts udp dns queries to tcp")]
pub struct Opts {
    /// udp listen address, this is required
    #[arg(short = 'L', value_name = "ip#port", value_parser = addr::parse_endpoint)]
    listen: SocketAddr,

    /// tcp remote address, this is required
    #[arg(short = 'R', value_name = "ip#port", value_parser = addr::parse_endpoint)]
    remote: SocketAddr,

    /// set TCP_SYNCNT for remote socket
    #[arg(short = 's', value_name = "syncnt", value_parser = clap::value_parser!(u8).range(1..))]
    syn_cnt: Option<u8>,

    /// enable IPV6_V6ONLY for listen socket
    #[arg(short = '6')]
    ipv6_only: bool,

    /// enable SO_REUSEPORT for listen socket
    #[arg(short = 'r')]
    reuse_port: bool,

    /// enable TCP_QUICKACK for remote socket
    #[arg(short = 'a')]
    quick_ack: bool,

    /// enable TCP_FASTOPEN for remote socket (RFC 7413)
    #[arg(short = 'f')]
    fast_open: bool,

    /// print verbose log, used for debugging
    #[arg(short = 'v')]
    verbose: bool,
}

impl Opts {
    fn into_config(self) -> RelayConfig {
        RelayConfig {
            listen: ListenOpts {
                addr: self.listen,
                reuse_port: self.reuse_port,
                ipv6_only: self.ipv6_only,
            },
            upstream: UpstreamOpts {
                addr: self.remote,
                syn_retries: self.syn_cnt,
                quick_ack: self.quick_ack,
                fast_open: self.fast_open,
                timeout: DEFAULT_SESSION_TIMEOUT,
            },
            verbose: self.verbose,
        }
    }
}

/// Parses the command line. Help and version requests exit with 0; any
/// other parse failure prints the diagnostic followed by the full help
/// text and exits with 1.
pub fn parse() -> RelayConfig {
    match Opts::try_parse() {
        Ok(opts) => opts.into_config(),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            exit(0);
        }
        Err(err) => {
            println!("{}", err.render());
            let _ = Opts::command().print_help();
            exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Opts;
    use crate::config::DEFAULT_SESSION_TIMEOUT;
    use clap::error::ErrorKind;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Result<Opts, clap::Error> {
        Opts::try_parse_from(std::iter::once("dns2tcp").chain(args.iter().copied()))
    }

    #[test]
    fn parses_the_minimal_invocation() {
        let config = parse(&["-L", "127.0.0.1#1053", "-R", "8.8.8.8#53"])
            .unwrap()
            .into_config();
        assert_eq!(config.listen.addr, "127.0.0.1:1053".parse().unwrap());
        assert_eq!(config.upstream.addr, "8.8.8.8:53".parse().unwrap());
        assert_eq!(config.upstream.syn_retries, None);
        assert_eq!(config.upstream.timeout, DEFAULT_SESSION_TIMEOUT);
        assert!(!config.listen.reuse_port);
        assert!(!config.listen.ipv6_only);
        assert!(!config.upstream.quick_ack);
        assert!(!config.upstream.fast_open);
        assert!(!config.verbose);
    }

    #[test]
    fn parses_every_tuning_flag() {
        let config = parse(&[
            "-L",
            "::1#1053",
            "-R",
            "2001:4860:4860::8888#53",
            "-s",
            "3",
            "-6",
            "-r",
            "-a",
            "-f",
            "-v",
        ])
        .unwrap()
        .into_config();
        assert_eq!(config.listen.addr, "[::1]:1053".parse().unwrap());
        assert_eq!(config.upstream.addr, "[2001:4860:4860::8888]:53".parse().unwrap());
        assert_eq!(config.upstream.syn_retries, Some(3));
        assert!(config.listen.ipv6_only);
        assert!(config.listen.reuse_port);
        assert!(config.upstream.quick_ack);
        assert!(config.upstream.fast_open);
        assert!(config.verbose);
    }

    #[test]
    fn listen_and_remote_are_required() {
        let err = parse(&["-R", "8.8.8.8#53"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        let err = parse(&["-L", "127.0.0.1#1053"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_endpoints_in_colon_notation() {
        let err = parse(&["-L", "127.0.0.1:1053", "-R", "8.8.8.8#53"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_out_of_range_syncnt() {
        for bad in ["0", "256", "none"] {
            let err = parse(&["-L", "127.0.0.1#1053", "-R", "8.8.8.8#53", "-s", bad]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "syncnt {}", bad);
        }
    }

    #[test]
    fn help_and_version_exit_successfully() {
        assert_eq!(parse(&["-h"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
        assert_eq!(parse(&["-V"]).unwrap_err().kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn unknown_options_are_errors() {
        let err = parse(&["-L", "127.0.0.1#1053", "-R", "8.8.8.8#53", "-x"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }
}
