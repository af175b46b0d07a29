use std::net::{IpAddr, SocketAddr};

use anyhow::{anyhow, Result};

/// Parses an `ip#port` endpoint. `#` is used instead of `:` so IPv6
/// literals need no bracketing; the address family follows from the
/// literal's syntax.
pub fn parse_endpoint(s: &str) -> Result<SocketAddr> {
    let (ip, port) = s
        .split_once('#')
        .ok_or_else(|| anyhow!("port is not specified: {}", s))?;
    if ip.is_empty() {
        return Err(anyhow!("addr is not specified: {}", s));
    }
    let ip = ip
        .parse::<IpAddr>()
        .map_err(|_| anyhow!("addr is invalid: {}", ip))?;
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| anyhow!("port is invalid: {}", port))?;
    Ok(SocketAddr::new(ip, port))
}

pub fn format_endpoint(addr: SocketAddr) -> String {
    format!("{}#{}", addr.ip(), addr.port())
}

#[cfg(test)]
mod tests {
    use super::{format_endpoint, parse_endpoint};
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_ipv4_endpoints() {
        let endpoint = parse_endpoint("127.0.0.1#5353").unwrap();
        assert_eq!(endpoint, "127.0.0.1:5353".parse().unwrap());
        assert!(endpoint.is_ipv4());
    }

    #[test]
    fn parses_ipv6_endpoints_without_brackets() {
        let endpoint = parse_endpoint("::1#53").unwrap();
        assert_eq!(endpoint, "[::1]:53".parse().unwrap());
        assert!(endpoint.is_ipv6());
    }

    #[test]
    fn rejects_malformed_endpoints() {
        for bad in [
            "127.0.0.1",        // no separator
            "#53",              // no address
            "127.0.0.1#",       // no port
            "127.0.0.1#0",      // zero port
            "127.0.0.1#65536",  // port overflow
            "127.0.0.1#dns",    // junk port
            "256.0.0.1#53",     // junk address
            "fe80::%eth0#53",   // scoped literals are not accepted
        ] {
            assert!(parse_endpoint(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn formats_endpoints_back_to_the_wire_form() {
        assert_eq!(
            format_endpoint("10.0.0.2:53".parse().unwrap()),
            "10.0.0.2#53"
        );
        assert_eq!(format_endpoint("[2001:db8::1]:5300".parse().unwrap()), "2001:db8::1#5300");
    }

    #[test]
    fn parse_and_format_round_trip() {
        for endpoint in ["9.9.9.9#9953", "2001:db8::53#53"] {
            assert_eq!(format_endpoint(parse_endpoint(endpoint).unwrap()), endpoint);
        }
    }
}
