use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use pgtunnel_db::TlsMode;

/// pgtunnel - HTTP tunnel for PostgreSQL
#[derive(Parser, Debug, Clone)]
#[command(name = "pgtunnel")]
#[command(version)]
#[command(about = "Runs PostgreSQL statements posted over HTTP by the Navicat tunnel client", long_about = None)]
pub struct Config {
    /// Port the HTTP listener binds to
    #[arg(short = 'p', long = "port", env = "PGTUNNEL_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address the HTTP listener binds to
    #[arg(long = "bind", env = "PGTUNNEL_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Stay attached to the terminal instead of daemonizing
    #[arg(long = "foreground", env = "PGTUNNEL_FOREGROUND")]
    pub foreground: bool,

    /// PID file written after daemonizing (relative to the work dir)
    #[arg(long = "pid-file", default_value = "pid")]
    pub pid_file: PathBuf,

    /// Working directory of the daemon
    #[arg(long = "work-dir", default_value = "./")]
    pub work_dir: PathBuf,

    /// Append logs to this file instead of stderr
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Tracing filter directives (overridden by RUST_LOG)
    #[arg(long = "log-filter")]
    pub log_filter: Option<String>,

    /// TLS mode for backend connections: disable, prefer or require
    #[arg(long = "ssl-mode", default_value_t = TlsMode::Disable)]
    pub ssl_mode: TlsMode,

    /// PEM bundle of extra root certificates for backend TLS
    #[arg(long = "ssl-root-cert")]
    pub ssl_root_cert: Option<PathBuf>,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["pgtunnel"]).expect("parse");
        assert_eq!(config.listen_addr(), "0.0.0.0:8080".parse().unwrap());
        assert!(!config.foreground);
        assert_eq!(config.pid_file, PathBuf::from("pid"));
        assert_eq!(config.work_dir, PathBuf::from("./"));
        assert_eq!(config.ssl_mode, TlsMode::Disable);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "pgtunnel",
            "-p",
            "9000",
            "--bind",
            "127.0.0.1",
            "--foreground",
            "--ssl-mode",
            "REQUIRE",
            "--log-file",
            "/tmp/pgtunnel.log",
        ])
        .expect("parse");
        assert_eq!(config.listen_addr(), "127.0.0.1:9000".parse().unwrap());
        assert!(config.foreground);
        assert_eq!(config.ssl_mode, TlsMode::Require);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/pgtunnel.log")));
    }

    #[test]
    fn rejects_unknown_ssl_mode() {
        assert!(Config::try_parse_from(["pgtunnel", "--ssl-mode", "verify-full"]).is_err());
    }
}
