//! Configuration, read once at startup from the environment.

use std::path::PathBuf;
use std::{env, process};

/// TLS listener settings.  Present only when `IRC_TLS_ENABLED` is set.
pub struct Tls {
    pub port: u16,
    pub certificate: PathBuf,
    pub key: PathBuf,
}

/// The whole server configuration.
pub struct Config {
    pub port: u16,
    pub server_name: String,
    pub oper_name: String,
    pub oper_password: String,
    pub tls: Option<Tls>,
    pub db_path: Option<String>,
}

fn var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn port_var(key: &str, default: u16) -> u16 {
    match env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            log::error!("{} is not a port number: {:?}", key, value);
            process::exit(1);
        }),
        Err(_) => default,
    }
}

fn flag_var(key: &str) -> bool {
    matches!(env::var(key).as_deref(), Ok("1") | Ok("true") | Ok("TRUE") | Ok("True"))
}

impl Config {
    /// Reads the configuration from the environment.
    ///
    /// Exits the process when a value cannot be used, in particular when
    /// TLS is enabled without a certificate and key.
    pub fn from_env() -> Self {
        let tls = if flag_var("IRC_TLS_ENABLED") {
            let certificate = env::var("IRC_TLS_CERT").unwrap_or_else(|_| {
                log::error!("IRC_TLS_ENABLED is set but IRC_TLS_CERT is not");
                process::exit(1);
            });
            let key = env::var("IRC_TLS_KEY").unwrap_or_else(|_| {
                log::error!("IRC_TLS_ENABLED is set but IRC_TLS_KEY is not");
                process::exit(1);
            });
            Some(Tls {
                port: port_var("IRC_TLS_PORT", 6697),
                certificate: certificate.into(),
                key: key.into(),
            })
        } else {
            None
        };

        Self {
            port: port_var("IRC_PORT", 6667),
            server_name: var("IRC_SERVER_NAME", "malefirc.local"),
            oper_name: var("IRC_OPER_NAME", "admin"),
            oper_password: var("IRC_OPER_PASSWORD", "adminpass"),
            tls,
            db_path: env::var("IRC_DB_PATH").ok(),
        }
    }
}
