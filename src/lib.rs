//! malefirc, an IRC server with persistent message history.
//!
//! # Usage
//!
//! Configuration is read from the environment, see the `config` module.
//! The simplest invocation listens for plain TCP on port 6667 with an
//! in-memory store:
//!
//! ```console
//! cargo run
//! ```
//!
//! Point `IRC_DB_PATH` at a SQLite database to persist accounts and
//! message history, and set `IRC_TLS_ENABLED` with `IRC_TLS_CERT` and
//! `IRC_TLS_KEY` to add a TLS listener.

#![forbid(unsafe_code)]
#![warn(clippy::all, rust_2018_idioms)]

pub use crate::state::State;
use std::net::SocketAddr;
use std::process;

mod channel;
mod client;
pub mod config;
mod lines;
mod net;
mod state;
pub mod store;
mod tls;
mod util;

/// The beginning of everything
pub fn start() {
    let log_settings = env_logger::Env::new()
        .filter_or("MALEFIRC_LOG", "malefirc=debug")
        .write_style("MALEFIRC_LOG_STYLE");
    env_logger::Builder::from_env(log_settings)
        .format(|buf, r| {
            use std::io::Write;
            writeln!(buf, "[{:<5} {}] {}", r.level(), r.target(), r.args())
        })
        .init();

    let cfg = config::Config::from_env();
    let store = store::open(cfg.db_path.as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .build()
        .unwrap_or_else(|err| {
            log::error!("Failed to start the tokio runtime: {}", err);
            process::exit(1);
        });

    runtime.block_on(run(cfg, store));
}

async fn run(cfg: config::Config, store: Box<dyn store::Store>) {
    let shared = State::new(&cfg, store);

    let plain_addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tokio::spawn(net::listen(plain_addr, shared.clone(), None));
    log::info!("Listening on {} for plain-text connections...", plain_addr);

    if let Some(ref tls_cfg) = cfg.tls {
        let acceptor = tls::build_acceptor(&tls_cfg.certificate, &tls_cfg.key)
            .unwrap_or_else(|_| process::exit(1));
        let tls_addr = SocketAddr::from(([0, 0, 0, 0], tls_cfg.port));
        tokio::spawn(net::listen(tls_addr, shared.clone(), Some(acceptor)));
        log::info!("Listening on {} for tls connections...", tls_addr);
    }

    futures::future::pending::<()>().await
}
