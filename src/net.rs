//! Listeners and connection tasks.

use crate::client::MessageQueueItem;
use crate::state::State;
use crate::tls;
use malefirc_tokens::Message;
use std::net::SocketAddr;
use std::process;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Lines longer than this are dropped without being parsed.
const MAX_LINE_LENGTH: usize = 4096;

/// Listens on `addr`, accepts and handles incoming connections.
///
/// With an acceptor, sockets go through a TLS handshake before entering
/// the world; a failed handshake closes the socket and nothing else.
pub async fn listen(addr: SocketAddr, shared: State, acceptor: Option<tls::Acceptor>) {
    let listener = TcpListener::bind(&addr).await.unwrap_or_else(|err| {
        log::error!("Failed to bind to {}: {}", addr, err);
        process::exit(1);
    });

    loop {
        match listener.accept().await {
            Ok((conn, peer_addr)) => match acceptor {
                Some(ref acceptor) => {
                    let shared = shared.clone();
                    let acceptor = acceptor.clone();
                    tokio::spawn(async move {
                        match acceptor.accept(conn).await {
                            Ok(tls_conn) => handle(tls_conn, peer_addr, shared).await,
                            Err(err) => {
                                log::debug!("TLS handshake with {} failed: {}", peer_addr, err)
                            }
                        }
                    });
                }
                None => {
                    tokio::spawn(handle(conn, peer_addr, shared.clone()));
                }
            },
            Err(err) => log::debug!("Failed to accept connection: {}", err),
        }
    }
}

/// Handles one IRC connection, from accept to cleanup.
async fn handle<S>(conn: S, peer_addr: SocketAddr, shared: State)
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, writer) = tokio::io::split(conn);
    let (msg_queue, outgoing_msgs) = mpsc::unbounded_channel();
    let id = shared.peer_joined(peer_addr.ip().to_string(), msg_queue).await;

    let incoming = read_loop(reader, id, &shared);
    let outgoing = write_loop(writer, outgoing_msgs);

    // Either half ending ends the connection: a read error or EOF, a
    // write error, or the queue closing because the state dropped the
    // client (QUIT, KILL).
    tokio::select! {
        _ = incoming => {}
        _ = outgoing => {}
    }
    shared.peer_quit(id).await;
}

async fn read_loop<R>(reader: R, id: usize, shared: &State)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = String::new();
    loop {
        buf.clear();
        match reader.read_line(&mut buf).await {
            Ok(0) => return,
            Ok(_) => {}
            Err(err) => {
                log::debug!("{}: read error: {}", id, err);
                return;
            }
        }
        if MAX_LINE_LENGTH < buf.len() {
            log::debug!("{}: line too long, dropped", id);
            continue;
        }
        if let Some(msg) = Message::parse(&buf) {
            shared.handle_message(id, msg).await;
        }
    }
}

async fn write_loop<W>(mut writer: W, mut outgoing: mpsc::UnboundedReceiver<MessageQueueItem>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = outgoing.recv().await {
        let line: &str = msg.as_ref();
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            log::debug!("write error: {}", err);
            return;
        }
    }
    // The queue closed: the client was removed from the state.  Shut the
    // socket down so the read half sees EOF.
    let _ = writer.shutdown().await;
}
