//! Transport adapter: one task per upstream connection.
//!
//! The task owns the socket. It reports back to the session exclusively by
//! posting [`SessionEvent`]s tagged with its [`LinkId`], and receives
//! outbound lines through the [`Link`] the session holds.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn, Instrument};

use super::codec::LineCodec;
use super::connection::{establish_connection, TransportError, UpstreamStream};
use crate::protocol::{LinkId, SessionEvent};
use crate::session::Host;

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// The session's side of one transport adapter
#[derive(Debug)]
pub struct Link {
    id: LinkId,
    outbound: mpsc::UnboundedSender<String>,
    task: Option<JoinHandle<()>>,
}

impl Link {
    pub fn new(
        id: LinkId,
        outbound: mpsc::UnboundedSender<String>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self { id, outbound, task }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Queue a fully terminated line for writing
    pub fn send_data(&self, data: String) -> bool {
        self.outbound.send(data).is_ok()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Opens transport adapters on behalf of a session
pub trait Connector {
    fn connect(&mut self, id: LinkId, host: &Host, events: EventSender) -> Link;
}

/// Connector for real TCP/TLS upstream links
#[derive(Debug, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&mut self, id: LinkId, host: &Host, events: EventSender) -> Link {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let span = tracing::info_span!("upstream", link = id, host = %host.host, port = host.port);
        let task = tokio::spawn(run_transport(id, host.clone(), events, outbound_rx).instrument(span));
        Link::new(id, outbound_tx, Some(task))
    }
}

/// Drive one upstream connection until it ends, then report the disconnect
async fn run_transport(
    id: LinkId,
    host: Host,
    events: EventSender,
    outbound: mpsc::UnboundedReceiver<String>,
) {
    match drive(id, &host, &events, outbound).await {
        Ok(()) => debug!("upstream connection closed"),
        Err(e) => warn!(error = %e, "upstream connection lost"),
    }
    let _ = events.send(SessionEvent::Disconnected(id));
}

async fn drive(
    id: LinkId,
    host: &Host,
    events: &EventSender,
    outbound: mpsc::UnboundedReceiver<String>,
) -> Result<(), TransportError> {
    match establish_connection(host).await? {
        UpstreamStream::Plain(stream) => pump(id, stream, events, outbound).await,
        UpstreamStream::Tls(stream) => pump(id, *stream, events, outbound).await,
    }
}

/// Shuttle lines between the socket and the session
pub async fn pump<S>(
    id: LinkId,
    stream: S,
    events: &EventSender,
    mut outbound: mpsc::UnboundedReceiver<String>,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Let the connect/handshake path unwind before the session starts writing
    tokio::task::yield_now().await;
    if events.send(SessionEvent::Established(id)).is_err() {
        return Ok(());
    }

    let mut framed = Framed::new(stream, LineCodec::new());
    loop {
        tokio::select! {
            inbound = framed.next() => match inbound {
                Some(Ok(line)) => {
                    trace!(%line, "from server");
                    if events.send(SessionEvent::Line(id, line)).is_err() {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
            data = outbound.recv() => match data {
                Some(data) => framed.send(data).await?,
                // Session dropped its link
                None => return Ok(()),
            },
        }
    }
}
