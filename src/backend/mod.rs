/// Upstream transport adapter
///
/// - `codec`: CRLF line framing
/// - `connection`: TCP connect and TLS handshake
/// - `transport`: per-connection task and the `Connector` seam the session uses
mod codec;
mod connection;
mod transport;

pub use codec::{LineCodec, MAX_LINE_LENGTH};
pub use connection::{create_tls_connector, establish_connection, TransportError, UpstreamStream};
pub use transport::{pump, Connector, EventSender, Link, TcpConnector};
