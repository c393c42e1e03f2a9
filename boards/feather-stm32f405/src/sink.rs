#![deny(unsafe_code)]
//! HTTP collector client used by the root node
//!
//! Each record is sent as its own `POST` with a form body `data=<json>`
//! over a fresh TCP connection. The status code is logged; nothing is
//! retried.

use core::fmt::Write as _;

use defmt::{info, warn};
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Duration;
use embedded_io_async::Write;
use heapless::String;
use mesh_node_core::uplink::UPLINK_CAPACITY;
use mesh_node_hal::TelemetrySink;

use crate::error::NetworkError;

const FORM_PREFIX: &str = "data=";
/// Request line and headers plus the largest form body
const REQUEST_CAPACITY: usize = 256 + UPLINK_CAPACITY;
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

struct SinkBuffers {
    rx: [u8; 1024],
    tx: [u8; 1024],
}

/// Posts uplink records to a fixed HTTP endpoint
pub struct HttpSink<'a> {
    stack: Stack<'a>,
    endpoint: IpEndpoint,
    path: &'static str,
    buffers: Mutex<CriticalSectionRawMutex, SinkBuffers>,
}

impl<'a> HttpSink<'a> {
    pub fn new(stack: Stack<'a>, endpoint: IpEndpoint, path: &'static str) -> Self {
        Self {
            stack,
            endpoint,
            path,
            buffers: Mutex::new(SinkBuffers {
                rx: [0; 1024],
                tx: [0; 1024],
            }),
        }
    }

    fn request(&self, json: &str) -> Result<String<REQUEST_CAPACITY>, NetworkError> {
        let mut request = String::new();
        write!(
            request,
            "POST {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: application/x-www-form-urlencoded\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {}{}",
            self.path,
            self.endpoint,
            FORM_PREFIX.len() + json.len(),
            FORM_PREFIX,
            json
        )
        .map_err(|_| NetworkError::RequestTooLarge)?;
        Ok(request)
    }
}

/// Status code from an HTTP status line such as `HTTP/1.1 200 OK`
fn parse_status(head: &[u8]) -> Option<u16> {
    let line = core::str::from_utf8(head).ok()?;
    let mut parts = line.split(' ');
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.trim_end().parse().ok()
}

impl TelemetrySink for HttpSink<'_> {
    type Error = NetworkError;

    async fn post_json(&self, body: &str) -> Result<(), NetworkError> {
        let request = self.request(body)?;

        let mut buffers = self.buffers.lock().await;
        let SinkBuffers { rx, tx } = &mut *buffers;
        let mut socket = TcpSocket::new(self.stack, rx, tx);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        socket.connect(self.endpoint).await.map_err(|e| {
            warn!("Collector connect to {} failed: {:?}", self.endpoint, e);
            NetworkError::SocketError
        })?;
        socket
            .write_all(request.as_bytes())
            .await
            .map_err(|_| NetworkError::SendFailed)?;
        socket.flush().await.map_err(|_| NetworkError::SendFailed)?;

        // Only the status line is of interest
        let mut head = [0u8; 32];
        let mut filled = 0;
        while filled < head.len() {
            let n = socket.read(&mut head[filled..]).await.map_err(|e| {
                warn!("Collector read failed: {:?}", e);
                NetworkError::Timeout
            })?;
            if n == 0 {
                break;
            }
            filled += n;
            if head[..filled].contains(&b'\n') {
                break;
            }
        }
        socket.close();

        if filled == 0 {
            return Err(NetworkError::ConnectionClosed);
        }
        let line_end = head[..filled]
            .iter()
            .position(|b| *b == b'\r' || *b == b'\n')
            .unwrap_or(filled);
        let status = parse_status(&head[..line_end]).ok_or(NetworkError::InvalidResponse)?;

        info!("HTTP POST Status = {}, body {} bytes", status, body.len());
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(NetworkError::HttpStatus(status))
        }
    }
}
