//! Pull-based metrics endpoint.
//!
//! Serves the current `MetricsSnapshot` in the text exposition format on
//! `GET /metrics`. Each instrument becomes a gauge family named after its
//! symbol with two samples, `{v="Spread"}` and `{v="Delta"}`; the Delta sample
//! is omitted while a symbol has no previous value. Service gauges make the
//! age of the served snapshot explicit, since a failed cycle leaves the old
//! snapshot in place.
//!
//! The HTTP side is a minimal HTTP/1.1 responder: one request per connection,
//! `Connection: close`.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{Instrument, debug, info, warn};

use crate::metrics::counters::{CounterValues, Counters};
use crate::metrics::snapshot::{MetricsSnapshot, SnapshotStore};

pub const METRICS_PATH: &str = "/metrics";
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const MAX_REQUEST_HEAD: usize = 8 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct MetricsExporter {
    snapshots: SnapshotStore,
    counters: Counters,
}

impl MetricsExporter {
    pub fn new(snapshots: SnapshotStore, counters: Counters) -> Self {
        Self {
            snapshots,
            counters,
        }
    }

    /// Exposition text for the snapshot served right now.
    pub fn render(&self) -> String {
        render(&self.snapshots.scrape(), &self.counters.load())
    }

    /// Accepts scrapes until the listener fails.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let exporter = Arc::new(self);

        info!(addr = ?listener.local_addr()?, path = METRICS_PATH, "metrics exporter listening");

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept scrape connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            let exporter = Arc::clone(&exporter);
            let span = tracing::debug_span!("scrape", %peer);
            tokio::spawn(
                async move {
                    if let Err(e) = exporter.handle_connection(stream).await {
                        debug!(error = %e, "scrape connection failed");
                    }
                }
                .instrument(span),
            );
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        let head = match tokio::time::timeout(READ_TIMEOUT, read_request_head(&mut stream)).await
        {
            Ok(head) => head?,
            Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "request head timeout")),
        };

        let response = match parse_request_line(&head) {
            Some(("GET", path)) if path == METRICS_PATH => Response::ok(self.render()),
            Some(("GET", _)) => Response::status("404 Not Found"),
            Some(_) => Response::status("405 Method Not Allowed"),
            None => Response::status("400 Bad Request"),
        };

        debug!(status = response.status, bytes = response.body.len(), "scrape served");

        stream.write_all(response.to_bytes().as_slice()).await?;
        stream.shutdown().await
    }
}

struct Response {
    status: &'static str,
    body: String,
}

impl Response {
    fn ok(body: String) -> Self {
        Self {
            status: "200 OK",
            body,
        }
    }

    fn status(status: &'static str) -> Self {
        Self {
            status,
            body: format!("{status}\n"),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            CONTENT_TYPE,
            self.body.len()
        );
        if self.status.starts_with("405") {
            out.push_str("Allow: GET\r\n");
        }
        out.push_str("\r\n");
        out.push_str(&self.body);
        out.into_bytes()
    }
}

/// Reads up to the blank line ending the request head.
async fn read_request_head(stream: &mut TcpStream) -> io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if buf.len() > MAX_REQUEST_HEAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Method and path (query string stripped) of the request line.
fn parse_request_line(head: &str) -> Option<(&str, &str)> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();

    let method = parts.next()?;
    let target = parts.next()?;
    parts.next().filter(|v| v.starts_with("HTTP/"))?;

    let path = target.split('?').next().unwrap_or(target);
    Some((method, path))
}

/// Renders a snapshot plus service counters in the text exposition format.
pub fn render(snapshot: &MetricsSnapshot, counters: &CounterValues) -> String {
    let mut out = String::new();
    let mut families = HashSet::with_capacity(snapshot.records.len());

    for r in &snapshot.records {
        let name = family_name(&r.symbol);
        // Each family is written once; a second symbol sanitizing to the same
        // name would duplicate its series.
        if !families.insert(name.clone()) {
            warn!(
                symbol = %r.symbol,
                family = %name,
                "metric family collision; record not exported"
            );
            continue;
        }
        let _ = writeln!(out, "# HELP {name} Symbol");
        let _ = writeln!(out, "# TYPE {name} gauge");
        let _ = writeln!(out, "{name}{{v=\"Spread\"}} {}", fmt_value(r.spread));
        if let Some(delta) = r.delta {
            let _ = writeln!(out, "{name}{{v=\"Delta\"}} {}", fmt_value(delta));
        }
    }

    let generated_secs = snapshot.generated_at.timestamp_millis() as f64 / 1_000.0;

    gauge(
        &mut out,
        "spreadwatch_snapshot_generated_timestamp_seconds",
        "Unix time the served snapshot was generated.",
        generated_secs,
    );
    gauge(
        &mut out,
        "spreadwatch_snapshot_records",
        "Instruments in the served snapshot.",
        snapshot.records.len() as f64,
    );

    let _ = writeln!(out, "# HELP spreadwatch_cycles_total Polling cycles by outcome.");
    let _ = writeln!(out, "# TYPE spreadwatch_cycles_total counter");
    let _ = writeln!(out, "spreadwatch_cycles_total{{outcome=\"ok\"}} {}", counters.cycles_ok);
    let _ = writeln!(
        out,
        "spreadwatch_cycles_total{{outcome=\"failed\"}} {}",
        counters.cycles_failed
    );

    counter(
        &mut out,
        "spreadwatch_skipped_ticks_total",
        "Ticks skipped because a cycle overran the poll period.",
        counters.skipped_ticks,
    );
    counter(
        &mut out,
        "spreadwatch_empty_books_total",
        "Instruments skipped because one side of the book was empty.",
        counters.empty_books,
    );
    counter(
        &mut out,
        "spreadwatch_malformed_tickers_total",
        "Tickers left out of a ranking because they were malformed.",
        counters.malformed_tickers,
    );

    out
}

fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {}", fmt_value(value));
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

/// Metric family name for a symbol: `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn family_name(symbol: &str) -> String {
    let mut name: String = symbol
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }

    name
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}
