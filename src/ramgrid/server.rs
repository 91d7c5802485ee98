use crate::ramgrid::db::DEFAULT_SUB_K;
use crate::ramgrid::errors::{RamGridError, Result};
use crate::ramgrid::params::ParameterPicker;
use crate::ramgrid::searcher::{GridSearcher, InnerMetric};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Instant;

// Allowed client->server message terms. *mandatory
//     *type: search|handshake|shutdown
//     query_type: sequence|file|multiseq
//     query: <string>
//     outer_radius: <float>
//     inner_radius: <float>
//     inner_metric: hamming|needle|none
//     search_mode: full|coarse
//     max_filter_misses / result_file / kmer_fraction / seq_identity

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum QueryType {
    Sequence,
    File,
    Multiseq,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SearchMode {
    Full,
    Coarse,
}

/// The full search message. Unknown keys are rejected, and so is any
/// missing required field: the deserialize error surfaces as a protocol
/// error reply.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchMsg {
    #[serde(rename = "type")]
    _msg_type: String,
    query_type: QueryType,
    query: String,
    outer_radius: f64,
    inner_radius: f64,
    inner_metric: String,
    search_mode: SearchMode,
    #[serde(default)]
    max_filter_misses: Option<u32>,
    #[serde(default)]
    result_file: Option<PathBuf>,
    #[serde(default)]
    kmer_fraction: Option<f64>,
    #[serde(default)]
    seq_identity: Option<f64>,
}

/// Single-threaded request/reply search service.
///
/// One request is serviced to completion before the next is read, so
/// replies on a connection always arrive in request order. The storage
/// handle is owned by the server loop and released on every exit path.
pub struct SearchServer {
    listener: TcpListener,
    searcher: GridSearcher,
    picker: ParameterPicker,
}

impl SearchServer {
    /// Bind to 127.0.0.1:`port`. Port 0 picks a free port (tests).
    pub fn new(port: u16, searcher: GridSearcher) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))?;
        let picker = ParameterPicker::new(searcher.dims(), searcher.k(), DEFAULT_SUB_K);
        Ok(SearchServer {
            listener,
            searcher,
            picker,
        })
    }

    pub fn from_path(port: u16, db_path: &Path) -> Result<Self> {
        Self::new(port, GridSearcher::open(db_path)?)
    }

    /// The bound port (useful when constructed with port 0).
    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }

    /// Accept clients until a shutdown message arrives. A client
    /// disconnect mid-conversation logs a warning and resumes the accept
    /// loop.
    pub fn main_loop(&mut self) -> Result<()> {
        info!("search server listening on port {}", self.port());
        loop {
            let stream = match self.listener.accept() {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                }
            };
            match self.serve_client(stream) {
                Ok(true) => {
                    info!("shutdown requested, leaving main loop");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => warn!("client dropped: {}", e),
            }
        }
    }

    /// Serve one connection to completion. Returns true on shutdown.
    fn serve_client(&mut self, mut stream: TcpStream) -> Result<bool> {
        let reader = BufReader::new(stream.try_clone()?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            debug!("message received: {}", line);
            let started = Instant::now();
            let reply = match self.handle_message(&line) {
                Ok(None) => return Ok(true),
                Ok(Some(reply)) => reply,
                // Protocol failures answer the client and keep serving
                Err(RamGridError::Protocol(msg)) => json!({"type": "error", "message": msg}),
                Err(e) => json!({"type": "error", "message": e.to_string()}),
            };
            let encoded = serde_json::to_string(&reply)?;
            writeln!(stream, "{}", encoded)?;
            debug!("reply sent in {:.5}s", started.elapsed().as_secs_f64());
        }
        Ok(false)
    }

    /// Dispatch one request line. `None` means shutdown (no reply).
    fn handle_message(&mut self, line: &str) -> Result<Option<Value>> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| RamGridError::Protocol(format!("malformed JSON: {}", e)))?;
        let msg_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RamGridError::Protocol("missing required field 'type'".into()))?;
        match msg_type {
            "handshake" => Ok(Some(json!({"type": "handshake"}))),
            "shutdown" => Ok(None),
            "search" => {
                let msg: SearchMsg = serde_json::from_value(value)
                    .map_err(|e| RamGridError::Protocol(format!("bad search message: {}", e)))?;
                Ok(Some(Value::String(self.run_search(&msg)?)))
            }
            other => Err(RamGridError::Protocol(format!(
                "unknown message type {:?}",
                other
            ))),
        }
    }

    fn run_search(&mut self, msg: &SearchMsg) -> Result<String> {
        let inner_metric: InnerMetric = msg.inner_metric.parse()?;
        let max_filter_misses = msg
            .max_filter_misses
            .or_else(|| self.picker.max_filter_misses(msg.inner_radius));

        match msg.query_type {
            QueryType::File => {
                let result_file = msg.result_file.as_ref().ok_or_else(|| {
                    RamGridError::Protocol("file search needs 'result_file'".into())
                })?;
                self.searcher.file_search(
                    Path::new(&msg.query),
                    result_file,
                    msg.outer_radius,
                    msg.inner_radius,
                    inner_metric,
                    max_filter_misses,
                )?;
                Ok("DONE".to_string())
            }
            QueryType::Sequence | QueryType::Multiseq => {
                let queries: Vec<&str> = match msg.query_type {
                    QueryType::Multiseq => msg.query.split_whitespace().collect(),
                    _ => vec![msg.query.as_str()],
                };
                let mut lines = Vec::new();
                for query in queries {
                    self.search_one(query, msg, inner_metric, max_filter_misses, &mut lines)?;
                }
                Ok(lines.join("\n"))
            }
        }
    }

    fn search_one(
        &mut self,
        query: &str,
        msg: &SearchMsg,
        inner_metric: InnerMetric,
        max_filter_misses: Option<u32>,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        // A fraction+identity pair switches to contig-interval search
        if let (Some(kmer_fraction), Some(seq_identity)) = (msg.kmer_fraction, msg.seq_identity) {
            let hits = self.searcher.contig_search(
                query.as_bytes(),
                msg.outer_radius,
                kmer_fraction,
                seq_identity,
            )?;
            for hit in hits {
                lines.push(format!(
                    "{:.4} {} {} {}",
                    hit.score, hit.genome_name, hit.contig_name, hit.interval.t_start
                ));
            }
            return Ok(());
        }
        match msg.search_mode {
            SearchMode::Coarse => {
                let packed = crate::ramgrid::kmer_codec::PackedKmer::encode(query)
                    .map_err(|e| RamGridError::Protocol(e.to_string()))?;
                for centroid_id in self.searcher.coarse_search(&packed, msg.outer_radius)? {
                    lines.push(centroid_id.to_string());
                }
            }
            SearchMode::Full => {
                let results = self.searcher.search_decoded(
                    query,
                    msg.outer_radius,
                    msg.inner_radius,
                    inner_metric,
                    max_filter_misses,
                )?;
                lines.extend(results);
            }
        }
        Ok(())
    }
}

/// Client side of the request protocol: one JSON message per line, one
/// reply per request.
pub struct SearchClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl SearchClient {
    pub fn connect(port: u16) -> Result<Self> {
        let writer = TcpStream::connect(("127.0.0.1", port))?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(SearchClient { reader, writer })
    }

    fn request(&mut self, msg: &Value) -> Result<Value> {
        writeln!(self.writer, "{}", serde_json::to_string(msg)?)?;
        self.writer.flush()?;
        let mut line = String::new();
        self.reader.read_line(&mut line)?;
        let reply: Value = serde_json::from_str(line.trim_end())
            .map_err(|e| RamGridError::Protocol(format!("malformed reply: {}", e)))?;
        if let Some("error") = reply.get("type").and_then(Value::as_str) {
            let message = reply
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown server error");
            return Err(RamGridError::Protocol(message.to_string()));
        }
        Ok(reply)
    }

    pub fn handshake(&mut self) -> Result<()> {
        self.request(&json!({"type": "handshake"}))?;
        Ok(())
    }

    /// Sequence search; returns the newline-separated result lines.
    pub fn search(
        &mut self,
        query: &str,
        outer_radius: f64,
        inner_radius: f64,
        inner_metric: InnerMetric,
        coarse: bool,
    ) -> Result<Vec<String>> {
        let reply = self.request(&json!({
            "type": "search",
            "query_type": "sequence",
            "query": query,
            "outer_radius": outer_radius,
            "inner_radius": inner_radius,
            "inner_metric": inner_metric.to_string(),
            "search_mode": if coarse { "coarse" } else { "full" },
        }))?;
        Ok(reply_lines(&reply))
    }

    /// Contig-interval search; result lines are
    /// `score genome contig offset`. The interval thresholds replace the
    /// inner refinement, so the inner fields ride along as no-ops.
    pub fn contig_search(
        &mut self,
        query: &str,
        radius: f64,
        kmer_fraction: f64,
        seq_identity: f64,
    ) -> Result<Vec<String>> {
        let reply = self.request(&json!({
            "type": "search",
            "query_type": "sequence",
            "query": query,
            "outer_radius": radius,
            "inner_radius": 0.0,
            "inner_metric": "none",
            "search_mode": "full",
            "kmer_fraction": kmer_fraction,
            "seq_identity": seq_identity,
        }))?;
        Ok(reply_lines(&reply))
    }

    /// File search: the server writes `result_file` and replies `DONE`.
    pub fn file_search(
        &mut self,
        query_file: &Path,
        result_file: &Path,
        outer_radius: f64,
        inner_radius: f64,
        inner_metric: InnerMetric,
    ) -> Result<()> {
        let reply = self.request(&json!({
            "type": "search",
            "query_type": "file",
            "query": query_file.to_string_lossy(),
            "result_file": result_file.to_string_lossy(),
            "outer_radius": outer_radius,
            "inner_radius": inner_radius,
            "inner_metric": inner_metric.to_string(),
            "search_mode": "full",
        }))?;
        match reply.as_str() {
            Some("DONE") => Ok(()),
            other => Err(RamGridError::Protocol(format!(
                "expected DONE, got {:?}",
                other
            ))),
        }
    }

    /// Fire-and-forget shutdown; the server sends no reply.
    pub fn send_shutdown(&mut self) -> Result<()> {
        writeln!(
            self.writer,
            "{}",
            serde_json::to_string(&json!({"type": "shutdown"}))?
        )?;
        self.writer.flush()?;
        Ok(())
    }
}

fn reply_lines(reply: &Value) -> Vec<String> {
    match reply.as_str() {
        Some("") | None => Vec::new(),
        Some(text) => text.lines().map(str::to_string).collect(),
    }
}
