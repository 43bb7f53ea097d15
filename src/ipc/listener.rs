//! Line-based [`CommandSource`] implementation.
//!
//! Reads requests from any [`BufRead`] (stdin in the daemon) and writes one
//! reply per request to any [`Write`] (stdout in the daemon).  A request is
//! handled completely, reply included, before the next line is read, so
//! layout changes never overlap.
//!
//! # Wire format
//!
//! Every request is a single line, either a JSON string or a bare word:
//!
//! ```text
//! "MainOnly"
//! "main-and-above"
//! all
//! ```
//!
//! Every reply is a single line of JSON, a serialized
//! [`LayoutResult`](crate::layout::LayoutResult) or an error object:
//!
//! ```json
//! {"layout_name":"All screens","success":true,"expected_active":3,"actual_active":3,"attempts":1,"message":"All screens: 3 display(s) active as expected."}
//! {"error":"invalid layout: \"sideways\""}
//! ```

use crate::layout::{Layout, LayoutCommand};
use crate::traits::CommandSource;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::sync::mpsc;

/// A [`CommandSource`] that reads newline-delimited layout requests.
pub struct LineListener<R, W> {
    reader: R,
    writer: W,
}

/// Errors produced by the line listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json encode error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ErrorReply<'a> {
    error: &'a str,
}

/// Parse one request line: a JSON string or a bare layout name.
pub fn parse_request(line: &str) -> Result<Layout, String> {
    let line = line.trim();
    if line.starts_with('"') {
        serde_json::from_str::<Layout>(line).map_err(|e| e.to_string())
    } else {
        Layout::parse(line).ok_or_else(|| format!("invalid layout: {:?}", line))
    }
}

impl<R, W> LineListener<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// The reply side of the transport.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn reply<T: Serialize>(&mut self, value: &T) -> Result<(), ListenerError> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn reply_error(&mut self, message: &str) -> Result<(), ListenerError> {
        self.reply(&ErrorReply { error: message })
    }
}

impl<R, W> CommandSource for LineListener<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    type Error = ListenerError;

    /// Read requests until end of input.
    ///
    /// This method **blocks**.  Run it on a dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<LayoutCommand>) -> Result<(), Self::Error> {
        info!("reading layout requests");
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let text = match std::str::from_utf8(&buf) {
                Ok(s) => s.trim().to_string(),
                Err(e) => {
                    warn!("bad request: not valid UTF-8 ({})", e);
                    self.reply_error(&format!("request is not valid UTF-8: {}", e))?;
                    continue;
                }
            };
            if text.is_empty() {
                continue;
            }

            let layout = match parse_request(&text) {
                Ok(layout) => layout,
                Err(e) => {
                    warn!("bad request: {} ({})", text, e);
                    self.reply_error(&e)?;
                    continue;
                }
            };

            debug!("received {:?}", layout);
            let (tx, rx) = mpsc::channel();
            if sink.send(LayoutCommand { layout, reply: tx }).is_err() {
                info!("sink closed, shutting down");
                return Ok(());
            }
            match rx.recv() {
                Ok(result) => self.reply(&result)?,
                Err(_) => {
                    error!("{}: request dropped without a result", layout);
                    self.reply_error("request dropped without a result")?;
                }
            }
        }
        info!("end of input");
        Ok(())
    }
}

//  Tests
