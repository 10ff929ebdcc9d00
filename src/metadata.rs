//! Track metadata from the Shairport Sync pipe.
//!
//! Shairport writes `<item>` blocks to a FIFO: a four-character type and
//! code as hex, and a base64 payload. We care about a handful of codes:
//! `core/minm` (title), `core/asar` (artist), `ssnc/snam` (source app)
//! and the play-state markers. Snapshots are published whole so readers
//! never observe a half-updated track.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{debug, info, warn};

use crate::config::MetadataSettings;
use crate::shared::{Latest, StopFlag};

const RETRY_INITIAL: Duration = Duration::from_millis(500);
const RETRY_CAP: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 4096;

/// Tail kept when the buffer holds no complete item, enough for any
/// partial block that is still arriving.
const BUFFER_TAIL: usize = 4096;

/// Current-track snapshot. Replaced wholesale on every change and reset
/// to default when the source disconnects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub source_app: String,
    pub playing: bool,
}

impl TrackMetadata {
    /// "Artist - Title" line for the scroller.
    pub fn display_line(&self) -> String {
        match (self.artist.is_empty(), self.title.is_empty()) {
            (false, false) => format!("{} - {}", self.artist, self.title),
            (false, true) => self.artist.clone(),
            _ => self.title.clone(),
        }
    }
}

/// One decoded pipe item.
#[derive(Debug, PartialEq)]
struct Item {
    type_code: String,
    code: String,
    payload: Vec<u8>,
}

/// Accumulates pipe bytes and drains complete `<item>` blocks.
struct ItemScanner {
    buffer: String,
}

impl ItemScanner {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Vec<Item> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut items = Vec::new();
        loop {
            let Some(start) = self.buffer.find("<item>") else {
                // No item start anywhere: keep only a tail for partial tags.
                if self.buffer.len() > BUFFER_TAIL {
                    let cut = self.buffer.len() - BUFFER_TAIL;
                    if self.buffer.is_char_boundary(cut) {
                        self.buffer.drain(..cut);
                    }
                }
                break;
            };
            let Some(end) = self.buffer[start..].find("</item>") else {
                // Item still incomplete: drop any junk before it and wait.
                if start > 0 {
                    self.buffer.drain(..start);
                }
                break;
            };
            let end = start + end + "</item>".len();
            let block = self.buffer[start..end].to_string();
            self.buffer.drain(..end);
            if let Some(item) = parse_item(&block) {
                items.push(item);
            }
        }
        items
    }
}

/// Text between `<tag ...>` and `</tag>`.
fn tag_text<'a>(block: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let at = block.find(&open)?;
    let rest = &block[at..];
    let body_start = at + rest.find('>')? + 1;
    let body_end = body_start + block[body_start..].find(&close)?;
    Some(&block[body_start..body_end])
}

/// Decode a hex string ("636f7265") into its ASCII text ("core").
fn decode_hex_ascii(hex: &str) -> Option<String> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut out = String::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        let byte = u8::from_str_radix(hex.get(i..i + 2)?, 16).ok()?;
        out.push(byte as char);
    }
    Some(out)
}

fn parse_item(block: &str) -> Option<Item> {
    let type_code = decode_hex_ascii(tag_text(block, "type")?)?;
    let code = decode_hex_ascii(tag_text(block, "code")?)?;
    let payload = match tag_text(block, "data") {
        Some(data) => {
            let compact: String = data.split_whitespace().collect();
            BASE64.decode(compact).ok()?
        }
        None => Vec::new(),
    };
    Some(Item {
        type_code,
        code,
        payload,
    })
}

/// Fold one item into the working snapshot. Returns true on any change
/// worth republishing.
fn apply(item: &Item, current: &mut TrackMetadata) -> bool {
    let text = || String::from_utf8_lossy(&item.payload).trim().to_string();
    match (item.type_code.as_str(), item.code.as_str()) {
        ("core", "minm") => {
            let title = text();
            if current.title != title {
                current.title = title;
                return true;
            }
        }
        ("core", "asar") => {
            let artist = text();
            if current.artist != artist {
                current.artist = artist;
                return true;
            }
        }
        ("ssnc", "snam") => {
            let app = text();
            if current.source_app != app {
                current.source_app = app;
                return true;
            }
        }
        ("ssnc", "pbeg") | ("ssnc", "prsm") => {
            if !current.playing {
                current.playing = true;
                return true;
            }
        }
        ("ssnc", "pfls") => {
            if current.playing {
                current.playing = false;
                return true;
            }
        }
        ("ssnc", "pend") => {
            // Session over: the stale track must not linger on screen.
            if *current != TrackMetadata::default() {
                *current = TrackMetadata::default();
                return true;
            }
        }
        _ => {}
    }
    false
}

/// Spawn the metadata tail worker. Publishes `TrackMetadata` snapshots
/// into `out`; reopens the pipe with capped backoff whenever the producer
/// goes away. Never fatal to the rest of the pipeline.
pub fn spawn(
    settings: MetadataSettings,
    out: Arc<Latest<TrackMetadata>>,
    stop: StopFlag,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("metadata".into())
        .spawn(move || run(settings, out, stop))
        .expect("spawning metadata thread")
}

fn open_pipe(settings: &MetadataSettings) -> std::io::Result<File> {
    // O_NONBLOCK: opening a FIFO read-only must not hang waiting for a
    // writer, and reads must return instead of blocking past the stop flag.
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(&settings.pipe_path)
}

fn run(settings: MetadataSettings, out: Arc<Latest<TrackMetadata>>, stop: StopFlag) {
    let mut scanner = ItemScanner::new();
    let mut current = TrackMetadata::default();
    let mut backoff = RETRY_INITIAL;
    let mut open_warned = false;

    while !stop.is_raised() {
        let mut pipe = match open_pipe(&settings) {
            Ok(pipe) => {
                if open_warned {
                    info!("metadata pipe {} available", settings.pipe_path.display());
                    open_warned = false;
                }
                backoff = RETRY_INITIAL;
                pipe
            }
            Err(e) => {
                if !open_warned {
                    warn!(
                        "cannot open metadata pipe {}: {}",
                        settings.pipe_path.display(),
                        e
                    );
                    open_warned = true;
                }
                if stop.sleep(backoff) {
                    break;
                }
                backoff = (backoff * 2).min(RETRY_CAP);
                continue;
            }
        };

        let mut chunk = [0u8; READ_CHUNK];
        let mut saw_data = false;
        loop {
            if stop.is_raised() {
                return;
            }
            match pipe.read(&mut chunk) {
                Ok(0) => {
                    // EOF: either no writer yet, or the producer exited.
                    if saw_data {
                        info!("metadata pipe closed by producer, reopening");
                    }
                    break;
                }
                Ok(n) => {
                    saw_data = true;
                    for item in scanner.push(&chunk[..n]) {
                        if apply(&item, &mut current) {
                            debug!("metadata update: {:?}", current);
                            out.publish(current.clone());
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if stop.sleep(POLL_INTERVAL) {
                        return;
                    }
                }
                Err(e) => {
                    warn!("metadata pipe read error: {}", e);
                    break;
                }
            }
        }

        // Pipe handle dropped here; rate-limit the reopen cycle.
        if stop.sleep(if saw_data { RETRY_INITIAL } else { backoff }) {
            break;
        }
        if !saw_data {
            backoff = (backoff * 2).min(RETRY_CAP);
        }
    }
    debug!("metadata thread stopped");
}
