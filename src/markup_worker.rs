//! Blocking bridge to a markup parser hosted on a dedicated thread.
//!
//! Callers see an ordinary synchronous [`MarkupParser`]: each call sends one
//! request and blocks until the worker replies. There is no cancellation and
//! no timeout.

use log::{debug, warn};
use std::io;
use std::thread::{self, JoinHandle};

use crate::markup::{MarkupError, MarkupParseResult, MarkupParser};

type Reply = Result<MarkupParseResult, MarkupError>;

struct Request {
    code: String,
    reply: async_channel::Sender<Reply>,
}

pub struct WorkerMarkupParser {
    requests: async_channel::Sender<Request>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerMarkupParser {
    pub fn spawn<P>(parser: P) -> io::Result<Self>
    where
        P: MarkupParser + Send + 'static,
    {
        let (tx, rx) = async_channel::bounded::<Request>(1);
        let handle = thread::Builder::new()
            .name("markup-worker".to_string())
            .spawn(move || {
                debug!("[MARKUP-WORKER] Started.");
                while let Ok(request) = rx.recv_blocking() {
                    let result = parser.parse(&request.code);
                    if request.reply.send_blocking(result).is_err() {
                        warn!("[MARKUP-WORKER] Caller went away before the reply.");
                    }
                }
                debug!("[MARKUP-WORKER] Shutting down.");
            })?;
        Ok(Self {
            requests: tx,
            handle: Some(handle),
        })
    }
}

impl MarkupParser for WorkerMarkupParser {
    fn parse(&self, code: &str) -> Result<MarkupParseResult, MarkupError> {
        let (reply_tx, reply_rx) = async_channel::bounded::<Reply>(1);
        self.requests
            .send_blocking(Request {
                code: code.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| MarkupError::Worker("request channel closed".to_string()))?;
        reply_rx
            .recv_blocking()
            .map_err(|_| MarkupError::Worker("worker dropped the request".to_string()))?
    }
}

impl Drop for WorkerMarkupParser {
    fn drop(&mut self) {
        self.requests.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("[MARKUP-WORKER] Worker thread panicked.");
            }
        }
    }
}
