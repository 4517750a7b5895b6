//! Explicit channel through which the host page opens or closes the customer widget.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetRequest {
    Open,
    Close,
}

/// Cloneable sender handed to whatever UI element should open the chat.
#[derive(Debug, Clone)]
pub struct OpenHandle {
    tx: Sender<WidgetRequest>,
}

impl OpenHandle {
    /// Returns false once the widget controller has been dropped.
    pub fn request_open(&self) -> bool {
        self.tx.send(WidgetRequest::Open).is_ok()
    }

    pub fn request_close(&self) -> bool {
        self.tx.send(WidgetRequest::Close).is_ok()
    }
}

#[derive(Debug)]
pub struct OpenSignal {
    rx: Receiver<WidgetRequest>,
}

impl OpenSignal {
    /// Drains pending requests; only the latest one matters.
    pub fn latest(&self) -> Option<WidgetRequest> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(request) => latest = Some(request),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return latest,
            }
        }
    }
}

pub fn open_signal() -> (OpenHandle, OpenSignal) {
    let (tx, rx) = mpsc::channel();
    (OpenHandle { tx }, OpenSignal { rx })
}
