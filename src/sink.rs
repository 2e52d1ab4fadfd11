/*
 *  Copyright (C) 2025 Michael Bachmann
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::frame::RectifiedFrame;
use tracing::warn;

pub trait OutputSink: Send + Sync {
    fn emit(&self, port_index: usize, frame: RectifiedFrame) -> Result<(), BackpressureDrop>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackpressureDrop;

pub fn emit_or_warn(sink: &dyn OutputSink, port_index: usize, frame: RectifiedFrame) {
    let presentation_time = frame.presentation_time;
    if sink.emit(port_index, frame).is_err() {
        warn!(
            port = port_index,
            presentation_time = presentation_time.0,
            "output sink applied backpressure, dropping rectified frame"
        );
    }
}

pub struct ChannelSink {
    sender: tokio::sync::mpsc::Sender<(usize, RectifiedFrame)>,
}

impl ChannelSink {
    pub fn new(sender: tokio::sync::mpsc::Sender<(usize, RectifiedFrame)>) -> Self {
        Self { sender }
    }
}

impl OutputSink for ChannelSink {
    fn emit(&self, port_index: usize, frame: RectifiedFrame) -> Result<(), BackpressureDrop> {
        self.sender
            .try_send((port_index, frame))
            .map_err(|_| BackpressureDrop)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frame::{Payload, PresentationTime, Ticks};
    use std::sync::{Arc, Mutex};

    struct RecordingSink {
        received: Arc<Mutex<Vec<(usize, PresentationTime)>>>,
    }

    impl OutputSink for RecordingSink {
        fn emit(&self, port_index: usize, frame: RectifiedFrame) -> Result<(), BackpressureDrop> {
            self.received
                .lock()
                .unwrap()
                .push((port_index, frame.presentation_time));
            Ok(())
        }
    }

    fn frame(presentation_time: Ticks) -> RectifiedFrame {
        RectifiedFrame {
            presentation_time: PresentationTime(presentation_time),
            media_time: presentation_time,
            payload: Payload::new(Vec::new()),
        }
    }

    #[test]
    fn emit_or_warn_forwards_successful_emits() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            received: received.clone(),
        };
        emit_or_warn(&sink, 1, frame(500));
        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(received.lock().unwrap()[0].0, 1);
    }

    #[test]
    fn channel_sink_reports_backpressure_when_full() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let sink = ChannelSink::new(tx);
        assert!(sink.emit(0, frame(100)).is_ok());
        assert!(sink.emit(0, frame(200)).is_err());
        let (_, received) = rx.try_recv().unwrap();
        assert_eq!(received.presentation_time.0, 100);
    }
}
