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

use crate::epoch::Epoch;
use crate::frame::{Frame, PortKind, Ticks};
use std::collections::VecDeque;
use tracing::warn;

pub const MAX_QUEUE_FRAMES: usize = 30;

pub struct Port {
    pub index: usize,
    pub kind: PortKind,
    queue: VecDeque<Frame>,
    pub last_emitted_media_time: Option<Ticks>,
    pub last_emitted_frame: Option<Frame>,
    pub epoch: Option<Epoch>,
    pub consecutive_missed_ticks: u32,
    pub consecutive_starved_ticks: u32,
    pub gapping: bool,
}

impl Port {
    pub fn new(index: usize, kind: PortKind) -> Self {
        Self {
            index,
            kind,
            queue: VecDeque::new(),
            last_emitted_media_time: None,
            last_emitted_frame: None,
            epoch: None,
            consecutive_missed_ticks: 0,
            consecutive_starved_ticks: 0,
            gapping: false,
        }
    }

    pub fn is_master(&self) -> bool {
        self.index == 0
    }

    pub fn push(&mut self, frame: Frame) {
        if self.queue.len() >= MAX_QUEUE_FRAMES {
            warn!(port = self.index, "input queue full, dropping oldest frame");
            self.queue.pop_front();
        }
        self.queue.push_back(frame);
    }

    pub fn queue(&self) -> &VecDeque<Frame> {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut VecDeque<Frame> {
        &mut self.queue
    }

    pub fn drain(&mut self) {
        self.queue.clear();
        self.last_emitted_frame = None;
        self.last_emitted_media_time = None;
        self.consecutive_starved_ticks = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frame::Payload;

    fn frame(media_time: Ticks) -> Frame {
        Frame::incoming(media_time, Payload::new(Vec::new()))
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut port = Port::new(0, PortKind::Video);
        for i in 0..(MAX_QUEUE_FRAMES as i64 + 5) {
            port.push(frame(i));
        }
        assert_eq!(port.queue().len(), MAX_QUEUE_FRAMES);
        assert_eq!(port.queue().front().unwrap().media_time, 5);
    }
}
