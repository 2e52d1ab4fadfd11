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

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const CLOCK_RATE: i64 = 180_000;

pub type Ticks = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PortKind {
    Video,
    Audio,
    Raw,
}

#[derive(Debug, Clone)]
pub struct Payload(Arc<[u8]>);

impl Payload {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PresentationTime(pub Ticks);

#[derive(Debug, Clone)]
pub struct Frame {
    pub media_time: Ticks,
    pub clock_time: Ticks,
    pub creation_time: Option<Ticks>,
    pub payload: Payload,
}

impl Frame {
    pub fn incoming(media_time: Ticks, payload: Payload) -> Self {
        Self {
            media_time,
            clock_time: 0,
            creation_time: None,
            payload,
        }
    }

    pub fn rectified(&self, presentation_time: PresentationTime) -> RectifiedFrame {
        RectifiedFrame {
            presentation_time,
            media_time: self.media_time,
            payload: self.payload.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RectifiedFrame {
    pub presentation_time: PresentationTime,
    pub media_time: Ticks,
    pub payload: Payload,
}
