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

use crate::error::{ConfigError, ConfigResult};
use crate::fraction::Fraction;
use crate::frame::PortKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tunables {
    pub max_queue_frames: usize,
    pub tol_jitter: i64,
    pub tol_gap_forward_frames: i64,
    pub tol_gap_backward_frames: i64,
    pub max_missed: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            max_queue_frames: crate::port::MAX_QUEUE_FRAMES,
            // 1ms in ticks at CLOCK_RATE = 180_000.
            tol_jitter: crate::frame::CLOCK_RATE / 1_000,
            tol_gap_forward_frames: 2,
            tol_gap_backward_frames: 2,
            max_missed: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StarvationPolicy {
    ContinueRepeating,
    EndOfStream,
    AwaitRebootstrap,
}

impl Default for StarvationPolicy {
    fn default() -> Self {
        StarvationPolicy::ContinueRepeating
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDescriptor {
    pub kind: PortKind,
}

pub struct RectifierConfig<C, S> {
    pub clock: C,
    pub scheduler: S,
    pub frame_rate: Fraction,
    pub ports: Vec<PortDescriptor>,
    pub tunables: Tunables,
    pub starvation_policy: StarvationPolicy,
}

impl<C, S> RectifierConfig<C, S> {
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.frame_rate.is_positive() {
            return Err(ConfigError::NonPositiveFrameRate(self.frame_rate.to_string()));
        }
        match self.ports.first() {
            Some(PortDescriptor {
                kind: PortKind::Video,
            }) => Ok(()),
            Some(other) => Err(ConfigError::MasterPortNotVideo(other.kind)),
            None => Err(ConfigError::MasterPortNotVideo(PortKind::Raw)),
        }
    }
}
