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

use crate::config::Tunables;
use crate::epoch::Epoch;
use crate::fraction::Fraction;
use crate::frame::Ticks;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscontinuityAction {
    Noise,
    Gapping,
    ForwardRebaseline,
    BackwardRebaseline,
}

pub fn classify(
    epoch: &Epoch,
    frame_period: Fraction,
    k_last: i64,
    incoming_media_time: Ticks,
    consecutive_missed_ticks: u32,
    tunables: &Tunables,
) -> DiscontinuityAction {
    let expected = epoch.ideal_media_time(k_last + 1, frame_period);
    let delta = incoming_media_time - expected;
    let frame_period_ticks = frame_period.to_ticks_round().max(1);

    if delta.abs() <= tunables.tol_jitter {
        return DiscontinuityAction::Noise;
    }

    let forward_tol = tunables.tol_gap_forward_frames * frame_period_ticks;
    let backward_tol = tunables.tol_gap_backward_frames * frame_period_ticks;

    if delta < -backward_tol {
        warn!(
            delta,
            "backward media-time discontinuity detected, re-baselining"
        );
        return DiscontinuityAction::BackwardRebaseline;
    }

    if delta > forward_tol {
        if consecutive_missed_ticks >= tunables.max_missed {
            warn!(
                consecutive_missed_ticks,
                "forward gap exceeded max_missed ticks, re-baselining"
            );
            return DiscontinuityAction::ForwardRebaseline;
        }
        info!(delta, "forward gap within tolerated missed-tick budget");
        return DiscontinuityAction::Gapping;
    }

    DiscontinuityAction::Noise
}
