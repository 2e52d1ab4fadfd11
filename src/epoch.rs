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

use crate::fraction::Fraction;
use crate::frame::Ticks;

#[derive(Debug, Clone, Copy)]
pub struct Epoch {
    pub clock_origin: Ticks,
    pub media_origin: Ticks,
}

impl Epoch {
    pub fn new(clock_origin: Ticks, media_origin: Ticks) -> Self {
        Self {
            clock_origin,
            media_origin,
        }
    }

    pub fn ideal_media_time(&self, k: i64, frame_period: Fraction) -> Ticks {
        self.media_origin + frame_period.scale(k).to_ticks_round()
    }

    pub fn ideal_clock_time(&self, k: i64, frame_period: Fraction) -> Ticks {
        self.clock_origin + frame_period.scale(k).to_ticks_round()
    }

    pub fn rebaseline_media(&mut self, media_time: Ticks, k: i64, frame_period: Fraction) {
        self.media_origin = media_time - frame_period.scale(k).to_ticks_round();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ideal_times_progress_by_frame_period() {
        let epoch = Epoch::new(8_801_000, 301_007);
        let frame_period = Fraction::integer(1_000);
        assert_eq!(epoch.ideal_clock_time(0, frame_period), 8_801_000);
        assert_eq!(epoch.ideal_clock_time(5, frame_period), 8_806_000);
        assert_eq!(epoch.ideal_media_time(5, frame_period), 306_007);
    }

    #[test]
    fn rebaseline_preserves_tick_cadence() {
        let mut epoch = Epoch::new(0, 0);
        let frame_period = Fraction::integer(7_200);
        epoch.rebaseline_media(50_000, 10, frame_period);
        assert_eq!(epoch.ideal_media_time(10, frame_period), 50_000);
    }
}
