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
use crate::frame::{Frame, Ticks};
use crate::port::Port;

#[derive(Debug, Clone)]
pub enum Selection {
    Fresh(Frame),
    Repeat(Frame),
    None,
}

pub fn select(port: &mut Port, target: Ticks, frame_period: Fraction) -> Selection {
    let half_period = frame_period * Fraction::new(1, 2);
    let stale_threshold = target - half_period.to_ticks_round();
    let future_threshold = target + frame_period.to_ticks_round().max(1);

    prune_stale(port, stale_threshold);

    let candidate_index = port
        .queue()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.media_time <= future_threshold)
        .min_by(|(_, a), (_, b)| {
            let da = (a.media_time - target).abs();
            let db = (b.media_time - target).abs();
            da.cmp(&db)
                .then_with(|| a.clock_time.cmp(&b.clock_time))
                .then_with(|| a.media_time.cmp(&b.media_time))
        })
        .map(|(i, _)| i);

    match candidate_index {
        Some(i) => {
            let frame = port.queue_mut().remove(i).expect("index came from iter()");
            port.last_emitted_media_time = Some(frame.media_time);
            port.last_emitted_frame = Some(frame.clone());
            Selection::Fresh(frame)
        }
        None => match &port.last_emitted_frame {
            Some(frame) => Selection::Repeat(frame.clone()),
            None => Selection::None,
        },
    }
}

fn prune_stale(port: &mut Port, stale_threshold: Ticks) {
    loop {
        let drop_front = match (port.queue().front(), port.queue().get(1)) {
            (Some(front), Some(second)) => {
                front.media_time < stale_threshold && second.media_time < stale_threshold
            }
            _ => false,
        };
        if drop_front {
            port.queue_mut().pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Payload, PortKind};

    fn push(port: &mut Port, media_time: Ticks, clock_time: Ticks) {
        let mut f = Frame::incoming(media_time, Payload::new(Vec::new()));
        f.clock_time = clock_time;
        port.push(f);
    }

    #[test]
    fn picks_closest_with_tie_break_on_clock_time() {
        let mut port = Port::new(0, PortKind::Video);
        push(&mut port, 1000, 10);
        push(&mut port, 1010, 5); // equidistant from 1005, earlier clock_time wins
        push(&mut port, 1000, 20);
        let frame_period = Fraction::integer(20);
        let selection = select(&mut port, 1005, frame_period);
        match selection {
            Selection::Fresh(f) => assert_eq!(f.clock_time, 5),
            other => panic!("expected Fresh selection, got {other:?}"),
        }
    }

    #[test]
    fn future_bias_leaves_far_future_frames_queued() {
        let mut port = Port::new(0, PortKind::Video);
        push(&mut port, 10_000, 0);
        let frame_period = Fraction::integer(100);
        let selection = select(&mut port, 0, frame_period);
        assert!(matches!(selection, Selection::None));
        assert_eq!(port.queue().len(), 1);
    }

    #[test]
    fn starvation_with_empty_queue_yields_none() {
        let mut port = Port::new(0, PortKind::Video);
        let frame_period = Fraction::integer(100);
        let selection = select(&mut port, 500, frame_period);
        assert!(matches!(selection, Selection::None));
    }

    #[test]
    fn starvation_after_first_emit_repeats_last_frame() {
        let mut port = Port::new(0, PortKind::Video);
        let frame_period = Fraction::integer(100);
        push(&mut port, 1000, 0);
        let first = select(&mut port, 1000, frame_period);
        assert!(matches!(first, Selection::Fresh(_)));

        let starved = select(&mut port, 1100, frame_period);
        match starved {
            Selection::Repeat(f) => assert_eq!(f.media_time, 1000),
            other => panic!("expected Repeat selection, got {other:?}"),
        }
    }
}
