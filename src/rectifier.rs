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

use crate::clock::Clock;
use crate::config::{RectifierConfig, StarvationPolicy};
use crate::discontinuity::{self, DiscontinuityAction};
use crate::error::RectifierResult;
use crate::fraction::Fraction;
use crate::frame::{Frame, PresentationTime, Ticks};
use crate::port::Port;
use crate::scheduler::{Scheduler, Task, TaskId};
use crate::selection::{self, Selection};
use crate::sink::{self, OutputSink};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

struct State {
    ports: Vec<Port>,
    bootstrapped: bool,
    clock_origin: Ticks,
    next_tick_index: i64,
    active: bool,
    current_tick: Option<TaskId>,
}

struct Shared<C, S> {
    clock: C,
    scheduler: S,
    sink: Arc<dyn OutputSink>,
    frame_period: Fraction,
    tunables: crate::config::Tunables,
    starvation_policy: StarvationPolicy,
    state: Mutex<State>,
}

pub struct Rectifier<C, S> {
    shared: Arc<Shared<C, S>>,
}

impl<C, S> Clone for Rectifier<C, S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C, S> Rectifier<C, S>
where
    C: Clock + 'static,
    S: Scheduler + 'static,
{
    #[instrument(skip(config, sink))]
    pub fn new(config: RectifierConfig<C, S>, sink: Arc<dyn OutputSink>) -> RectifierResult<Self> {
        config.validate()?;

        let frame_rate = config.frame_rate;
        let frame_period = Fraction::new(
            crate::frame::CLOCK_RATE * frame_rate.den(),
            frame_rate.num(),
        );
        let ports = config
            .ports
            .iter()
            .enumerate()
            .map(|(index, descriptor)| Port::new(index, descriptor.kind))
            .collect();

        Ok(Self {
            shared: Arc::new(Shared {
                clock: config.clock,
                scheduler: config.scheduler,
                sink,
                frame_period,
                tunables: config.tunables,
                starvation_policy: config.starvation_policy,
                state: Mutex::new(State {
                    ports,
                    bootstrapped: false,
                    clock_origin: 0,
                    next_tick_index: 0,
                    active: true,
                    current_tick: None,
                }),
            }),
        })
    }

    #[instrument(skip(self, frame), fields(port = port_index))]
    pub fn on_frame_pushed(&self, port_index: usize, mut frame: Frame) {
        let now = self.shared.clock.now();
        frame.clock_time = now;
        if frame.creation_time.is_none() {
            frame.creation_time = Some(now);
        }

        let mut schedule_first_tick_at = None;
        {
            let mut state = self.shared.state.lock().expect("rectifier mutex poisoned");

            if state.ports.get(port_index).is_none() {
                warn!(port_index, "frame pushed to unknown port index, dropping");
                return;
            }

            if !state.bootstrapped {
                let frame_period_ticks = self.shared.frame_period.to_ticks_round().max(1);
                state.clock_origin = ceil_to_multiple(now, frame_period_ticks);
                state.bootstrapped = true;
                info!(clock_origin = state.clock_origin, "rectifier bootstrapped");
                schedule_first_tick_at = Some(state.clock_origin);
            }

            let clock_origin = state.clock_origin;
            let next_tick_index = state.next_tick_index;
            let frame_period = self.shared.frame_period;
            let tunables = self.shared.tunables;
            let port = &mut state.ports[port_index];

            match port.epoch {
                None => {
                    port.epoch = Some(crate::epoch::Epoch::new(clock_origin, frame.media_time));
                }
                Some(mut epoch) => {
                    let action = discontinuity::classify(
                        &epoch,
                        frame_period,
                        next_tick_index - 1,
                        frame.media_time,
                        port.consecutive_missed_ticks,
                        &tunables,
                    );
                    match action {
                        DiscontinuityAction::Noise => {
                            port.consecutive_missed_ticks = 0;
                            port.gapping = false;
                        }
                        DiscontinuityAction::Gapping => {
                            port.consecutive_missed_ticks += 1;
                            port.gapping = true;
                        }
                        DiscontinuityAction::ForwardRebaseline => {
                            epoch.rebaseline_media(frame.media_time, next_tick_index, frame_period);
                            port.epoch = Some(epoch);
                            port.consecutive_missed_ticks = 0;
                            port.gapping = false;
                        }
                        DiscontinuityAction::BackwardRebaseline => {
                            epoch.rebaseline_media(frame.media_time, next_tick_index, frame_period);
                            port.epoch = Some(epoch);
                            port.consecutive_missed_ticks = 0;
                            port.gapping = false;
                            let media_floor = frame.media_time;
                            port.queue_mut().retain(|f| f.media_time >= media_floor);
                        }
                    }
                }
            }

            port.push(frame);
        }

        if let Some(first_tick_time) = schedule_first_tick_at {
            self.schedule_tick(first_tick_time);
        }
    }

    #[instrument(skip(self))]
    pub fn flush(&self) {
        let mut state = self.shared.state.lock().expect("rectifier mutex poisoned");
        if let Some(id) = state.current_tick.take() {
            self.shared.scheduler.cancel(id);
        }
        for port in state.ports.iter_mut() {
            port.drain();
        }
        info!("rectifier flushed");
    }

    #[instrument(skip(self))]
    pub fn activate(&self) {
        let mut state = self.shared.state.lock().expect("rectifier mutex poisoned");
        state.active = true;
    }

    #[instrument(skip(self))]
    pub fn deactivate(&self) {
        {
            let mut state = self.shared.state.lock().expect("rectifier mutex poisoned");
            state.active = false;
        }
        self.flush();
    }

    fn schedule_tick(&self, time: Ticks) {
        let shared = self.shared.clone();
        let task: Task = Box::new(move |tick_time| Self::run_tick(&shared, tick_time));
        match self.shared.scheduler.schedule_at(task, time) {
            Ok(id) => {
                self.shared
                    .state
                    .lock()
                    .expect("rectifier mutex poisoned")
                    .current_tick = Some(id);
            }
            Err(error) => {
                tracing::error!(%error, "failed to schedule rectifier tick");
            }
        }
    }

    fn run_tick(shared: &Arc<Shared<C, S>>, tick_time: Ticks) {
        let next_time;
        {
            let mut state = shared.state.lock().expect("rectifier mutex poisoned");
            if !state.active {
                return;
            }

            let k = state.next_tick_index;
            let frame_period = shared.frame_period;
            let expected_tick_time = state.clock_origin + frame_period.scale(k).to_ticks_round();
            if tick_time > expected_tick_time + shared.tunables.tol_jitter {
                warn!(
                    k,
                    expected_tick_time, tick_time, "scheduler fired tick later than expected"
                );
            }

            for port_index in 0..state.ports.len() {
                let port = &mut state.ports[port_index];
                let Some(epoch) = port.epoch else {
                    continue;
                };
                let target = epoch.ideal_media_time(k, frame_period);
                match selection::select(port, target, frame_period) {
                    Selection::Fresh(frame) => {
                        port.consecutive_starved_ticks = 0;
                        let presentation_time = frame_period.scale(k).to_ticks_round();
                        let rectified = frame.rectified(PresentationTime(presentation_time));
                        sink::emit_or_warn(shared.sink.as_ref(), port_index, rectified);
                    }
                    Selection::Repeat(frame) => {
                        port.consecutive_starved_ticks += 1;
                        if port.is_master()
                            && port.consecutive_starved_ticks > shared.tunables.max_missed
                            && shared.starvation_policy != StarvationPolicy::ContinueRepeating
                        {
                            warn!(
                                port = port_index,
                                consecutive_starved_ticks = port.consecutive_starved_ticks,
                                policy = ?shared.starvation_policy,
                                "master port starved past max_missed ticks; {:?} is not yet \
                                 implemented, falling back to repeating the last frame",
                                shared.starvation_policy
                            );
                        }
                        // presentation time is tick-relative, not tick_time.
                        let presentation_time = frame_period.scale(k).to_ticks_round();
                        let rectified = frame.rectified(PresentationTime(presentation_time));
                        sink::emit_or_warn(shared.sink.as_ref(), port_index, rectified);
                    }
                    Selection::None => {}
                }
            }

            state.next_tick_index = k + 1;
            next_time = state.clock_origin + frame_period.scale(k + 1).to_ticks_round();
        }

        let shared_next = shared.clone();
        let task: Task = Box::new(move |t| Self::run_tick(&shared_next, t));
        match shared.scheduler.schedule_at(task, next_time) {
            Ok(id) => {
                shared.state.lock().expect("rectifier mutex poisoned").current_tick = Some(id);
            }
            Err(error) => {
                tracing::error!(%error, "failed to schedule next rectifier tick");
            }
        }
    }
}

fn ceil_to_multiple(value: Ticks, multiple: Ticks) -> Ticks {
    if multiple <= 0 {
        return value;
    }
    let rem = value.rem_euclid(multiple);
    if rem == 0 {
        value
    } else {
        value + (multiple - rem)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{PortDescriptor, Tunables};
    use crate::frame::{Payload, PortKind, RectifiedFrame};
    use crate::scheduler::ManualScheduler;
    use std::sync::Mutex as StdMutex;

    struct RecordingSink {
        emitted: Arc<StdMutex<Vec<(usize, RectifiedFrame)>>>,
    }

    impl OutputSink for RecordingSink {
        fn emit(
            &self,
            port_index: usize,
            frame: RectifiedFrame,
        ) -> Result<(), crate::sink::BackpressureDrop> {
            self.emitted.lock().unwrap().push((port_index, frame));
            Ok(())
        }
    }

    fn build(
        frame_rate: Fraction,
        ports: Vec<PortDescriptor>,
    ) -> (
        Rectifier<ManualClock, ManualScheduler>,
        ManualClock,
        ManualScheduler,
        Arc<StdMutex<Vec<(usize, RectifiedFrame)>>>,
    ) {
        let clock = ManualClock::new(0);
        let scheduler = ManualScheduler::new();
        let emitted = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink {
            emitted: emitted.clone(),
        });
        let config = RectifierConfig {
            clock: clock.clone(),
            scheduler: scheduler.clone(),
            frame_rate,
            ports,
            tunables: Tunables::default(),
            starvation_policy: Default::default(),
        };
        let rectifier = Rectifier::new(config, sink).unwrap();
        (rectifier, clock, scheduler, emitted)
    }

    fn video_ports(n: usize) -> Vec<PortDescriptor> {
        let mut v = vec![PortDescriptor {
            kind: PortKind::Video,
        }];
        for _ in 1..n {
            v.push(PortDescriptor {
                kind: PortKind::Audio,
            });
        }
        v
    }

    #[test]
    fn simple_offset_scenario() {
        // fps = CLOCK_RATE/1000.
        let frame_rate = Fraction::new(crate::frame::CLOCK_RATE, 1000);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(1));

        let pushes = [
            (8_801_000i64, 301_007i64),
            (8_802_000, 301_007),
            (8_803_000, 302_007),
            (8_804_000, 303_007),
            (8_805_000, 304_007),
        ];
        for (clk, mt) in pushes {
            clock.set(clk);
            rectifier.on_frame_pushed(0, Frame::incoming(mt, Payload::new(Vec::new())));
            scheduler.run_due(clk);
        }
        clock.set(8_806_000);
        scheduler.run_due(8_806_000);

        let got = emitted.lock().unwrap();
        let presentations: Vec<i64> = got.iter().map(|(_, f)| f.presentation_time.0).collect();
        assert_eq!(presentations, vec![0, 1000, 2000, 3000, 4000, 5000]);
    }

    #[test]
    fn loss_of_input_repeats_last_frame() {
        let frame_rate = Fraction::new(crate::frame::CLOCK_RATE, 100);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(1));

        clock.set(1000);
        rectifier.on_frame_pushed(0, Frame::incoming(0, Payload::new(Vec::new())));
        clock.set(1500);
        scheduler.run_due(1500);

        let got = emitted.lock().unwrap();
        let presentations: Vec<i64> = got.iter().map(|(_, f)| f.presentation_time.0).collect();
        assert_eq!(presentations, vec![0, 100, 200, 300, 400, 500]);
        assert!(got.iter().all(|(_, f)| f.media_time == 0));
    }

    #[test]
    fn backward_discontinuity_rebaselines_and_continues_progression() {
        let frame_rate = Fraction::integer(25);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(1));
        let frame_period = Fraction::new(crate::frame::CLOCK_RATE, 25).to_ticks_round();

        let mut clk = 0i64;
        for i in 0..15i64 {
            clock.set(clk);
            rectifier.on_frame_pushed(0, Frame::incoming(i * frame_period, Payload::new(Vec::new())));
            scheduler.run_due(clk);
            clk += frame_period;
        }
        for i in 0..15i64 {
            clock.set(clk);
            rectifier.on_frame_pushed(0, Frame::incoming(i * frame_period, Payload::new(Vec::new())));
            scheduler.run_due(clk);
            clk += frame_period;
        }
        clock.set(clk);
        scheduler.run_due(clk);

        let got = emitted.lock().unwrap();
        let presentations: Vec<i64> = got.iter().map(|(_, f)| f.presentation_time.0).collect();
        let expected: Vec<i64> = (0..presentations.len() as i64).map(|k| k * frame_period).collect();
        assert_eq!(presentations, expected);
    }

    #[test]
    fn two_stream_alignment_shares_presentation_time_per_tick() {
        let frame_rate = Fraction::integer(25);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(2));

        let video_times = [0i64, 7200, 14400, 21600];
        let audio_times = [0i64, 3840, 7680, 11520];
        let mut clk = 0i64;
        for i in 0..4 {
            clock.set(clk);
            rectifier.on_frame_pushed(0, Frame::incoming(video_times[i], Payload::new(Vec::new())));
            rectifier.on_frame_pushed(1, Frame::incoming(audio_times[i], Payload::new(Vec::new())));
            scheduler.run_due(clk);
            clk += 7200;
        }
        clock.set(clk);
        scheduler.run_due(clk);

        let got = emitted.lock().unwrap();
        use std::collections::HashMap;
        let mut by_tick: HashMap<i64, Vec<usize>> = HashMap::new();
        for (port, frame) in got.iter() {
            by_tick.entry(frame.presentation_time.0).or_default().push(*port);
        }
        for ports in by_tick.values() {
            let mut sorted = ports.clone();
            sorted.sort();
            assert!(sorted == vec![0] || sorted == vec![0, 1]);
        }
    }

    #[test]
    fn missing_frame_is_filled_by_repetition() {
        let frame_rate = Fraction::new(crate::frame::CLOCK_RATE, 100);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(1));

        clock.set(0);
        rectifier.on_frame_pushed(0, Frame::incoming(30_107, Payload::new(Vec::new())));
        scheduler.run_due(0); // k=0 emits 30107

        clock.set(100);
        scheduler.run_due(100); // k=1: nothing new pushed, repeats

        clock.set(200);
        rectifier.on_frame_pushed(0, Frame::incoming(30_307, Payload::new(Vec::new())));
        scheduler.run_due(200); // k=2 emits 30307

        clock.set(300);
        scheduler.run_due(300); // k=3: nothing new pushed, repeats

        clock.set(400);
        rectifier.on_frame_pushed(0, Frame::incoming(30_407, Payload::new(Vec::new())));
        scheduler.run_due(400); // k=4 emits 30407

        clock.set(500);
        rectifier.on_frame_pushed(0, Frame::incoming(30_507, Payload::new(Vec::new())));
        scheduler.run_due(500); // k=5 emits 30507

        clock.set(600);
        scheduler.run_due(600); // k=6: nothing new pushed, repeats

        let got = emitted.lock().unwrap();
        let presentations: Vec<i64> = got.iter().map(|(_, f)| f.presentation_time.0).collect();
        assert_eq!(presentations, vec![0, 100, 200, 300, 400, 500, 600]);
    }

    #[test]
    fn noisy_timestamps_are_absorbed_into_clean_output() {
        let frame_rate = Fraction::new(crate::frame::CLOCK_RATE, 100);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(1));

        let pushes = [
            (0i64, 1002i64),
            (95, 1097),
            (205, 1199),
            (310, 1307),
            (388, 1391),
            (512, 1515),
        ];
        for (clk, mt) in pushes {
            clock.set(clk);
            rectifier.on_frame_pushed(0, Frame::incoming(mt, Payload::new(Vec::new())));
            scheduler.run_due(clk);
        }
        clock.set(600);
        scheduler.run_due(600);

        let got = emitted.lock().unwrap();
        let presentations: Vec<i64> = got.iter().map(|(_, f)| f.presentation_time.0).collect();
        assert_eq!(presentations, vec![0, 100, 200, 300, 400, 500, 600]);
    }

    #[test]
    fn starvation_counter_resets_on_fresh_emit_and_grows_while_repeating() {
        let frame_rate = Fraction::new(crate::frame::CLOCK_RATE, 100);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(1));

        clock.set(0);
        rectifier.on_frame_pushed(0, Frame::incoming(0, Payload::new(Vec::new())));
        scheduler.run_due(0); // k=0 fresh

        let mut clk = 100i64;
        for _ in 0..5 {
            clock.set(clk);
            scheduler.run_due(clk); // repeats, nothing pushed
            clk += 100;
        }

        let got = emitted.lock().unwrap();
        assert_eq!(got.len(), 6);
        let presentations: Vec<i64> = got.iter().map(|(_, f)| f.presentation_time.0).collect();
        assert_eq!(presentations, vec![0, 100, 200, 300, 400, 500]);
        assert!(got.iter().all(|(_, f)| f.media_time == 0));
    }

    #[test]
    fn non_integer_frame_rate_keeps_presentation_monotonic() {
        let frame_rate = Fraction::new(30_000, 1_001);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(1));
        let frame_period = Fraction::new(
            crate::frame::CLOCK_RATE * frame_rate.den(),
            frame_rate.num(),
        )
        .to_ticks_round();

        let mut clk = 0i64;
        for k in 0..8i64 {
            clock.set(clk);
            rectifier.on_frame_pushed(0, Frame::incoming(k * frame_period, Payload::new(Vec::new())));
            scheduler.run_due(clk);
            clk += frame_period;
        }
        clock.set(clk);
        scheduler.run_due(clk);

        let got = emitted.lock().unwrap();
        let presentations: Vec<i64> = got.iter().map(|(_, f)| f.presentation_time.0).collect();
        for w in presentations.windows(2) {
            assert!(w[1] > w[0]);
        }
        let expected: Vec<i64> = (0..presentations.len() as i64).map(|k| k * frame_period).collect();
        assert_eq!(presentations, expected);
    }

    #[test]
    fn audio_payload_maintains_byte_continuity_through_repeats() {
        let frame_rate = Fraction::new(crate::frame::CLOCK_RATE, 100);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(2));

        let audio_pushes: [(i64, Option<u8>); 7] = [
            (0, Some(0)),
            (100, None),
            (200, Some(1)),
            (300, None),
            (400, Some(2)),
            (500, Some(3)),
            (600, None),
        ];
        for (clk, audio_byte) in audio_pushes {
            clock.set(clk);
            rectifier.on_frame_pushed(0, Frame::incoming(clk, Payload::new(Vec::new())));
            if let Some(byte) = audio_byte {
                rectifier.on_frame_pushed(1, Frame::incoming(clk, Payload::new(vec![byte])));
            }
            scheduler.run_due(clk);
        }

        let got = emitted.lock().unwrap();
        let audio: Vec<_> = got
            .iter()
            .filter(|(port, _)| *port == 1)
            .map(|(_, f)| f.clone())
            .collect();
        assert_eq!(audio.len(), 7);
        for frame in &audio {
            assert!(!frame.payload.is_empty());
            assert_eq!(frame.payload.len(), 1);
        }
        let bytes: Vec<u8> = audio.iter().map(|f| f.payload.bytes()[0]).collect();
        assert_eq!(bytes, vec![0, 0, 1, 1, 2, 3, 3]);
        for w in bytes.windows(2) {
            let step = w[1].wrapping_sub(w[0]);
            assert!(step == 0 || step == 1);
        }
    }

    #[test]
    fn flush_cancels_pending_tick_and_drains_queues() {
        let frame_rate = Fraction::integer(25);
        let (rectifier, clock, scheduler, emitted) = build(frame_rate, video_ports(1));

        clock.set(0);
        rectifier.on_frame_pushed(0, Frame::incoming(0, Payload::new(Vec::new())));
        assert_eq!(scheduler.pending_count(), 1);

        rectifier.flush();
        assert_eq!(scheduler.pending_count(), 0);

        clock.set(1_000_000);
        scheduler.run_due(1_000_000);
        assert!(emitted.lock().unwrap().is_empty());
    }
}
