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

pub mod clock;
pub mod config;
pub mod discontinuity;
pub mod epoch;
pub mod error;
pub mod fraction;
pub mod frame;
pub mod port;
pub mod rectifier;
pub mod scheduler;
pub mod selection;
pub mod sink;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PortDescriptor, RectifierConfig, StarvationPolicy, Tunables};
pub use error::{ConfigError, RectifierError, RectifierResult, SchedulerError};
pub use fraction::Fraction;
pub use frame::{Frame, Payload, PortKind, PresentationTime, RectifiedFrame, Ticks, CLOCK_RATE};
pub use rectifier::Rectifier;
pub use scheduler::{ManualScheduler, Scheduler, TaskId, TokioScheduler};
pub use sink::{BackpressureDrop, ChannelSink, OutputSink};
