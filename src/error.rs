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

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port 0 must carry video metadata, got {0:?}")]
    MasterPortNotVideo(crate::frame::PortKind),
    #[error("frame rate must be > 0, got {0}")]
    NonPositiveFrameRate(String),
}

#[derive(Error, Debug, Diagnostic, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler rejected time {requested} (now is {now})")]
    TimeInPast { requested: i64, now: i64 },
    #[error("scheduler task id {0} was already cancelled or never existed")]
    UnknownTaskId(u64),
}

#[derive(Error, Debug, Diagnostic)]
pub enum RectifierError {
    #[error("rectifier configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("rectifier scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

pub type RectifierResult<T> = Result<T, RectifierError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SchedulerResult<T> = Result<T, SchedulerError>;
