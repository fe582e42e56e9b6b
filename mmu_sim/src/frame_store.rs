/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use core::fmt;

use crate::{error::MMUError, process::ProcessId};

/// One physical frame.
///
/// A frame is occupied exactly when it has an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Frame {
    index: usize,
    owner: Option<ProcessId>,
}

impl Frame {
    fn new(index: usize) -> Self {
        Self { index, owner: None }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn owner(&self) -> Option<ProcessId> {
        self.owner
    }

    pub fn is_occupied(&self) -> bool {
        self.owner.is_some()
    }

    fn assign(&mut self, pid: ProcessId) {
        self.owner = Some(pid);
    }

    fn release(&mut self) {
        self.owner = None;
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            Some(pid) => write!(f, "frame {}: occupied by {}", self.index, pid),
            None => write!(f, "frame {}: free", self.index),
        }
    }
}

/// Fixed-size array of physical frames.
///
/// Has no synchronization of its own, all mutation goes through the
/// translation unit which is only driven from the simulation thread.
#[derive(Debug)]
pub struct FrameStore {
    frames: Vec<Frame>,
}

impl FrameStore {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: (0..frame_count).map(Frame::new).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.frames.len()
    }

    pub fn get(&self, index: usize) -> Result<&Frame, MMUError> {
        self.frames.get(index).ok_or(MMUError::InvalidFrame {
            index,
            frame_count: self.frames.len(),
        })
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Frame, MMUError> {
        let frame_count = self.frames.len();
        self.frames
            .get_mut(index)
            .ok_or(MMUError::InvalidFrame { index, frame_count })
    }

    /// Marks frame `index` as occupied by `pid`
    pub fn assign(&mut self, index: usize, pid: ProcessId) -> Result<(), MMUError> {
        let frame = self.get_mut(index)?;
        debug_assert!(
            !frame.is_occupied(),
            "frame {} is already owned by {:?}",
            index,
            frame.owner
        );
        frame.assign(pid);
        Ok(())
    }

    pub fn release(&mut self, index: usize) -> Result<(), MMUError> {
        self.get_mut(index)?.release();
        Ok(())
    }

    /// First-fit: lowest free frame index
    pub fn first_free(&self) -> Option<usize> {
        self.frames.iter().position(|frame| !frame.is_occupied())
    }

    pub fn free_count(&self) -> usize {
        self.frames.iter().filter(|frame| !frame.is_occupied()).count()
    }

    pub fn occupied_count(&self) -> usize {
        self.frames.iter().filter(|frame| frame.is_occupied()).count()
    }

    pub fn frames_owned_by(&self, pid: ProcessId) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.owner == Some(pid))
            .count()
    }

    /// Releases every frame
    pub fn clear(&mut self) {
        for frame in self.frames.iter_mut() {
            frame.release();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}
