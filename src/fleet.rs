//! Several robots on one host, one of them selected.

use mark_core::BoardConfig;
use parking_lot::Mutex;

use crate::discovery::Discovery;
use crate::robot::MarkRobot;
use crate::transport::TransportSettings;
use crate::{Error, Result};

#[derive(Default)]
struct Roster {
    robots: Vec<MarkRobot>,
    /// 0-based index into `robots`.
    active: usize,
}

/// Registry of connected robots.
///
/// Boards are numbered from 1 in discovery order.
#[derive(Default)]
pub struct Fleet {
    roster: Mutex<Roster>,
    settings: TransportSettings,
    board_config: BoardConfig,
}

impl Fleet {
    pub fn new(settings: TransportSettings, board_config: BoardConfig) -> Self {
        Self {
            roster: Mutex::new(Roster::default()),
            settings,
            board_config,
        }
    }

    /// Disconnect every robot, then connect every serial candidate.
    ///
    /// Fails on the first candidate that does not come up; robots connected
    /// before it stay in the fleet.
    pub fn refresh(&self, discovery: &Discovery) -> Result<usize> {
        self.close_all();
        for descriptor in discovery.find_serial_candidates() {
            let robot = MarkRobot::connect(&descriptor, &self.settings, self.board_config)
                .map_err(|source| Error::Load {
                    target: descriptor.display_name().to_string(),
                    source,
                })?;
            self.add(robot);
        }
        Ok(self.count())
    }

    /// Append a robot; returns its number.
    pub fn add(&self, robot: MarkRobot) -> usize {
        log::info!("mark {} is {}", self.count() + 1, robot.name());
        let mut roster = self.roster.lock();
        roster.robots.push(robot);
        roster.robots.len()
    }

    pub fn count(&self) -> usize {
        self.roster.lock().robots.len()
    }

    /// Make robot `n` (1-based) the active one.
    pub fn select(&self, n: usize) -> Result<()> {
        let mut roster = self.roster.lock();
        if n == 0 || n > roster.robots.len() {
            return Err(Error::BoardNotFound(n));
        }
        roster.active = n - 1;
        Ok(())
    }

    /// Number of the active robot, if any.
    pub fn active(&self) -> Option<usize> {
        let roster = self.roster.lock();
        (!roster.robots.is_empty()).then_some(roster.active + 1)
    }

    /// Name of robot `n` (1-based).
    pub fn name(&self, n: usize) -> Result<String> {
        let roster = self.roster.lock();
        n.checked_sub(1)
            .and_then(|i| roster.robots.get(i))
            .map(|robot| robot.name().to_string())
            .ok_or(Error::BoardNotFound(n))
    }

    /// Run `f` on the active robot. `f` must not call back into the fleet.
    pub fn with_active<R>(&self, f: impl FnOnce(&MarkRobot) -> Result<R>) -> Result<R> {
        let roster = self.roster.lock();
        let robot = roster
            .robots
            .get(roster.active)
            .ok_or(Error::BoardNotFound(roster.active + 1))?;
        f(robot)
    }

    /// Stop every robot. Failures are logged and skipped.
    pub fn stop_all(&self) {
        let roster = self.roster.lock();
        for robot in &roster.robots {
            if let Err(err) = robot.stop() {
                log::warn!("{}: stop failed: {err}", robot.name());
            }
        }
    }

    /// Disconnect and forget every robot.
    pub fn close_all(&self) {
        let robots = {
            let mut roster = self.roster.lock();
            roster.active = 0;
            std::mem::take(&mut roster.robots)
        };
        for robot in robots {
            let name = robot.name().to_string();
            if let Err(err) = robot.disconnect() {
                log::warn!("{name}: disconnect failed: {err}");
            }
        }
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        self.close_all();
    }
}
