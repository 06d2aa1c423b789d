//! Robot repository: where the engine reads robots from and writes them back to.

use crate::models::{Robot, RobotId};
use std::collections::BTreeMap;

/// Storage boundary for robot records. Implementations decide persistence;
/// the engine only needs lookups and whole-record writes.
pub trait RobotRepository {
    fn get(&self, id: RobotId) -> Option<Robot>;

    /// Insert or replace.
    fn save(&mut self, robot: Robot);

    /// Every robot, ordered by id.
    fn all(&self) -> Vec<Robot>;

    fn remove(&mut self, id: RobotId) -> Option<Robot>;
}

/// In-memory repository keyed by robot id.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRobots {
    robots: BTreeMap<RobotId, Robot>,
}

impl InMemoryRobots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }
}

impl FromIterator<Robot> for InMemoryRobots {
    fn from_iter<I: IntoIterator<Item = Robot>>(iter: I) -> Self {
        Self {
            robots: iter.into_iter().map(|r| (r.id, r)).collect(),
        }
    }
}

impl RobotRepository for InMemoryRobots {
    fn get(&self, id: RobotId) -> Option<Robot> {
        self.robots.get(&id).cloned()
    }

    fn save(&mut self, robot: Robot) {
        self.robots.insert(robot.id, robot);
    }

    fn all(&self) -> Vec<Robot> {
        self.robots.values().cloned().collect()
    }

    fn remove(&mut self, id: RobotId) -> Option<Robot> {
        self.robots.remove(&id)
    }
}
