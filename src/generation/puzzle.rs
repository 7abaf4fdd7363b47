//! # Puzzle Generation
//!
//! Reverse-pull level generator.
//!
//! Each attempt:
//! 1. Builds a walled rectangle and scatters internal walls
//! 2. Places goals on open interior cells
//! 3. Seeds a box on every goal and pulls boxes away at random
//! 4. Relocates boxes left on goals or wedged against walls
//! 5. Moves the player off any goal
//!
//! Attempts that still break an invariant are discarded and retried up to a
//! fixed ceiling.

use crate::game::{Cell, Direction, Level, Point};
use crate::generation::{utils, GenerationConfig, Generator};
use crate::{SokolinkError, SokolinkResult};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeSet;

/// Random draws per goal before the attempt is abandoned.
const GOAL_DRAWS: u32 = 100;

/// Total pull attempts per successful pull in the budget.
const PULL_ATTEMPT_FACTOR: u32 = 20;

/// Repair rounds before imperfect placements are accepted.
const REPAIR_ROUNDS: u32 = 50;

/// Random draws per box relocation before falling back to a scan.
const RELOCATION_DRAWS: u32 = 100;

/// Generator for box-pushing levels.
#[derive(Debug, Clone)]
pub struct PuzzleGenerator {
    /// Whole-generation retries before giving up
    pub max_attempts: u32,
}

impl PuzzleGenerator {
    /// Creates a generator with the default retry ceiling.
    ///
    /// # Examples
    ///
    /// ```
    /// use sokolink::{GenerationConfig, Generator, PuzzleGenerator, Tier};
    /// use sokolink::generation::utils;
    ///
    /// let config = GenerationConfig::for_tier(7, Tier::Medium);
    /// let mut rng = utils::create_rng(&config);
    /// let level = PuzzleGenerator::new().generate(&config, &mut rng).unwrap();
    /// assert_eq!(level.boxes.len(), 3);
    /// ```
    pub fn new() -> Self {
        Self {
            max_attempts: crate::config::GENERATION_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// One generation attempt. `None` when goals could not be placed.
    fn attempt(&self, config: &GenerationConfig, rng: &mut StdRng) -> Option<Level> {
        let mut layout = Layout::walled(config.width, config.height);
        layout.scatter_walls(config.wall_density, rng);
        layout.place_goals(config.box_count, rng)?;
        layout.boxes = layout.goals.clone();
        layout.pull_boxes(config.pull_budget, rng);
        layout.repair_boxes(rng);
        layout.settle_player()?;
        Some(layout.into_level(config))
    }
}

impl Default for PuzzleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator<Level> for PuzzleGenerator {
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> SokolinkResult<Level> {
        // Anything smaller has no interior inside the wall ring.
        if config.width < 3 || config.height < 3 {
            return Err(SokolinkError::GenerationFailed(format!(
                "a {}x{} grid has no interior",
                config.width, config.height
            )));
        }

        for attempt in 1..=self.max_attempts {
            match self.attempt(config, rng) {
                Some(level) => match self.validate(&level, config) {
                    Ok(()) => {
                        info!(
                            "Generated {} level (seed {}) on attempt {}",
                            config.tier, config.seed, attempt
                        );
                        return Ok(level);
                    }
                    Err(err) => debug!("Discarding attempt {}: {}", attempt, err),
                },
                None => debug!("Attempt {} could not place goals", attempt),
            }
        }

        Err(SokolinkError::GenerationFailed(format!(
            "no valid {} level after {} attempts",
            config.tier, self.max_attempts
        )))
    }

    fn validate(&self, level: &Level, config: &GenerationConfig) -> SokolinkResult<()> {
        let fail = |reason: &str| Err(SokolinkError::GenerationFailed(reason.to_string()));

        if level.boxes.len() != config.box_count {
            return fail("wrong number of boxes");
        }
        if level.goals.len() != config.box_count {
            return fail("wrong number of goals");
        }
        let ring_is_wall = (0..level.height).all(|y| {
            (0..level.width).all(|x| {
                let border = x == 0 || y == 0 || x + 1 == level.width || y + 1 == level.height;
                !border || level.cells[y][x] == Cell::Wall
            })
        });
        if !ring_is_wall {
            return fail("outer ring is not wall");
        }
        if level.boxes.iter().any(|b| level.goals.contains(b)) {
            return fail("a box starts on a goal");
        }
        if level.goals.contains(&level.player) {
            return fail("the player starts on a goal");
        }
        let distinct: BTreeSet<Point> = level.boxes.iter().copied().collect();
        if distinct.len() != level.boxes.len() || distinct.contains(&level.player) {
            return fail("overlapping entities");
        }
        if !level.is_passable(level.player) || level.boxes.iter().any(|b| !level.is_passable(*b)) {
            return fail("an entity sits on a wall");
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "PuzzleGenerator"
    }
}

/// Mutable working state of one attempt.
struct Layout {
    width: usize,
    height: usize,
    cells: Vec<Vec<Cell>>,
    goals: Vec<Point>,
    boxes: Vec<Point>,
    player: Option<Point>,
}

impl Layout {
    fn walled(width: usize, height: usize) -> Self {
        let cells = (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| {
                        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                            Cell::Wall
                        } else {
                            Cell::Floor
                        }
                    })
                    .collect()
            })
            .collect();

        Self {
            width,
            height,
            cells,
            goals: Vec::new(),
            boxes: Vec::new(),
            player: None,
        }
    }

    fn cell(&self, point: Point) -> Option<Cell> {
        utils::cell_at(&self.cells, point)
    }

    fn is_open(&self, point: Point) -> bool {
        self.cell(point) == Some(Cell::Floor)
    }

    fn is_goal(&self, point: Point) -> bool {
        self.goals.contains(&point)
    }

    fn has_box(&self, point: Point) -> bool {
        self.boxes.contains(&point)
    }

    fn random_interior(&self, rng: &mut StdRng) -> Point {
        Point::new(
            rng.gen_range(1..self.width as i32 - 1),
            rng.gen_range(1..self.height as i32 - 1),
        )
    }

    fn interior(&self) -> impl Iterator<Item = Point> {
        let (width, height) = (self.width as i32, self.height as i32);
        (1..height - 1).flat_map(move |y| (1..width - 1).map(move |x| Point::new(x, y)))
    }

    fn scatter_walls(&mut self, density: f64, rng: &mut StdRng) {
        let count = (self.width as f64 * self.height as f64 * density).round() as usize;
        for _ in 0..count {
            let point = self.random_interior(rng);
            if self.is_open(point) {
                self.cells[point.y as usize][point.x as usize] = Cell::Wall;
            }
        }
    }

    fn place_goals(&mut self, count: usize, rng: &mut StdRng) -> Option<()> {
        for _ in 0..count {
            let goal = (0..GOAL_DRAWS)
                .map(|_| self.random_interior(rng))
                .find(|&point| {
                    self.is_open(point)
                        && !self.is_goal(point)
                        && point
                            .neighbors4()
                            .iter()
                            .filter(|n| self.is_open(**n))
                            .count()
                            >= 2
                })?;
            self.goals.push(goal);
        }
        Some(())
    }

    /// A pull moves the box at `b` to `b - d` and leaves the player on `b`.
    fn can_pull(&self, from: Point, direction: Direction) -> bool {
        let to = from.step_back(direction);
        let behind = to.step_back(direction);
        [to, behind]
            .iter()
            .all(|&p| self.is_open(p) && !self.has_box(p))
            && utils::wall_neighbors(&self.cells, to) <= 1
    }

    fn pull_boxes(&mut self, budget: u32, rng: &mut StdRng) {
        if self.boxes.is_empty() {
            return;
        }
        let mut pulls = 0;
        let mut tries = 0;
        while pulls < budget && tries < budget * PULL_ATTEMPT_FACTOR {
            tries += 1;
            let index = rng.gen_range(0..self.boxes.len());
            let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
            let from = self.boxes[index];
            if self.can_pull(from, direction) {
                self.boxes[index] = from.step_back(direction);
                self.player = Some(from);
                pulls += 1;
            }
        }
        debug!("{} pulls in {} tries", pulls, tries);
    }

    fn box_is_valid(&self, point: Point) -> bool {
        !self.is_goal(point) && utils::wall_neighbors(&self.cells, point) <= 1
    }

    fn relocation_target(&self, candidate: Point) -> bool {
        self.is_open(candidate)
            && !self.is_goal(candidate)
            && !self.has_box(candidate)
            && self.player != Some(candidate)
            && utils::wall_neighbors(&self.cells, candidate) <= 1
    }

    fn repair_boxes(&mut self, rng: &mut StdRng) {
        for round in 0..REPAIR_ROUNDS {
            let invalid: Vec<usize> = (0..self.boxes.len())
                .filter(|&i| !self.box_is_valid(self.boxes[i]))
                .collect();
            if invalid.is_empty() {
                return;
            }
            debug!("Repair round {}: {} boxes to move", round, invalid.len());

            for index in invalid {
                let target = (0..RELOCATION_DRAWS)
                    .map(|_| self.random_interior(rng))
                    .find(|&p| self.relocation_target(p))
                    .or_else(|| self.interior().find(|&p| self.relocation_target(p)));
                if let Some(target) = target {
                    self.boxes[index] = target;
                }
            }
        }
    }

    fn settle_player(&mut self) -> Option<()> {
        let misplaced = match self.player {
            Some(p) => !self.is_open(p) || self.is_goal(p) || self.has_box(p),
            None => true,
        };
        if misplaced {
            let spot = self
                .interior()
                .find(|&p| self.is_open(p) && !self.is_goal(p) && !self.has_box(p))?;
            self.player = Some(spot);
        }
        Some(())
    }

    fn into_level(self, config: &GenerationConfig) -> Level {
        let goals: BTreeSet<Point> = self.goals.iter().copied().collect();
        let mut cells = self.cells;
        for goal in &goals {
            cells[goal.y as usize][goal.x as usize] = Cell::Goal;
        }

        Level {
            name: Some(format!("Random {} #{}", config.tier, config.seed)),
            width: self.width,
            height: self.height,
            cells,
            player: self.player.unwrap_or_default(),
            boxes: self.boxes,
            goals,
        }
    }
}
