//! Exercise catalogue, participants, and the exercise sequence picker.
//!
//! The picker draws `number_of_work_periods` entries from the catalogue
//! after removing every exercise a participant has excluded. Two-sided
//! exercises are expanded into a Left entry followed by a Right entry.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::timer::MAX_WORK_PERIODS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseSide {
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    /// Performed once per side (lunges, side planks...).
    #[serde(default)]
    pub two_sided: bool,
}

impl Exercise {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            two_sided: false,
        }
    }

    pub fn two_sided(mut self) -> Self {
        self.two_sided = true;
        self
    }
}

/// One resolved entry of the exercise sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseEntry {
    pub exercise: Exercise,
    pub side: ExerciseSide,
}

impl ExerciseEntry {
    pub fn new(exercise: Exercise, side: ExerciseSide) -> Self {
        Self { exercise, side }
    }
}

/// A session participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Ids of exercises this user never wants drawn.
    #[serde(default)]
    pub excluded_exercises: Vec<String>,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            excluded_exercises: Vec::new(),
        }
    }

    pub fn excludes(&self, exercise: &Exercise) -> bool {
        self.excluded_exercises.iter().any(|id| *id == exercise.id)
    }
}

/// Draws a random exercise sequence for a group of users.
pub struct ExerciseSelector<'a> {
    catalogue: &'a [Exercise],
    users: &'a [User],
}

impl<'a> ExerciseSelector<'a> {
    pub fn new(catalogue: &'a [Exercise], users: &'a [User]) -> Self {
        Self { catalogue, users }
    }

    /// Exercises no participant has excluded, in catalogue order.
    pub fn available(&self) -> Vec<&'a Exercise> {
        self.catalogue
            .iter()
            .filter(|exercise| !self.users.iter().any(|user| user.excludes(exercise)))
            .collect()
    }

    /// Pick `periods` entries.
    ///
    /// The same exercise is never drawn twice in a row unless it is the
    /// only one available. A two-sided pick consumes two periods; when only
    /// one period is left it is truncated to its Left side.
    ///
    /// # Errors
    /// Returns [`ErrorCode::ExercisesUnavailable`] if `periods > 0` and
    /// every exercise is excluded.
    pub fn select<R: Rng + ?Sized>(
        &self,
        periods: usize,
        rng: &mut R,
    ) -> Result<Vec<ExerciseEntry>, ErrorCode> {
        if periods == 0 {
            return Ok(Vec::new());
        }
        let available = self.available();
        if available.is_empty() {
            return Err(ErrorCode::ExercisesUnavailable);
        }

        let mut entries = Vec::with_capacity(periods.min(MAX_WORK_PERIODS));
        let mut previous: Option<&str> = None;
        while entries.len() < periods {
            let candidates: Vec<&Exercise> = available
                .iter()
                .copied()
                .filter(|exercise| Some(exercise.id.as_str()) != previous)
                .collect();
            let pool = if candidates.is_empty() {
                &available
            } else {
                &candidates
            };
            let Some(exercise) = pool.choose(rng).copied() else {
                return Err(ErrorCode::ExercisesUnavailable);
            };

            if exercise.two_sided {
                entries.push(ExerciseEntry::new(exercise.clone(), ExerciseSide::Left));
                if entries.len() < periods {
                    entries.push(ExerciseEntry::new(exercise.clone(), ExerciseSide::Right));
                }
            } else {
                entries.push(ExerciseEntry::new(exercise.clone(), ExerciseSide::None));
            }
            previous = Some(exercise.id.as_str());
        }
        Ok(entries)
    }
}

/// The built-in catalogue written to a fresh config.
pub fn default_catalogue() -> Vec<Exercise> {
    vec![
        Exercise::new("burpees", "Burpees"),
        Exercise::new("squats", "Squats"),
        Exercise::new("push_ups", "Push-ups"),
        Exercise::new("mountain_climbers", "Mountain climbers"),
        Exercise::new("jumping_jacks", "Jumping jacks"),
        Exercise::new("plank", "Plank"),
        Exercise::new("lunges", "Lunges").two_sided(),
        Exercise::new("side_plank", "Side plank").two_sided(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn rng() -> Pcg64 {
        Pcg64::seed_from_u64(7)
    }

    #[test]
    fn zero_periods_is_empty() {
        let catalogue = default_catalogue();
        let selector = ExerciseSelector::new(&catalogue, &[]);
        assert!(selector.select(0, &mut rng()).unwrap().is_empty());
    }

    #[test]
    fn selects_exact_period_count() {
        let catalogue = default_catalogue();
        let selector = ExerciseSelector::new(&catalogue, &[]);
        for periods in 1..20 {
            assert_eq!(selector.select(periods, &mut rng()).unwrap().len(), periods);
        }
    }

    #[test]
    fn exclusions_are_honoured_for_every_user() {
        let catalogue = vec![
            Exercise::new("a", "A"),
            Exercise::new("b", "B"),
            Exercise::new("c", "C"),
        ];
        let mut alice = User::new(1, "Alice");
        alice.excluded_exercises = vec!["a".into()];
        let mut bob = User::new(2, "Bob");
        bob.excluded_exercises = vec!["b".into()];
        let users = [alice, bob];
        let selector = ExerciseSelector::new(&catalogue, &users);

        let entries = selector.select(5, &mut rng()).unwrap();
        assert!(entries.iter().all(|e| e.exercise.id == "c"));
    }

    #[test]
    fn everything_excluded_is_an_error() {
        let catalogue = vec![Exercise::new("a", "A")];
        let mut user = User::new(1, "Alice");
        user.excluded_exercises = vec!["a".into()];
        let users = [user];
        let selector = ExerciseSelector::new(&catalogue, &users);
        assert_eq!(
            selector.select(1, &mut rng()),
            Err(ErrorCode::ExercisesUnavailable)
        );
    }

    #[test]
    fn two_sided_expands_left_then_right() {
        let catalogue = vec![Exercise::new("lunges", "Lunges").two_sided()];
        let selector = ExerciseSelector::new(&catalogue, &[]);
        let sides: Vec<_> = selector
            .select(3, &mut rng())
            .unwrap()
            .into_iter()
            .map(|e| e.side)
            .collect();
        assert_eq!(
            sides,
            vec![ExerciseSide::Left, ExerciseSide::Right, ExerciseSide::Left]
        );
    }

    #[test]
    fn no_immediate_repeat_when_alternatives_exist() {
        let catalogue = vec![Exercise::new("a", "A"), Exercise::new("b", "B")];
        let selector = ExerciseSelector::new(&catalogue, &[]);
        let entries = selector.select(10, &mut rng()).unwrap();
        for pair in entries.windows(2) {
            assert_ne!(pair[0].exercise.id, pair[1].exercise.id);
        }
    }
}
