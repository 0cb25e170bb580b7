use tracing::{info, instrument, warn};

use super::{flags::FlagStore, router::SessionRouter, OnboardingError};
use crate::{
    client::ProfileBackend,
    nutrition::{
        calculate_targets, targets::parse_positive, ActivityLevel, DailyTargets, GoalType,
        TargetInputs, TargetUpdate, UserProfile,
    },
    session::Session,
};

pub const FIRST_STEP: u8 = 1;
pub const LAST_STEP: u8 = 3;

/// In-memory state of the three-step onboarding flow: goal and body stats,
/// activity level, calculated targets.
#[derive(Debug, Clone)]
pub struct OnboardingWizard {
    step: u8,
    goal: Option<GoalType>,
    height: String,
    weight: String,
    age: String,
    activity: Option<ActivityLevel>,
    targets: Option<DailyTargets>,
}

impl Default for OnboardingWizard {
    fn default() -> Self {
        Self {
            step: FIRST_STEP,
            goal: None,
            height: String::new(),
            weight: String::new(),
            age: String::new(),
            activity: None,
            targets: None,
        }
    }
}

impl OnboardingWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn targets(&self) -> Option<DailyTargets> {
        self.targets
    }

    pub fn goal(&self) -> Option<GoalType> {
        self.goal
    }

    /// Height, weight and age as typed.
    pub fn stats(&self) -> (&str, &str, &str) {
        (&self.height, &self.weight, &self.age)
    }

    pub fn activity(&self) -> Option<ActivityLevel> {
        self.activity
    }

    pub fn select_goal(&mut self, goal: GoalType) {
        self.goal = Some(goal);
        self.rewind_to(1);
    }

    pub fn set_stats(&mut self, height: &str, weight: &str, age: &str) {
        self.height = height.to_string();
        self.weight = weight.to_string();
        self.age = age.to_string();
        self.rewind_to(1);
    }

    pub fn select_activity(&mut self, activity: ActivityLevel) {
        self.activity = Some(activity);
        self.rewind_to(2);
    }

    /// An edit to step `step` drops any later progress, so the targets
    /// snapshot always matches the current inputs.
    fn rewind_to(&mut self, step: u8) {
        if self.step > step {
            self.step = step;
        }
        self.targets = None;
    }

    pub fn can_continue(&self) -> bool {
        match self.step {
            1 => {
                self.goal.is_some()
                    && !self.height.trim().is_empty()
                    && !self.weight.trim().is_empty()
                    && !self.age.trim().is_empty()
            }
            2 => self.activity.is_some(),
            _ => self.targets.is_some(),
        }
    }

    /// Step 1 → 2.
    pub fn continue_to_activity(&mut self) -> Result<(), OnboardingError> {
        self.expect_step(1)?;
        if !self.can_continue() {
            return Err(OnboardingError::Incomplete("goal, height, weight and age are required"));
        }
        self.step = 2;
        Ok(())
    }

    /// Step 2 → 3: runs the calculator and keeps the snapshot for the
    /// results screen.
    pub fn calculate(&mut self) -> Result<DailyTargets, OnboardingError> {
        self.expect_step(2)?;
        if !self.can_continue() {
            return Err(OnboardingError::Incomplete("an activity level is required"));
        }
        let inputs = TargetInputs::from_raw(
            &self.height,
            &self.weight,
            &self.age,
            self.activity,
            self.goal,
        );
        let targets = calculate_targets(&inputs);
        self.targets = Some(targets);
        self.step = LAST_STEP;
        Ok(targets)
    }

    pub fn back(&mut self) {
        if self.step > FIRST_STEP {
            self.step -= 1;
        }
    }

    /// Profile fields as entered. Whole centimetres and years, as the
    /// backend stores them.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            name: None,
            age: parse_positive(&self.age).map(|v| v.trunc() as i32),
            height_cm: parse_positive(&self.height).map(|v| v.trunc() as i32),
            weight_kg: parse_positive(&self.weight),
            activity_level: self.activity,
            goal_type: self.goal,
        }
    }

    /// Final step: persist profile and targets, mark the flag, hand the user
    /// to the main app.
    ///
    /// A save failure leaves the wizard untouched so the call can simply be
    /// retried. A flag write failure is logged only: the user proceeds and
    /// will be asked to onboard again on the next sign-in.
    #[instrument(skip_all, fields(user_id = %session.user_id))]
    pub async fn complete(
        &self,
        session: &Session,
        backend: &dyn ProfileBackend,
        flags: &dyn FlagStore,
        router: &SessionRouter,
    ) -> Result<DailyTargets, OnboardingError> {
        self.expect_step(LAST_STEP)?;
        let targets = self
            .targets
            .ok_or(OnboardingError::Incomplete("targets have not been calculated"))?;

        backend
            .save_profile(&session.access_token, &self.profile())
            .await
            .map_err(OnboardingError::Save)?;
        backend
            .save_targets(&session.access_token, &TargetUpdate::from(targets))
            .await
            .map_err(OnboardingError::Save)?;

        if let Err(e) = flags.write_flag(session.user_id).await {
            warn!(error = %e, "failed to persist onboarding flag; user will be prompted again");
        }

        if router.complete_onboarding(session.user_id).await {
            info!("onboarding complete");
        }
        Ok(targets)
    }

    fn expect_step(&self, step: u8) -> Result<(), OnboardingError> {
        if self.step != step {
            return Err(OnboardingError::WrongStep {
                expected: step,
                actual: self.step,
            });
        }
        Ok(())
    }
}
