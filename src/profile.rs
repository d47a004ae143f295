//! Persistent player profile: wallet, trophies, ultimates, checkpoints,
//! run milestones and the local leaderboard
//!
//! Persisted to LocalStorage as one JSON blob. The simulation never reads
//! this directly; the shell folds it into `GameState` before each run and
//! writes back on the events the sim emits.

use serde::{Deserialize, Serialize};

use crate::sim::GameState;
use crate::sim::state::TrophyEffects;

/// Maximum number of leaderboard runs to keep
pub const MAX_RUN_RECORDS: usize = 10;

/// Purchasable passive upgrades. Each can be bought up to [`TrophyKind::max_level`]
/// times, with the price doubling per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrophyKind {
    Spark,
    Prism,
    Frost,
    Nova,
}

impl TrophyKind {
    pub const ALL: [TrophyKind; 4] = [
        TrophyKind::Spark,
        TrophyKind::Prism,
        TrophyKind::Frost,
        TrophyKind::Nova,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TrophyKind::Spark => "Spark Shard",
            TrophyKind::Prism => "Prism Core",
            TrophyKind::Frost => "Frost Lattice",
            TrophyKind::Nova => "Nova Crown",
        }
    }

    pub fn blurb(&self) -> &'static str {
        match self {
            TrophyKind::Spark => "+1 starting life each run",
            TrophyKind::Prism => "+5s power-up duration",
            TrophyKind::Frost => "-15% energy drain",
            TrophyKind::Nova => "+25% cash from kills",
        }
    }

    pub fn base_price(&self) -> u64 {
        match self {
            TrophyKind::Spark => 50,
            TrophyKind::Prism => 150,
            TrophyKind::Frost => 250,
            TrophyKind::Nova => 400,
        }
    }

    pub fn max_level(&self) -> u32 {
        3
    }

    /// Price of the upgrade to `level` (1-indexed): base doubled per level
    pub fn price_for_level(&self, level: u32) -> u64 {
        let level = level.max(1);
        (self.base_price() << (level - 1)).max(1)
    }
}

/// Owned trophy levels (0 = not owned)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrophyLevels {
    pub spark: u32,
    pub prism: u32,
    pub frost: u32,
    pub nova: u32,
}

impl TrophyLevels {
    pub fn get(&self, kind: TrophyKind) -> u32 {
        match kind {
            TrophyKind::Spark => self.spark,
            TrophyKind::Prism => self.prism,
            TrophyKind::Frost => self.frost,
            TrophyKind::Nova => self.nova,
        }
    }

    fn get_mut(&mut self, kind: TrophyKind) -> &mut u32 {
        match kind {
            TrophyKind::Spark => &mut self.spark,
            TrophyKind::Prism => &mut self.prism,
            TrophyKind::Frost => &mut self.frost,
            TrophyKind::Nova => &mut self.nova,
        }
    }

    /// Fold levels into the effect bundle the simulation consumes
    pub fn effects(&self) -> TrophyEffects {
        TrophyEffects {
            start_lives: self.spark,
            powerup_bonus_ms: 5000.0 * self.prism as f32,
            energy_drain_mult: 0.85_f32.powi(self.frost as i32),
            cash_multiplier: 1.25_f32.powi(self.nova as i32),
        }
    }
}

/// The two purchasable ultimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UltimateKind {
    Laser,
    Nuke,
}

impl UltimateKind {
    pub const ALL: [UltimateKind; 2] = [UltimateKind::Laser, UltimateKind::Nuke];

    pub fn base_price(&self) -> u64 {
        match self {
            UltimateKind::Laser => 500,
            UltimateKind::Nuke => 1500,
        }
    }

    /// One mk2 tier per ultimate
    pub fn upgrade_price(&self) -> u64 {
        self.base_price() * 3
    }
}

/// Ownership of one ultimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UltimateOwnership {
    pub owned: bool,
    pub mk2: bool,
}

/// One-shot run milestones that pay a cash bonus on first clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Milestone {
    Survive30,
    Survive60,
    Reach5,
    Reach10,
    Earn50,
}

impl Milestone {
    pub const ALL: [Milestone; 5] = [
        Milestone::Survive30,
        Milestone::Survive60,
        Milestone::Reach5,
        Milestone::Reach10,
        Milestone::Earn50,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Milestone::Survive30 => "Survived 30s",
            Milestone::Survive60 => "Survived 60s",
            Milestone::Reach5 => "Reached Level 5",
            Milestone::Reach10 => "Reached Level 10",
            Milestone::Earn50 => "Earned 50 CC in a run",
        }
    }

    pub fn bonus(&self) -> u64 {
        match self {
            Milestone::Survive30 => 10,
            Milestone::Survive60 => 25,
            Milestone::Reach5 => 15,
            Milestone::Reach10 => 40,
            Milestone::Earn50 => 20,
        }
    }

    fn achieved(&self, time_seconds: f32, level: u32, cash_earned: u64) -> bool {
        match self {
            Milestone::Survive30 => time_seconds >= 30.0,
            Milestone::Survive60 => time_seconds >= 60.0,
            Milestone::Reach5 => level >= 5,
            Milestone::Reach10 => level >= 10,
            Milestone::Earn50 => cash_earned >= 50,
        }
    }
}

/// Which milestones have already paid out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneSet {
    pub survive_30: bool,
    pub survive_60: bool,
    pub reach_5: bool,
    pub reach_10: bool,
    pub earn_50: bool,
}

impl MilestoneSet {
    pub fn contains(&self, milestone: Milestone) -> bool {
        match milestone {
            Milestone::Survive30 => self.survive_30,
            Milestone::Survive60 => self.survive_60,
            Milestone::Reach5 => self.reach_5,
            Milestone::Reach10 => self.reach_10,
            Milestone::Earn50 => self.earn_50,
        }
    }

    fn insert(&mut self, milestone: Milestone) {
        match milestone {
            Milestone::Survive30 => self.survive_30 = true,
            Milestone::Survive60 => self.survive_60 = true,
            Milestone::Reach5 => self.reach_5 = true,
            Milestone::Reach10 => self.reach_10 = true,
            Milestone::Earn50 => self.earn_50 = true,
        }
    }
}

/// A finished run on the local leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub time_seconds: f32,
    pub level: u32,
    pub cash_earned: u64,
    /// Unix timestamp (ms) when the run ended
    pub ended_at: f64,
}

impl RunRecord {
    /// Leaderboard order: level first, survival time breaks ties
    fn beaten_by(&self, level: u32, time_seconds: f32) -> bool {
        level > self.level || (level == self.level && time_seconds > self.time_seconds)
    }
}

/// What a run unlocked, handed back to the shell for toasts
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Leaderboard rank achieved (1-indexed), if the run qualified
    pub rank: Option<usize>,
    pub unlocked: Vec<&'static str>,
    pub bonus_cash: u64,
}

/// Persistent player profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    /// Wallet total in CC
    pub cash: u64,
    pub trophies: TrophyLevels,
    pub laser: UltimateOwnership,
    pub nuke: UltimateOwnership,
    /// Highest unlocked checkpoint level (0 = only level 1)
    pub max_start_level: u32,
    pub milestones: MilestoneSet,
    pub runs: Vec<RunRecord>,
}

impl Profile {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "yolk_drift_profile_v1";

    pub fn new() -> Self {
        Self::default()
    }

    /// Checkpoints are whole tens, unlocked by reaching them
    pub fn checkpoint_for_level(level: u32) -> u32 {
        if level >= 10 { (level / 10) * 10 } else { 0 }
    }

    /// Raise the stored checkpoint if `level` reaches a new one.
    /// Returns the checkpoint when it moved.
    pub fn unlock_checkpoint(&mut self, level: u32) -> Option<u32> {
        let checkpoint = Self::checkpoint_for_level(level);
        if checkpoint > self.max_start_level {
            self.max_start_level = checkpoint;
            return Some(checkpoint);
        }
        None
    }

    /// Selectable run start levels: 1 plus every unlocked checkpoint
    pub fn start_levels(&self) -> Vec<u32> {
        let mut levels = vec![1];
        let mut checkpoint = 10;
        while checkpoint <= self.max_start_level {
            levels.push(checkpoint);
            checkpoint += 10;
        }
        levels
    }

    pub fn ultimate(&self, kind: UltimateKind) -> UltimateOwnership {
        match kind {
            UltimateKind::Laser => self.laser,
            UltimateKind::Nuke => self.nuke,
        }
    }

    /// Buy an unowned ultimate, or upgrade an owned one to mk2.
    /// Returns false when already maxed or the wallet is short.
    pub fn buy_ultimate(&mut self, kind: UltimateKind) -> bool {
        let slot = match kind {
            UltimateKind::Laser => &mut self.laser,
            UltimateKind::Nuke => &mut self.nuke,
        };
        let price = if !slot.owned {
            kind.base_price()
        } else if !slot.mk2 {
            kind.upgrade_price()
        } else {
            return false;
        };
        if self.cash < price {
            return false;
        }
        self.cash -= price;
        let slot = match kind {
            UltimateKind::Laser => &mut self.laser,
            UltimateKind::Nuke => &mut self.nuke,
        };
        if !slot.owned {
            slot.owned = true;
        } else {
            slot.mk2 = true;
        }
        true
    }

    /// Price of the next level of `kind`, or None at the cap
    pub fn trophy_next_price(&self, kind: TrophyKind) -> Option<u64> {
        let current = self.trophies.get(kind);
        if current >= kind.max_level() {
            return None;
        }
        Some(kind.price_for_level(current + 1))
    }

    /// Buy or upgrade a trophy. Returns false when maxed or unaffordable.
    pub fn buy_trophy(&mut self, kind: TrophyKind) -> bool {
        let Some(price) = self.trophy_next_price(kind) else {
            return false;
        };
        if self.cash < price {
            return false;
        }
        self.cash -= price;
        *self.trophies.get_mut(kind) += 1;
        true
    }

    /// Check if a run qualifies for the leaderboard
    pub fn qualifies(&self, time_seconds: f32, level: u32) -> bool {
        if time_seconds <= 0.0 {
            return false;
        }
        if self.runs.len() < MAX_RUN_RECORDS {
            return true;
        }
        self.runs
            .last()
            .map(|r| r.beaten_by(level, time_seconds))
            .unwrap_or(true)
    }

    /// Get the rank a run would achieve (1-indexed, None if it doesn't qualify)
    pub fn potential_rank(&self, time_seconds: f32, level: u32) -> Option<usize> {
        if !self.qualifies(time_seconds, level) {
            return None;
        }
        let rank = self.runs.iter().position(|r| r.beaten_by(level, time_seconds));
        Some(rank.unwrap_or(self.runs.len()) + 1)
    }

    /// Insert a run into the leaderboard (if it qualifies).
    /// Returns the rank achieved (1-indexed) or None.
    pub fn add_run(
        &mut self,
        time_seconds: f32,
        level: u32,
        cash_earned: u64,
        ended_at: f64,
    ) -> Option<usize> {
        if !self.qualifies(time_seconds, level) {
            return None;
        }

        let record = RunRecord {
            time_seconds,
            level,
            cash_earned,
            ended_at,
        };

        // Find insertion point (level desc, then survival time desc)
        let pos = self.runs.iter().position(|r| r.beaten_by(level, time_seconds));
        let rank = match pos {
            Some(i) => {
                self.runs.insert(i, record);
                i + 1
            }
            None => {
                self.runs.push(record);
                self.runs.len()
            }
        };

        self.runs.truncate(MAX_RUN_RECORDS);

        Some(rank)
    }

    /// Best run on record (if any)
    pub fn top_run(&self) -> Option<&RunRecord> {
        self.runs.first()
    }

    /// Record a finished run: leaderboard insert, checkpoint unlock, and
    /// first-time milestone bonuses paid straight into the wallet.
    pub fn record_run(
        &mut self,
        time_seconds: f32,
        level: u32,
        cash_earned: u64,
        ended_at: f64,
    ) -> RunOutcome {
        let rank = self.add_run(time_seconds, level, cash_earned, ended_at);
        self.unlock_checkpoint(level);

        let mut outcome = RunOutcome {
            rank,
            ..RunOutcome::default()
        };
        for milestone in Milestone::ALL {
            if milestone.achieved(time_seconds, level, cash_earned)
                && !self.milestones.contains(milestone)
            {
                self.milestones.insert(milestone);
                outcome.unlocked.push(milestone.label());
                outcome.bonus_cash += milestone.bonus();
            }
        }
        self.cash += outcome.bonus_cash;
        outcome
    }

    /// Fold the profile into a game state before a run starts
    pub fn apply_to(&self, state: &mut GameState) {
        state.cash = self.cash;
        state.trophies = self.trophies.effects();
        state.laser.owned = self.laser.owned;
        state.laser.mk2 = self.laser.mk2;
        state.nuke.owned = self.nuke.owned;
        state.nuke.mk2 = self.nuke.mk2;
    }

    /// Load the profile from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match serde_json::from_str::<Profile>(&json) {
                    Ok(profile) => {
                        log::info!("Loaded profile ({} runs on record)", profile.runs.len());
                        return profile;
                    }
                    Err(err) => log::warn!("Stored profile unreadable, resetting: {}", err),
                }
            }
        }

        log::info!("No profile found, starting fresh");
        Self::new()
    }

    /// Save the profile to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::new()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

/// Format a run timestamp as a relative date string
#[cfg(target_arch = "wasm32")]
pub fn format_date(timestamp: f64) -> String {
    let now = js_sys::Date::now();
    let diff_days = (now - timestamp) / 1000.0 / 60.0 / 60.0 / 24.0;

    if diff_days >= 7.0 {
        let date = js_sys::Date::new(&wasm_bindgen::JsValue::from_f64(timestamp));
        format!(
            "{}/{}/{}",
            date.get_month() + 1,
            date.get_date(),
            date.get_full_year() % 100
        )
    } else if diff_days >= 1.0 {
        let days = diff_days.floor() as i32;
        if days == 1 {
            "Yesterday".to_string()
        } else {
            format!("{} days ago", days)
        }
    } else {
        "Today".to_string()
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn format_date(_timestamp: f64) -> String {
    "N/A".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trophy_prices_double_per_level_and_cap() {
        let mut profile = Profile::new();
        profile.cash = 10_000;

        assert_eq!(profile.trophy_next_price(TrophyKind::Spark), Some(50));
        assert!(profile.buy_trophy(TrophyKind::Spark));
        assert_eq!(profile.trophy_next_price(TrophyKind::Spark), Some(100));
        assert!(profile.buy_trophy(TrophyKind::Spark));
        assert_eq!(profile.trophy_next_price(TrophyKind::Spark), Some(200));
        assert!(profile.buy_trophy(TrophyKind::Spark));

        // Level 3 is the cap
        assert_eq!(profile.trophy_next_price(TrophyKind::Spark), None);
        assert!(!profile.buy_trophy(TrophyKind::Spark));
        assert_eq!(profile.trophies.spark, 3);
        assert_eq!(profile.cash, 10_000 - 50 - 100 - 200);
    }

    #[test]
    fn trophy_effects_scale_with_level() {
        let levels = TrophyLevels {
            spark: 2,
            prism: 1,
            frost: 2,
            nova: 2,
        };
        let effects = levels.effects();
        assert_eq!(effects.start_lives, 2);
        assert_eq!(effects.powerup_bonus_ms, 5000.0);
        assert!((effects.energy_drain_mult - 0.7225).abs() < 1e-6);
        assert!((effects.cash_multiplier - 1.5625).abs() < 1e-6);
    }

    #[test]
    fn ultimates_buy_then_upgrade_once() {
        let mut profile = Profile::new();
        profile.cash = 400;
        assert!(!profile.buy_ultimate(UltimateKind::Laser), "cannot afford");

        profile.cash = 2100;
        assert!(profile.buy_ultimate(UltimateKind::Laser));
        assert!(profile.laser.owned && !profile.laser.mk2);
        assert_eq!(profile.cash, 1600);

        assert!(profile.buy_ultimate(UltimateKind::Laser));
        assert!(profile.laser.mk2);
        assert_eq!(profile.cash, 100);

        // mk2 is the last tier
        assert!(!profile.buy_ultimate(UltimateKind::Laser));
        assert_eq!(profile.cash, 100);
    }

    #[test]
    fn milestones_pay_out_exactly_once() {
        let mut profile = Profile::new();

        let first = profile.record_run(45.0, 6, 55, 0.0);
        // survive_30 + reach_5 + earn_50
        assert_eq!(first.bonus_cash, 10 + 15 + 20);
        assert_eq!(profile.cash, 45);
        assert_eq!(first.unlocked.len(), 3);

        let second = profile.record_run(50.0, 7, 60, 1.0);
        assert_eq!(second.bonus_cash, 0);
        assert!(second.unlocked.is_empty());
        assert_eq!(profile.cash, 45);
    }

    #[test]
    fn checkpoints_unlock_in_tens_and_never_regress() {
        let mut profile = Profile::new();
        assert_eq!(Profile::checkpoint_for_level(9), 0);
        assert_eq!(Profile::checkpoint_for_level(10), 10);
        assert_eq!(Profile::checkpoint_for_level(27), 20);

        assert_eq!(profile.unlock_checkpoint(12), Some(10));
        assert_eq!(profile.unlock_checkpoint(11), None);
        assert_eq!(profile.unlock_checkpoint(34), Some(30));
        assert_eq!(profile.max_start_level, 30);
        assert_eq!(profile.start_levels(), vec![1, 10, 20, 30]);
    }

    #[test]
    fn leaderboard_sorts_by_level_then_time() {
        let mut profile = Profile::new();
        assert!(!profile.qualifies(0.0, 3), "zero-length runs never qualify");
        assert_eq!(profile.add_run(0.0, 3, 0, 0.0), None);

        assert_eq!(profile.add_run(40.0, 2, 5, 0.0), Some(1));
        assert_eq!(profile.add_run(20.0, 4, 9, 1.0), Some(1));
        assert_eq!(profile.add_run(90.0, 2, 7, 2.0), Some(2));

        let levels: Vec<u32> = profile.runs.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![4, 2, 2]);
        assert_eq!(profile.runs[1].time_seconds, 90.0);
        assert_eq!(profile.top_run().map(|r| r.level), Some(4));
    }

    #[test]
    fn leaderboard_truncates_to_the_cap() {
        let mut profile = Profile::new();
        for i in 0..MAX_RUN_RECORDS {
            profile.add_run(10.0 + i as f32, 1, 0, i as f64);
        }
        assert_eq!(profile.runs.len(), MAX_RUN_RECORDS);

        // Worse than every entry: rejected outright
        assert!(!profile.qualifies(5.0, 1));
        assert_eq!(profile.potential_rank(5.0, 1), None);

        // Better run bumps the weakest off the bottom
        assert_eq!(profile.potential_rank(100.0, 1), Some(1));
        assert_eq!(profile.add_run(100.0, 1, 0, 99.0), Some(1));
        assert_eq!(profile.runs.len(), MAX_RUN_RECORDS);
        assert_eq!(profile.runs[0].time_seconds, 100.0);
        assert_eq!(profile.runs.last().map(|r| r.time_seconds), Some(11.0));
    }

    #[test]
    fn profile_applies_onto_a_fresh_state() {
        use crate::sim::{GameState, WorldView};

        let mut profile = Profile::new();
        profile.cash = 900;
        profile.trophies.spark = 1;
        profile.laser.owned = true;

        let mut state = GameState::new(1, WorldView::default());
        profile.apply_to(&mut state);
        assert_eq!(state.cash, 900);
        assert_eq!(state.trophies.start_lives, 1);
        assert!(state.laser.owned);
        assert!(!state.nuke.owned);
    }
}
