//! Multi-criteria utility-based action selection.
//!
//! The [`DecisionEngine`] scores candidate actions with a weighted
//! multi-attribute utility, an estimated risk, and a prospect-theory value
//! of the expected outcome, then picks the best candidate together with a
//! confidence derived from its margin over the runner-up.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("no candidate actions provided")]
    NoActionsProvided,
}

pub type Result<T> = std::result::Result<T, DecisionError>;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

pub const EFFECTIVENESS: &str = "effectiveness";
pub const EFFICIENCY: &str = "efficiency";
pub const SAFETY: &str = "safety";
pub const COST: &str = "cost";

/// Criterion value used when an action does not provide one.
fn default_criterion_value(criterion: &str) -> f64 {
    match criterion {
        SAFETY => 0.7,
        EFFECTIVENESS | EFFICIENCY => 0.6,
        _ => 0.5,
    }
}

/// One possible result of an action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub probability: f64,
    pub value: f64,
}

/// A candidate action with whatever attributes the caller knows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionOption {
    pub name: String,
    /// Explicit criterion values, keyed by criterion name.
    #[serde(default)]
    pub criteria: HashMap<String, f64>,
    /// Estimated cost in [0, 1]; the `cost` criterion scores `1 - cost`.
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    #[serde(default)]
    pub risk: Option<f64>,
    #[serde(default)]
    pub expected_value: Option<f64>,
    #[serde(default)]
    pub outcomes: Vec<ActionOutcome>,
}

impl ActionOption {
    /// Create an option with no criteria, outcomes or overrides.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set a criterion value in [0, 1].
    pub fn with_criterion(mut self, criterion: impl Into<String>, value: f64) -> Self {
        self.criteria.insert(criterion.into(), value);
        self
    }

    /// Set the estimated cost; the `cost` criterion becomes `1 - cost`.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = Some(cost);
        self
    }

    /// Override the heuristic risk estimate.
    pub fn with_risk(mut self, risk: f64) -> Self {
        self.risk = Some(risk);
        self
    }

    /// Override the computed expected value.
    pub fn with_expected_value(mut self, value: f64) -> Self {
        self.expected_value = Some(value);
        self
    }

    /// Add a possible outcome with its probability.
    pub fn with_outcome(mut self, probability: f64, value: f64) -> Self {
        self.outcomes.push(ActionOutcome { probability, value });
        self
    }

    fn criterion_value(&self, criterion: &str) -> f64 {
        if criterion == COST {
            return match self.estimated_cost {
                Some(cost) => 1.0 - cost,
                None => default_criterion_value(COST),
            };
        }
        self.criteria
            .get(criterion)
            .copied()
            .unwrap_or_else(|| default_criterion_value(criterion))
    }
}

/// The situation a decision is made in.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Situation {
    #[serde(default)]
    pub safety_critical: bool,
    #[serde(default)]
    pub description: String,
}

impl Situation {
    /// A safety-critical situation with no description.
    pub fn safety_critical() -> Self {
        Self {
            safety_critical: true,
            description: String::new(),
        }
    }
}

/// Scores computed for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub action: String,
    pub utility: f64,
    pub risk: f64,
    pub expected_value: f64,
    pub prospect_value: f64,
    pub final_score: f64,
}

/// The selected action and how it was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Index of the winner in the input slice.
    pub index: usize,
    pub best: CandidateScore,
    pub confidence: f64,
    /// Scores for every candidate, in input order.
    pub candidates: Vec<CandidateScore>,
}

/// Aggregate figures over the retained decision history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionStats {
    pub decisions: usize,
    pub mean_confidence: f64,
    pub mean_score: f64,
}

/// Weights and parameters controlling the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Criterion name -> weight in the utility sum.
    pub weights: BTreeMap<String, f64>,
    /// 0 = risk-averse, 1 = risk-seeking.
    pub risk_tolerance: f64,
    /// Loss multiplier of the prospect value function.
    pub loss_aversion: f64,
    pub gain_exponent: f64,
    pub loss_exponent: f64,
    /// Number of recent decisions kept for statistics.
    pub history_limit: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        let weights = [
            (EFFECTIVENESS, 0.4),
            (EFFICIENCY, 0.3),
            (SAFETY, 0.2),
            (COST, 0.1),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            weights,
            risk_tolerance: 0.5,
            loss_aversion: 2.25,
            gain_exponent: 0.88,
            loss_exponent: 0.88,
            history_limit: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluates candidate actions and selects the one with the highest score.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: DecisionConfig,
    history: VecDeque<Decision>,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(DecisionConfig::default())
    }
}

impl DecisionEngine {
    /// Create a new engine with the given configuration.
    pub fn new(mut config: DecisionConfig) -> Self {
        config.risk_tolerance = config.risk_tolerance.clamp(0.0, 1.0);
        Self {
            config,
            history: VecDeque::new(),
        }
    }

    /// Weighted sum of criterion values.
    pub fn utility(&self, action: &ActionOption) -> f64 {
        self.config
            .weights
            .iter()
            .map(|(criterion, weight)| weight * action.criterion_value(criterion))
            .sum()
    }

    /// Explicit risk, or a heuristic estimate in [0, 1].
    pub fn risk(&self, action: &ActionOption, situation: &Situation) -> f64 {
        if let Some(risk) = action.risk {
            return risk;
        }
        let mut risk: f64 = 0.5;
        if action.outcomes.is_empty() {
            risk += 0.2;
        }
        if situation.safety_critical {
            risk += 0.2;
        }
        risk.min(1.0)
    }

    /// Explicit expected value, else the outcome-weighted mean, else `utility`.
    pub fn expected_value(&self, action: &ActionOption, utility: f64) -> f64 {
        if let Some(ev) = action.expected_value {
            return ev;
        }
        if action.outcomes.is_empty() {
            return utility;
        }
        action
            .outcomes
            .iter()
            .map(|o| o.probability * o.value)
            .sum()
    }

    /// Prospect-theory value of `expected_value`, scaled down by risk
    /// according to the current risk tolerance.
    pub fn prospect_value(&self, expected_value: f64, risk: f64) -> f64 {
        let c = &self.config;
        let value = if expected_value >= 0.0 {
            expected_value.powf(c.gain_exponent)
        } else {
            -c.loss_aversion * expected_value.abs().powf(c.loss_exponent)
        };
        value * (1.0 - risk * (1.0 - c.risk_tolerance))
    }

    /// Score a single candidate.
    pub fn score(&self, action: &ActionOption, situation: &Situation) -> CandidateScore {
        let utility = self.utility(action);
        let risk = self.risk(action, situation);
        let expected_value = self.expected_value(action, utility);
        let prospect_value = self.prospect_value(expected_value, risk);
        let final_score = 0.4 * utility + 0.4 * prospect_value + 0.2 * (1.0 - risk);
        CandidateScore {
            action: action.name.clone(),
            utility,
            risk,
            expected_value,
            prospect_value,
            final_score,
        }
    }

    /// Pick the best action for `situation`.
    ///
    /// On equal scores the earliest candidate wins.
    pub fn decide(&mut self, situation: &Situation, actions: &[ActionOption]) -> Result<Decision> {
        if actions.is_empty() {
            return Err(DecisionError::NoActionsProvided);
        }

        let candidates: Vec<CandidateScore> =
            actions.iter().map(|a| self.score(a, situation)).collect();

        let mut index = 0;
        for (i, c) in candidates.iter().enumerate().skip(1) {
            if c.final_score > candidates[index].final_score {
                index = i;
            }
        }

        let best_score = candidates[index].final_score;
        let confidence = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, c)| c.final_score)
            .max_by(f64::total_cmp)
            .map_or(1.0, |second| (2.0 * (best_score - second).abs()).min(1.0));

        let decision = Decision {
            index,
            best: candidates[index].clone(),
            confidence,
            candidates,
        };
        debug!(
            action = %decision.best.action,
            score = decision.best.final_score,
            confidence,
            "decision made"
        );

        self.history.push_back(decision.clone());
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
        Ok(decision)
    }

    /// Set the risk tolerance, clamped to [0, 1].
    pub fn set_risk_tolerance(&mut self, tolerance: f64) {
        self.config.risk_tolerance = tolerance.clamp(0.0, 1.0);
    }

    /// Current risk tolerance.
    pub fn risk_tolerance(&self) -> f64 {
        self.config.risk_tolerance
    }

    /// Replace the criterion weight table.
    pub fn set_criteria_weights(&mut self, weights: BTreeMap<String, f64>) {
        self.config.weights = weights;
    }

    /// Recent decisions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Decision> {
        self.history.iter()
    }

    /// Aggregate statistics over the retained history.
    pub fn statistics(&self) -> DecisionStats {
        let n = self.history.len();
        if n == 0 {
            return DecisionStats {
                decisions: 0,
                mean_confidence: 0.0,
                mean_score: 0.0,
            };
        }
        let (conf, score) = self
            .history
            .iter()
            .fold((0.0, 0.0), |(c, s), d| (c + d.confidence, s + d.best.final_score));
        DecisionStats {
            decisions: n,
            mean_confidence: conf / n as f64,
            mean_score: score / n as f64,
        }
    }

    /// Read-only access to the configuration.
    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_empty_options() {
        let mut engine = DecisionEngine::default();
        assert_eq!(
            engine.decide(&Situation::default(), &[]).unwrap_err(),
            DecisionError::NoActionsProvided
        );
    }

    #[test]
    fn test_default_utility() {
        let engine = DecisionEngine::default();
        // 0.4*0.6 + 0.3*0.6 + 0.2*0.7 + 0.1*0.5
        let u = engine.utility(&ActionOption::new("plain"));
        assert!((u - 0.61).abs() < EPS);
    }

    #[test]
    fn test_cost_criterion_inverted() {
        let engine = DecisionEngine::default();
        let cheap = engine.utility(&ActionOption::new("cheap").with_cost(0.0));
        let dear = engine.utility(&ActionOption::new("dear").with_cost(1.0));
        assert!((cheap - dear - 0.1).abs() < EPS);
    }

    #[test]
    fn test_unknown_criterion_defaults() {
        let mut engine = DecisionEngine::default();
        let mut weights = BTreeMap::new();
        weights.insert("novelty".to_string(), 1.0);
        engine.set_criteria_weights(weights);
        assert!((engine.utility(&ActionOption::new("a")) - 0.5).abs() < EPS);
        let novel = ActionOption::new("b").with_criterion("novelty", 0.9);
        assert!((engine.utility(&novel) - 0.9).abs() < EPS);
    }

    #[test]
    fn test_risk_heuristic() {
        let engine = DecisionEngine::default();
        let bare = ActionOption::new("bare");
        assert!((engine.risk(&bare, &Situation::default()) - 0.7).abs() < EPS);
        assert!((engine.risk(&bare, &Situation::safety_critical()) - 0.9).abs() < EPS);
        let known = ActionOption::new("known").with_outcome(1.0, 1.0);
        assert!((engine.risk(&known, &Situation::default()) - 0.5).abs() < EPS);
        let explicit = ActionOption::new("explicit").with_risk(0.1);
        assert!((engine.risk(&explicit, &Situation::safety_critical()) - 0.1).abs() < EPS);
    }

    #[test]
    fn test_expected_value_sources() {
        let engine = DecisionEngine::default();
        let explicit = ActionOption::new("a").with_expected_value(3.0).with_outcome(1.0, 9.0);
        assert!((engine.expected_value(&explicit, 0.2) - 3.0).abs() < EPS);
        let outcomes = ActionOption::new("b").with_outcome(0.5, 4.0).with_outcome(0.5, -2.0);
        assert!((engine.expected_value(&outcomes, 0.2) - 1.0).abs() < EPS);
        assert!((engine.expected_value(&ActionOption::new("c"), 0.2) - 0.2).abs() < EPS);
    }

    #[test]
    fn test_loss_aversion_dominates() {
        let engine = DecisionEngine::default();
        let gain = engine.prospect_value(10.0, 0.3);
        let loss = engine.prospect_value(-10.0, 0.3);
        assert!(gain > 0.0 && loss < 0.0);
        assert!((loss.abs() / gain - 2.25).abs() < 1e-9);
        assert!(gain > loss);
    }

    #[test]
    fn test_risk_tolerance_scales_prospect() {
        let mut engine = DecisionEngine::default();
        engine.set_risk_tolerance(1.0);
        let seeking = engine.prospect_value(1.0, 0.8);
        assert!((seeking - 1.0).abs() < EPS);
        engine.set_risk_tolerance(0.0);
        let averse = engine.prospect_value(1.0, 0.8);
        assert!((averse - 0.2).abs() < EPS);
        engine.set_risk_tolerance(7.0);
        assert!((engine.risk_tolerance() - 1.0).abs() < EPS);
        engine.set_risk_tolerance(-1.0);
        assert!(engine.risk_tolerance().abs() < EPS);
    }

    #[test]
    fn test_final_score_formula() {
        let engine = DecisionEngine::default();
        let action = ActionOption::new("a").with_risk(0.5).with_expected_value(1.0);
        let s = engine.score(&action, &Situation::default());
        let expected_pv = 1.0 * (1.0 - 0.5 * 0.5);
        assert!((s.prospect_value - expected_pv).abs() < EPS);
        let expected = 0.4 * 0.61 + 0.4 * expected_pv + 0.2 * 0.5;
        assert!((s.final_score - expected).abs() < EPS);
    }

    #[test]
    fn test_single_option_full_confidence() {
        let mut engine = DecisionEngine::default();
        let d = engine
            .decide(&Situation::default(), &[ActionOption::new("go").with_expected_value(-50.0)])
            .unwrap();
        assert_eq!(d.index, 0);
        assert!((d.confidence - 1.0).abs() < EPS);
    }

    #[test]
    fn test_picks_best_and_confidence_from_margin() {
        let mut engine = DecisionEngine::default();
        let actions = vec![
            ActionOption::new("loss").with_risk(0.2).with_expected_value(-10.0),
            ActionOption::new("gain").with_risk(0.2).with_expected_value(10.0),
        ];
        let d = engine.decide(&Situation::default(), &actions).unwrap();
        assert_eq!(d.best.action, "gain");
        assert_eq!(d.index, 1);
        assert!((d.confidence - 1.0).abs() < EPS);

        let close = vec![
            ActionOption::new("a").with_risk(0.2).with_expected_value(0.50),
            ActionOption::new("b").with_risk(0.2).with_expected_value(0.51),
        ];
        let d = engine.decide(&Situation::default(), &close).unwrap();
        let margin = (d.candidates[1].final_score - d.candidates[0].final_score).abs();
        assert!((d.confidence - 2.0 * margin).abs() < EPS);
        assert!(d.confidence < 1.0);
    }

    #[test]
    fn test_tie_keeps_first_candidate() {
        let mut engine = DecisionEngine::default();
        let actions = vec![ActionOption::new("first"), ActionOption::new("second")];
        let d = engine.decide(&Situation::default(), &actions).unwrap();
        assert_eq!(d.best.action, "first");
        assert!(d.confidence.abs() < EPS);
    }

    #[test]
    fn test_history_bounded() {
        let mut engine = DecisionEngine::new(DecisionConfig {
            history_limit: 3,
            ..Default::default()
        });
        for _ in 0..10 {
            engine
                .decide(&Situation::default(), &[ActionOption::new("x")])
                .unwrap();
        }
        let stats = engine.statistics();
        assert_eq!(stats.decisions, 3);
        assert!((stats.mean_confidence - 1.0).abs() < EPS);
        assert_eq!(engine.history().count(), 3);
    }

    #[test]
    fn test_default_history_limit() {
        let mut engine = DecisionEngine::default();
        for _ in 0..150 {
            engine
                .decide(&Situation::default(), &[ActionOption::new("x")])
                .unwrap();
        }
        assert_eq!(engine.statistics().decisions, 100);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let cfg = DecisionConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: DecisionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
