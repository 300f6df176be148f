//! Suspicion rules for the DDoS flow analyzer.
//!
//! The rule set is an ordered registry of value-typed descriptors. Each
//! rule is evaluated independently against a window aggregate snapshot and
//! its request frequency; fired rules are additive, with no early exit.

use regex::RegexSet;
use serde::Serialize;

use crate::core::grouper::WindowAggregate;
use crate::core::DetectionConfig;

/// Distinct-path count above which the path-diversity rule fires
pub const PATH_DIVERSITY_THRESHOLD: usize = 50;

/// One fired rule's contribution to a window's risk score
#[derive(Debug, Clone, Serialize)]
pub struct Indicator {
    /// Stable identifier of the rule that fired
    pub rule_id: String,
    /// Human-readable explanation of why it fired
    pub message: String,
    /// Risk weight added by this rule
    pub weight: u32,
}

/// Shared evaluation state built once per run.
///
/// Holds the detection configuration plus the compiled source-address
/// pattern set, so per-window evaluation never recompiles regexes.
pub struct RuleContext {
    pub config: DetectionConfig,
    source_patterns: RegexSet,
}

impl RuleContext {
    pub fn new(config: DetectionConfig) -> Result<Self, regex::Error> {
        let source_patterns = RegexSet::new(&config.suspicious_source_patterns)?;
        Ok(Self {
            config,
            source_patterns,
        })
    }

    /// Whether a source address matches the configured suspicious patterns
    pub fn source_is_suspicious(&self, source: &str) -> bool {
        self.source_patterns.is_match(source)
    }
}

type RuleCheck = fn(&WindowAggregate, f64, &RuleContext) -> Option<String>;

/// A rule descriptor: stable id, risk weight, and a predicate that
/// returns the indicator message when the rule fires
pub struct RuleDef {
    pub id: &'static str,
    pub weight: u32,
    check: RuleCheck,
}

impl RuleDef {
    /// Evaluate this rule against one window.
    ///
    /// `frequency` is the window's requests per configured window-minute.
    pub fn evaluate(
        &self,
        window: &WindowAggregate,
        frequency: f64,
        ctx: &RuleContext,
    ) -> Option<Indicator> {
        (self.check)(window, frequency, ctx).map(|message| Indicator {
            rule_id: self.id.to_string(),
            message,
            weight: self.weight,
        })
    }
}

/// The canonical ordered rule registry
pub fn standard_rules() -> Vec<RuleDef> {
    vec![
        RuleDef {
            id: "high_frequency",
            weight: 3,
            check: check_high_frequency,
        },
        RuleDef {
            id: "medium_frequency",
            weight: 2,
            check: check_medium_frequency,
        },
        RuleDef {
            id: "suspicious_user_agent",
            weight: 2,
            check: check_suspicious_user_agent,
        },
        RuleDef {
            id: "suspicious_source",
            weight: 1,
            check: check_suspicious_source,
        },
        RuleDef {
            id: "suspicious_response_codes",
            weight: 1,
            check: check_suspicious_response_codes,
        },
        RuleDef {
            id: "path_diversity",
            weight: 1,
            check: check_path_diversity,
        },
        RuleDef {
            id: "suspicious_methods",
            weight: 1,
            check: check_suspicious_methods,
        },
    ]
}

fn check_high_frequency(
    _window: &WindowAggregate,
    frequency: f64,
    ctx: &RuleContext,
) -> Option<String> {
    if frequency >= ctx.config.high_freq_threshold {
        Some(format!(
            "High request frequency: {:.1} requests/min",
            frequency
        ))
    } else {
        None
    }
}

fn check_medium_frequency(
    _window: &WindowAggregate,
    frequency: f64,
    ctx: &RuleContext,
) -> Option<String> {
    if frequency >= ctx.config.medium_freq_threshold
        && frequency < ctx.config.high_freq_threshold
    {
        Some(format!(
            "Elevated request frequency: {:.1} requests/min",
            frequency
        ))
    } else {
        None
    }
}

fn check_suspicious_user_agent(
    window: &WindowAggregate,
    _frequency: f64,
    ctx: &RuleContext,
) -> Option<String> {
    for agent in &window.user_agents {
        let lowered = agent.to_lowercase();
        if ctx
            .config
            .suspicious_user_agents
            .iter()
            .any(|s| lowered.contains(&s.to_lowercase()))
        {
            return Some(format!("Suspicious user agent: {}", agent));
        }
    }
    None
}

fn check_suspicious_source(
    window: &WindowAggregate,
    _frequency: f64,
    ctx: &RuleContext,
) -> Option<String> {
    if ctx.source_is_suspicious(&window.source) {
        Some(format!(
            "Source address matches suspicious pattern: {}",
            window.source
        ))
    } else {
        None
    }
}

fn check_suspicious_response_codes(
    window: &WindowAggregate,
    _frequency: f64,
    ctx: &RuleContext,
) -> Option<String> {
    let matched: Vec<&str> = window
        .response_codes
        .keys()
        .filter(|code| {
            ctx.config
                .suspicious_response_codes
                .iter()
                .any(|s| s.trim() == code.trim())
        })
        .map(String::as_str)
        .collect();
    if matched.is_empty() {
        None
    } else {
        Some(format!("Suspicious response codes: {}", matched.join(", ")))
    }
}

fn check_path_diversity(
    window: &WindowAggregate,
    _frequency: f64,
    _ctx: &RuleContext,
) -> Option<String> {
    let count = window.paths.len();
    if count > PATH_DIVERSITY_THRESHOLD {
        Some(format!("High path diversity: {} distinct paths", count))
    } else {
        None
    }
}

fn check_suspicious_methods(
    window: &WindowAggregate,
    _frequency: f64,
    ctx: &RuleContext,
) -> Option<String> {
    let matched: Vec<&str> = window
        .methods
        .keys()
        .filter(|method| {
            ctx.config
                .suspicious_methods
                .iter()
                .any(|s| s.eq_ignore_ascii_case(method))
        })
        .map(String::as_str)
        .collect();
    if matched.is_empty() {
        None
    } else {
        Some(format!("Suspicious HTTP methods: {}", matched.join(", ")))
    }
}
