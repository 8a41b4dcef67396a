use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Memo schema version mixed into analysis fingerprints.
pub const MEMO_VERSION: &str = "1";

/// Five-tier recommendation rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentRating {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

/// Overall risk bucket across business, financial, and valuation risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

/// Durable competitive advantage categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoatType {
    Brand,
    NetworkEffects,
    CostAdvantage,
    SwitchingCosts,
    EfficientScale,
    IntangibleAssets,
    None,
}

/// One identified moat with supporting evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitiveAdvantage {
    pub moat_type: MoatType,
    pub description: String,
    /// "narrow", "wide", or "eroding".
    pub durability: String,
    pub evidence: Vec<String>,
    pub confidence: f64,
}

/// One categorized risk with severity and likelihood.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    /// "market", "regulatory", "competitive", "operational", "financial".
    pub category: String,
    pub title: String,
    pub description: String,
    /// "low", "medium", "high", "critical".
    pub severity: String,
    /// "unlikely", "possible", "likely", "very_likely".
    pub probability: String,
    #[serde(default)]
    pub mitigation: Option<String>,
}

/// Structured qualitative investment memo produced by the analyst stage.
///
/// Every number appearing in the narrative is substituted from the
/// ValuationResult; the model supplies judgment, not arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentMemo {
    pub ticker: String,
    pub company_name: String,
    pub analysis_date: DateTime<Utc>,

    pub one_sentence_thesis: String,
    pub investment_thesis: String,

    pub competitive_advantages: Vec<CompetitiveAdvantage>,
    pub moat_summary: String,
    /// "none", "narrow", or "wide".
    pub moat_durability: String,

    pub management_assessment: String,
    pub management_integrity_score: u8,
    pub owner_oriented: bool,

    pub valuation_narrative: String,
    pub margin_of_safety_assessment: String,

    pub key_positives: Vec<String>,
    pub key_concerns: Vec<String>,
    pub key_risks: Vec<RiskFactor>,
    pub potential_catalysts: Vec<String>,

    /// e.g. "3-5 years", "5-10 years", "forever".
    pub ideal_holding_period: String,

    pub investment_rating: InvestmentRating,
    pub conviction_level: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub suitable_for: Vec<String>,

    pub closing_quote: String,
    pub final_thoughts: String,

    pub model_used: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_round_trips_snake_case() {
        let json = serde_json::to_string(&InvestmentRating::StrongBuy).unwrap();
        assert_eq!(json, "\"strong_buy\"");
        let back: InvestmentRating = serde_json::from_str(&json).unwrap();
        assert_eq!(back, InvestmentRating::StrongBuy);
    }

    #[test]
    fn moat_type_accepts_all_variants() {
        for name in [
            "brand",
            "network_effects",
            "cost_advantage",
            "switching_costs",
            "efficient_scale",
            "intangible_assets",
            "none",
        ] {
            let parsed: MoatType = serde_json::from_str(&format!("\"{}\"", name)).unwrap();
            let json = serde_json::to_string(&parsed).unwrap();
            assert_eq!(json, format!("\"{}\"", name));
        }
    }
}
