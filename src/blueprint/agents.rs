//! The financial strategy agent chain.
//!
//! Five agents, run in order; each consumes the accumulated context and
//! produces one typed fragment of the final strategy:
//!
//! 1. `FundingStageAgent` — which stage to target
//! 2. `RaiseAmountAgent` — how much to raise
//! 3. `InvestorTypeAgent` — which investors to approach
//! 4. `RunwayAgent` — runway and burn guidance
//! 5. `FinancialPriorityAgent` — top priorities for the next 6-12 months

use std::sync::Arc;

use serde_json::Value;

use crate::chain::context::AgentContext;
use crate::chain::ChainAgent;

/// The default chain, in execution order.
pub fn default_chain() -> Vec<Arc<dyn ChainAgent>> {
    vec![
        Arc::new(FundingStageAgent),
        Arc::new(RaiseAmountAgent),
        Arc::new(InvestorTypeAgent),
        Arc::new(RunwayAgent),
        Arc::new(FinancialPriorityAgent),
    ]
}

/// Render a context field for prompt interpolation.
fn field(ctx: &AgentContext, key: &str) -> String {
    match ctx.get(key) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => "N/A".to_string(),
    }
}

/// Render a nested field from an earlier agent's keyed output.
fn nested(ctx: &AgentContext, key: &str, inner: &str, default: &str) -> String {
    ctx.get(key)
        .and_then(|v| v.get(inner))
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Determines the funding stage a startup should target.
pub struct FundingStageAgent;

impl ChainAgent for FundingStageAgent {
    fn name(&self) -> &str {
        "FundingStageAgent"
    }

    fn role(&self) -> &str {
        "You are a senior startup finance advisor specializing in funding strategies."
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    fn output_contract(&self) -> &str {
        r#"{
  "funding_stage": "Idea Stage | Pre-Seed | Seed | Series A | Series B+ | Bootstrapped/Profitable",
  "confidence": "high/medium/low",
  "rationale": "2-3 sentence explanation based on product stage, revenue, and traction",
  "stage_characteristics": "key indicators that led to this recommendation"
}"#
    }

    fn required_fields(&self) -> &[&str] {
        &["funding_stage", "confidence", "rationale"]
    }

    fn context_key(&self) -> &str {
        "funding_stage_report"
    }

    fn build_prompt(&self, ctx: &AgentContext) -> String {
        format!(
            "**Your Role:** Analyze the startup profile and determine the most appropriate funding stage.\n\n\
             **Startup Profile:**\n\
             - Name: {}\n\
             - Industry: {}\n\
             - Target Market: {}\n\
             - Geography: {}\n\
             - Team Size: {}\n\
             - Product Stage: {}\n\
             - Monthly Revenue: ${}\n\
             - Growth Rate: {}\n\
             - Traction: {}\n\
             - Business Model: {}\n\
             - Funding Goal: ${}\n\n\
             **Task:** Determine the funding stage this startup should target.\n\n\
             **Available Stages:**\n\
             - Idea Stage (no product yet)\n\
             - Pre-Seed (MVP in development, no revenue)\n\
             - Seed (product launched, early traction)\n\
             - Series A (product-market fit, scaling)\n\
             - Series B+ (established revenue, expansion)\n\
             - Bootstrapped/Profitable (no external funding needed)",
            field(ctx, "startupName"),
            field(ctx, "industry"),
            field(ctx, "targetMarket"),
            field(ctx, "geography"),
            field(ctx, "teamSize"),
            field(ctx, "productStage"),
            field(ctx, "monthlyRevenue"),
            field(ctx, "growthRate"),
            field(ctx, "tractionSummary"),
            field(ctx, "businessModel"),
            field(ctx, "fundingGoal"),
        )
    }
}

/// Recommends how much capital to raise.
pub struct RaiseAmountAgent;

impl ChainAgent for RaiseAmountAgent {
    fn name(&self) -> &str {
        "RaiseAmountAgent"
    }

    fn role(&self) -> &str {
        "You are a startup CFO advisor specializing in fundraising strategy."
    }

    fn temperature(&self) -> f32 {
        0.4
    }

    fn max_tokens(&self) -> u32 {
        1536
    }

    fn output_contract(&self) -> &str {
        r#"{
  "recommended_amount": "e.g., $500K-$750K",
  "minimum_viable": "lowest amount that makes sense",
  "optimal_amount": "ideal amount for 18-24mo runway",
  "rationale": "explanation of calculation",
  "breakdown": {
    "team_expansion": "estimated cost",
    "product_development": "estimated cost",
    "marketing_sales": "estimated cost",
    "operations_overhead": "estimated cost",
    "buffer": "contingency"
  }
}"#
    }

    fn required_fields(&self) -> &[&str] {
        &["recommended_amount", "rationale"]
    }

    fn context_key(&self) -> &str {
        "raise_amount_report"
    }

    fn build_prompt(&self, ctx: &AgentContext) -> String {
        format!(
            "**Your Role:** Recommend the ideal funding amount to raise.\n\n\
             **Startup Profile:**\n\
             - Industry: {}\n\
             - Target Market: {}\n\
             - Team Size: {}\n\
             - Monthly Revenue: ${}\n\
             - Funding Stage: {}\n\
             - Funding Goal (user input): ${}\n\
             - Main Financial Concern: {}\n\n\
             **Task:** Calculate the recommended raise amount based on:\n\
             1. Typical range for this funding stage\n\
             2. Team size and hiring needs\n\
             3. Industry capital requirements\n\
             4. Runway target (18-24 months typical)\n\
             5. User's stated goal (if provided)",
            field(ctx, "industry"),
            field(ctx, "targetMarket"),
            field(ctx, "teamSize"),
            field(ctx, "monthlyRevenue"),
            field(ctx, "funding_stage"),
            field(ctx, "fundingGoal"),
            field(ctx, "mainFinancialConcern"),
        )
    }
}

/// Identifies the best investor types for the startup.
pub struct InvestorTypeAgent;

impl ChainAgent for InvestorTypeAgent {
    fn name(&self) -> &str {
        "InvestorTypeAgent"
    }

    fn role(&self) -> &str {
        "You are a startup fundraising strategist with deep investor network knowledge."
    }

    fn temperature(&self) -> f32 {
        0.5
    }

    fn max_tokens(&self) -> u32 {
        1536
    }

    fn output_contract(&self) -> &str {
        r#"{
  "primary_investor_type": "most suitable type",
  "secondary_options": ["alternative type 1", "alternative type 2"],
  "avoid": ["types that don't make sense for this stage/model"],
  "rationale": "why these investors are ideal",
  "target_profile": "specific characteristics to look for in investors",
  "approach_strategy": "how to approach these investors"
}"#
    }

    fn required_fields(&self) -> &[&str] {
        &["primary_investor_type", "rationale"]
    }

    fn context_key(&self) -> &str {
        "investor_type_report"
    }

    fn build_prompt(&self, ctx: &AgentContext) -> String {
        format!(
            "**Your Role:** Identify the best investor types for this startup.\n\n\
             **Startup Profile:**\n\
             - Industry: {}\n\
             - Target Market: {}\n\
             - Geography: {}\n\
             - Funding Stage: {}\n\
             - Raise Amount: {}\n\
             - Business Model: {}\n\n\
             **Task:** Recommend investor types that are best suited for this startup.\n\n\
             **Investor Categories:**\n\
             - Angel Investors (individual high-net-worth)\n\
             - Micro VCs ($50K-$500K checks)\n\
             - Seed VCs ($500K-$2M checks)\n\
             - Institutional VCs (Series A+)\n\
             - Corporate VCs (strategic investors)\n\
             - Accelerators (Y Combinator, Techstars, etc.)\n\
             - Government Grants/Programs\n\
             - Crowdfunding\n\
             - Revenue-Based Financing",
            field(ctx, "industry"),
            field(ctx, "targetMarket"),
            field(ctx, "geography"),
            field(ctx, "funding_stage"),
            field(ctx, "recommended_amount"),
            field(ctx, "businessModel"),
        )
    }
}

/// Estimates runway and burn-rate guidance.
pub struct RunwayAgent;

impl ChainAgent for RunwayAgent {
    fn name(&self) -> &str {
        "RunwayAgent"
    }

    fn role(&self) -> &str {
        "You are a startup financial planning expert."
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    fn max_tokens(&self) -> u32 {
        1536
    }

    fn output_contract(&self) -> &str {
        r#"{
  "estimated_runway_months": "12-18",
  "monthly_burn_rate": "$50K-$75K",
  "assumptions": {
    "team_costs": "breakdown",
    "operational_expenses": "breakdown",
    "growth_investments": "breakdown"
  },
  "revenue_impact": "how current/projected revenue affects runway",
  "key_milestones": ["what should be achieved within this runway"],
  "burn_rate_guidance": "advice on managing burn rate"
}"#
    }

    fn required_fields(&self) -> &[&str] {
        &["estimated_runway_months", "monthly_burn_rate"]
    }

    fn context_key(&self) -> &str {
        "runway_report"
    }

    fn build_prompt(&self, ctx: &AgentContext) -> String {
        // Prefer the optimal amount; the recommended range is the fallback.
        let raise_amount = nested(
            ctx,
            "raise_amount_report",
            "optimal_amount",
            &field(ctx, "recommended_amount"),
        );
        format!(
            "**Your Role:** Calculate expected runway and burn rate guidance.\n\n\
             **Startup Profile:**\n\
             - Team Size: {}\n\
             - Monthly Revenue: ${}\n\
             - Industry: {}\n\
             - Geography: {}\n\
             - Raise Amount: {}\n\
             - Main Financial Concern: {}\n\n\
             **Task:** Estimate runway and provide burn rate guidance.\n\n\
             **Consider:**\n\
             1. Current team cost (salaries, benefits)\n\
             2. Expected hiring based on raise amount\n\
             3. Industry-standard operational costs\n\
             4. Geography-based cost differences\n\
             5. Revenue (if any) offsetting burn\n\
             6. Target runway: 18-24 months",
            field(ctx, "teamSize"),
            field(ctx, "monthlyRevenue"),
            field(ctx, "industry"),
            field(ctx, "geography"),
            raise_amount,
            field(ctx, "mainFinancialConcern"),
        )
    }
}

/// Defines the top financial priorities for the next 6-12 months.
pub struct FinancialPriorityAgent;

impl ChainAgent for FinancialPriorityAgent {
    fn name(&self) -> &str {
        "FinancialPriorityAgent"
    }

    fn role(&self) -> &str {
        "You are a strategic startup advisor focused on financial prioritization."
    }

    fn temperature(&self) -> f32 {
        0.6
    }

    fn max_tokens(&self) -> u32 {
        2048
    }

    fn output_contract(&self) -> &str {
        r#"{
  "priorities": [
    {
      "priority": "Clear action item",
      "importance": "critical/high/medium",
      "rationale": "why this matters now",
      "timeline": "when to address",
      "estimated_cost": "if applicable"
    }
  ],
  "quick_wins": ["easy immediate actions with high impact"],
  "avoid": ["what NOT to spend money on right now"],
  "success_metrics": ["how to measure progress on these priorities"]
}"#
    }

    fn required_fields(&self) -> &[&str] {
        &["priorities"]
    }

    fn context_key(&self) -> &str {
        "financial_priority_report"
    }

    fn build_prompt(&self, ctx: &AgentContext) -> String {
        format!(
            "**Your Role:** Identify the top 3-5 immediate financial priorities.\n\n\
             **Startup Profile:**\n\
             - Industry: {}\n\
             - Product Stage: {}\n\
             - Team Size: {}\n\
             - Monthly Revenue: ${}\n\
             - Main Concern: {}\n\n\
             **Previous Agent Outputs:**\n\
             - Funding Stage: {}\n\
             - Raise Amount: {}\n\
             - Investor Type: {}\n\
             - Runway: {}\n\n\
             **Task:** Define the top financial priorities for the next 6-12 months.\n\n\
             **Priority Categories:**\n\
             - Fundraising activities\n\
             - Team expansion/hiring\n\
             - Product development investment\n\
             - Marketing & customer acquisition\n\
             - Sales team & GTM strategy\n\
             - Infrastructure & operations\n\
             - Legal & compliance\n\
             - Cash flow management\n\
             - Unit economics optimization",
            field(ctx, "industry"),
            field(ctx, "productStage"),
            field(ctx, "teamSize"),
            field(ctx, "monthlyRevenue"),
            field(ctx, "mainFinancialConcern"),
            field(ctx, "funding_stage"),
            field(ctx, "recommended_amount"),
            field(ctx, "primary_investor_type"),
            field(ctx, "estimated_runway_months"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::blueprint::input::GenerationInput;

    fn context() -> AgentContext {
        let input: GenerationInput = serde_json::from_value(json!({
            "startupName": "Acme Analytics",
            "industry": "SaaS",
            "targetMarket": "B2B",
            "geography": "United States",
            "teamSize": 4,
            "productStage": "MVP",
            "monthlyRevenue": 12000,
            "businessModel": "Subscription",
            "mainFinancialConcern": "Runway planning"
        }))
        .unwrap();
        AgentContext::from_input(input.to_context())
    }

    #[test]
    fn chain_order_is_fixed() {
        let names: Vec<_> = default_chain().iter().map(|a| a.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "FundingStageAgent",
                "RaiseAmountAgent",
                "InvestorTypeAgent",
                "RunwayAgent",
                "FinancialPriorityAgent",
            ]
        );
    }

    #[test]
    fn funding_stage_prompt_includes_profile() {
        let prompt = FundingStageAgent.build_prompt(&context());
        assert!(prompt.contains("Acme Analytics"));
        assert!(prompt.contains("SaaS"));
        assert!(prompt.contains("B2B"));
        assert!(prompt.contains("MVP"));
        assert!(prompt.contains("$12000"));
    }

    #[test]
    fn raise_amount_prompt_reads_prior_stage() {
        let mut ctx = context();
        ctx.merge(match json!({"funding_stage": "Seed"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        });
        let prompt = RaiseAmountAgent.build_prompt(&ctx);
        assert!(prompt.contains("Funding Stage: Seed"));
    }

    #[test]
    fn runway_prompt_prefers_optimal_amount() {
        let mut ctx = context();
        ctx.merge(
            match json!({
                "raise_amount_report": {"optimal_amount": "$750K"},
                "recommended_amount": "$500K-$750K"
            }) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
        );
        let prompt = RunwayAgent.build_prompt(&ctx);
        assert!(prompt.contains("Raise Amount: $750K"));
    }

    #[test]
    fn missing_fields_render_as_na() {
        let prompt = RaiseAmountAgent.build_prompt(&context());
        // No funding stage yet: the first agent has not run.
        assert!(prompt.contains("Funding Stage: N/A"));
    }

    #[test]
    fn all_agents_have_required_fields_in_contract() {
        for agent in default_chain() {
            for required in agent.required_fields() {
                assert!(
                    agent.output_contract().contains(required),
                    "{} contract missing {}",
                    agent.name(),
                    required
                );
            }
        }
    }
}
