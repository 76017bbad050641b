//! System instructions forwarded to the search model.

use crate::core_types::ReasoningMethod;

const IRAC_INSTRUCTION: &str = "For legal queries, you MUST structure your response using IRAC: Issue (identify the legal question), Rule (state the relevant law found via search), Analysis (apply the rule to the facts), and Conclusion.";
const CREC_INSTRUCTION: &str = "For legal queries, you MUST structure your response using CREC: Conclusion (state the answer first), Rule (state the law found via search), Explanation (explain how the law applies), and Conclusion (restate the answer).";
const IPAC_INSTRUCTION: &str = "For legal queries, you MUST structure your response using IPAC: Issue (identify the legal question), Principle (state the legal principle found via search), Application (apply it to the situation), and Conclusion.";

pub fn method_instruction(method: ReasoningMethod) -> &'static str {
    match method {
        ReasoningMethod::None => "",
        ReasoningMethod::Irac => IRAC_INSTRUCTION,
        ReasoningMethod::Crec => CREC_INSTRUCTION,
        ReasoningMethod::Ipac => IPAC_INSTRUCTION,
    }
}

/// Full system instruction for one search request.
pub fn system_instruction(method: ReasoningMethod) -> String {
    let mut lines = vec![
        "You are a Google Search Professional.",
        "MANDATORY: You must use the 'googleSearch' tool for every query to find factual, up-to-date information.",
    ];

    let structure = method_instruction(method);
    if !structure.is_empty() {
        lines.push(structure);
    }

    lines.push("If the query involves legal advice or law, state that you are an AI using Google Search data and not a lawyer.");
    lines.push("Always prioritize Google Search results over internal knowledge.");
    lines.join("\n")
}
