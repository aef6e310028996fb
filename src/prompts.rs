//! Prompt builders for the classification stage and the three roadmap stages
//!
//! Each builder is a pure function of its inputs. The roadmap builders embed the literal
//! text of earlier stages, which is what forces the pipeline to run sequentially.

use crate::clients::traits::ChatMessage;

const ADVISOR_PERSONA: &str = "You are an experienced career and education advisor. \
You give concrete, realistic guidance grounded in how people actually progress.";

/// Goal specificity judgement; asks for one of two JSON shapes
pub fn classification(goal: &str, duration: &str) -> Vec<ChatMessage> {
    let system = format!(
        "{ADVISOR_PERSONA}\n\
         Decide whether a goal is specific enough to plan against.\n\
         Respond with a single JSON object and nothing else, in exactly one of these shapes:\n\
         1. If the goal is too vague:\n\
         {{\"type\": \"clarify\", \"message\": \"<one or two sentences explaining what is missing>\", \
         \"suggestions\": [\"<goal 1>\", \"<goal 2>\", \"<goal 3>\"]}}\n\
         The suggestions are exactly 3 more specific rewrites of the user's goal, each written \
         in first person (starting with \"I want to\").\n\
         2. If the goal is specific enough:\n\
         {{\"type\": \"refined\", \"refinedGoal\": \"<the goal restated clearly>\"}}\n\
         The refined goal is written in first person and is under 40 words.\n\
         Do not wrap the JSON in markdown fences."
    );
    let user = format!("Goal: {goal}\nTime available: {duration}");
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Stage 1: four-phase outline as free text
pub fn outline(refined_goal: &str, duration: &str) -> Vec<ChatMessage> {
    let system = format!(
        "{ADVISOR_PERSONA}\n\
         Write a high-level outline for reaching the goal within the time available. \
         Structure it as exactly 4 phases. For each phase give a name, the approximate time span, \
         the focus of the phase and 2-4 key outcomes. Use plain text with headings, no JSON."
    );
    let user = format!("Goal: {refined_goal}\nTime available: {duration}");
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Stage 2: detailed roadmap expanding the outline
pub fn detailed(refined_goal: &str, duration: &str, outline: &str) -> Vec<ChatMessage> {
    let system = format!(
        "{ADVISOR_PERSONA}\n\
         Expand the outline below into a detailed roadmap. For every phase list concrete skills, \
         courses or certifications, projects, and the signal that the phase is complete. \
         Keep the phase order and time spans of the outline. Use plain text, no JSON."
    );
    let user = format!(
        "Goal: {refined_goal}\nTime available: {duration}\n\nOutline:\n{outline}"
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Stage 3: compress the detailed roadmap into machine-readable milestones
pub fn conversion(detailed: &str, duration: &str) -> Vec<ChatMessage> {
    let system = "You convert roadmaps into structured data. \
                  Output ONLY a JSON array, no markdown fences, no commentary. \
                  The array holds 5 to 7 milestone objects in chronological order. \
                  Each object has exactly these fields:\n\
                  - \"title\": short milestone name (string)\n\
                  - \"year\": the year of the plan in which the milestone is reached, starting at 1 (integer)\n\
                  - \"description\": two or three sentences on what is achieved (string)\n\
                  Do not use trailing commas.";
    let user = format!("Time available: {duration}\n\nRoadmap:\n{detailed}");
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::traits::Role;

    #[test]
    fn test_classification_carries_goal_and_duration() {
        let msgs = classification("computers", "2 years");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("\"type\": \"clarify\""));
        assert!(msgs[1].content.contains("computers"));
        assert!(msgs[1].content.contains("2 years"));
    }

    #[test]
    fn test_each_roadmap_stage_embeds_previous_output() {
        let d = detailed("I want to be an ML engineer", "18 months", "PHASE-ONE-TEXT");
        assert!(d[1].content.contains("PHASE-ONE-TEXT"));

        let c = conversion("DETAILED-NARRATIVE", "18 months");
        assert!(c[1].content.contains("DETAILED-NARRATIVE"));
        assert!(c[0].content.contains("JSON array"));
    }
}
