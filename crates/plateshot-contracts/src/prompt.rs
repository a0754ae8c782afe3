use crate::edits::EditMode;

const BASE_CLAUSE: &str =
    "hero shot, ultra realistic, professional food photography, studio lighting, shallow depth of field";
const STYLE_CLAUSE: &str = "styled for a sales landing page hero banner";
const BACKGROUND_CLAUSE: &str =
    "isolated on a clean seamless studio background with every distraction removed";
const QUALITY_CLAUSE: &str =
    "rendered with crisp detail, balanced exposure and vivid natural colors";

/// Total over any label; unknown modes take the generic style clause.
pub fn build_prompt(food: &str, mode_label: &str) -> String {
    let clause = match EditMode::from_label(mode_label) {
        Some(mode) => mode_clause(mode),
        None => STYLE_CLAUSE,
    };
    format!("{food} {BASE_CLAUSE}, {clause}")
}

pub fn mode_clause(mode: EditMode) -> &'static str {
    match mode {
        EditMode::Style => STYLE_CLAUSE,
        EditMode::BackgroundCleaning => BACKGROUND_CLAUSE,
        EditMode::QualityImprovement => QUALITY_CLAUSE,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_prompt, mode_clause};
    use crate::edits::EditMode;

    #[test]
    fn style_prompt_matches_the_documented_wording() {
        assert_eq!(
            build_prompt("Pizza", "style"),
            "Pizza hero shot, ultra realistic, professional food photography, \
             studio lighting, shallow depth of field, styled for a sales landing \
             page hero banner"
        );
    }

    #[test]
    fn prompt_is_deterministic() {
        let first = build_prompt("Ramen", "quality-improvement");
        let second = build_prompt("Ramen", "quality-improvement");
        assert_eq!(first, second);
    }

    #[test]
    fn prompt_contains_the_food_text_verbatim() {
        for food in ["Pizza", "smoked  brisket ,extra", "寿司", ""] {
            for mode in ["style", "background-cleaning", "quality-improvement", "???"] {
                let prompt = build_prompt(food, mode);
                assert!(!prompt.is_empty());
                assert!(prompt.contains(food));
            }
        }
    }

    #[test]
    fn unknown_mode_falls_back_to_the_style_clause() {
        assert_eq!(build_prompt("Pizza", "sepia"), build_prompt("Pizza", "style"));
        assert_eq!(build_prompt("Pizza", ""), build_prompt("Pizza", "style"));
    }

    #[test]
    fn each_mode_appends_a_distinct_clause() {
        let clauses: Vec<&str> = EditMode::ALL.into_iter().map(mode_clause).collect();
        assert_eq!(clauses.len(), 3);
        assert_ne!(clauses[0], clauses[1]);
        assert_ne!(clauses[1], clauses[2]);
        assert_ne!(clauses[0], clauses[2]);
    }
}
