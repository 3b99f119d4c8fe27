//! Builds the `[USER_PROFILE]` and `[ANALYSIS]` blocks injected into the
//! system prompt ahead of the first consultation.

use std::fmt::Write as _;

use crate::query::analyzer::QueryConstraints;
use crate::query::search::{BudgetStatus, ConstrainedSearchResult};
use crate::store::UserProfile;

const BEGINNER_WARNING: &str =
    "მომხმარებელი დამწყებია. ურჩიეთ მხოლოდ საბაზისო დანამატები (პროტეინი, \
     კრეატინი) და აუხსენით მარტივად.";

const BEGINNER_OVERLOAD_WARNING: &str =
    "დამწყებისთვის ამდენი კატეგორია ერთდროულად ზედმეტია. შესთავაზეთ მაქსიმუმ \
     ორი საბაზისო დანამატი.";

/// Render the stored profile as a `[USER_PROFILE]` block, or nothing
/// when the profile is empty.
pub fn build_profile_block(profile: &UserProfile) -> Option<String> {
    if profile.is_empty() {
        return None;
    }
    let mut block = String::from("[USER_PROFILE]\n");
    if let Some(name) = &profile.name {
        let _ = writeln!(block, "სახელი: {name}");
    }
    if let Some(age) = profile.age {
        let _ = writeln!(block, "ასაკი: {age}");
    }
    if let Some(weight) = profile.weight_kg {
        let _ = writeln!(block, "წონა: {weight} კგ");
    }
    if let Some(height) = profile.height_cm {
        let _ = writeln!(block, "სიმაღლე: {height} სმ");
    }
    if let Some(occupation) = &profile.occupation {
        let _ = writeln!(block, "საქმიანობა: {occupation}");
    }
    if !profile.allergies.is_empty() {
        let _ = writeln!(block, "ალერგიები: {}", profile.allergies.join(", "));
    }
    block.push_str("[/USER_PROFILE]");
    Some(block)
}

/// Render the analyzer's findings (plus pre-search results, when they
/// ran) as an `[ANALYSIS]` block. `None` when nothing was detected.
pub fn build_analysis_block(
    constraints: &QueryConstraints,
    presearch: Option<&ConstrainedSearchResult>,
) -> Option<String> {
    if !constraints.has_findings() {
        return None;
    }

    let mut block = String::from("[ANALYSIS]\n");

    if let Some(budget) = constraints.budget {
        let _ = writeln!(block, "ბიუჯეტი: {budget} ლარი");
    }
    if let Some(months) = constraints.duration_months {
        let _ = writeln!(block, "მარაგის ხანგრძლივობა: {months} თვე");
    }
    if !constraints.products.is_empty() {
        let labels: Vec<&str> = constraints.products.iter().map(|k| k.label()).collect();
        let _ = writeln!(block, "მოთხოვნილი კატეგორიები: {}", labels.join(", "));
    }
    if !constraints.dietary.is_empty() {
        let _ = writeln!(
            block,
            "დიეტური შეზღუდვები: {}",
            constraints
                .dietary
                .iter()
                .map(|tag| format!("{tag:?}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if !constraints.exclusions.is_empty() {
        let _ = writeln!(
            block,
            "გამორიცხული ინგრედიენტები: {}",
            constraints
                .exclusions
                .iter()
                .map(|e| format!("{e:?}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    for myth in &constraints.myths {
        let _ = writeln!(block, "მითი გასაბათილებლად: {}", myth.debunk());
    }
    for goal in &constraints.unrealistic_goals {
        let _ = writeln!(block, "არარეალური მიზანი: {}", goal.correction());
    }
    for concern in &constraints.medical_concerns {
        let _ = writeln!(block, "სამედიცინო გაფრთხილება: {}", concern.warning());
    }
    for concern in &constraints.safety_concerns {
        let _ = writeln!(block, "უსაფრთხოების გაფრთხილება: {}", concern.warning());
    }

    if constraints.is_beginner {
        let _ = writeln!(block, "{BEGINNER_WARNING}");
    }

    if let Some(result) = presearch {
        let _ = writeln!(
            block,
            "წინასწარი ძიება: ნაპოვნია {} პროდუქტი, ჯამი {:.2} ლარი ({} ლარის ბიუჯეტით)",
            result.products.len(),
            result.total_price,
            result.budget
        );
        match result.status {
            BudgetStatus::Under => {
                let _ = writeln!(block, "ბიუჯეტის სტატუსი: ეტევა");
            }
            BudgetStatus::Over => {
                let _ = writeln!(block, "ბიუჯეტის სტატუსი: აჭარბებს");
            }
            BudgetStatus::UnderAfterDrops => {
                let dropped: Vec<&str> = result.dropped.iter().map(|k| k.label()).collect();
                let _ = writeln!(
                    block,
                    "ბიუჯეტის სტატუსი: ეტევა მხოლოდ ამ კატეგორიების მოხსნის შემდეგ: {}",
                    dropped.join(", ")
                );
            }
        }
        for product in &result.products {
            let _ = writeln!(
                block,
                "- {} | {:.2} ლარი | id={}",
                product.name, product.price, product.id
            );
        }
        if result.beginner_overload {
            let _ = writeln!(block, "{BEGINNER_OVERLOAD_WARNING}");
        }
    }

    block.push_str("[/ANALYSIS]");
    Some(block)
}

/// Compose the final system prompt: base instructions, then profile,
/// then analysis. Returns the base prompt unchanged when there is
/// nothing to inject.
pub fn inject_context(
    base_prompt: &str,
    profile: Option<&UserProfile>,
    constraints: &QueryConstraints,
    presearch: Option<&ConstrainedSearchResult>,
) -> String {
    let mut prompt = base_prompt.to_string();
    if let Some(block) = profile.and_then(build_profile_block) {
        prompt.push_str("\n\n");
        prompt.push_str(&block);
    }
    if let Some(block) = build_analysis_block(constraints, presearch) {
        prompt.push_str("\n\n");
        prompt.push_str(&block);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::analyzer::analyze;

    #[test]
    fn test_no_findings_leaves_prompt_unchanged() {
        let constraints = analyze("okay thanks", &[]);
        let prompt = inject_context("base", None, &constraints, None);
        assert_eq!(prompt, "base");
    }

    #[test]
    fn test_empty_profile_not_injected() {
        let constraints = analyze("okay thanks", &[]);
        let profile = UserProfile::default();
        let prompt = inject_context("base", Some(&profile), &constraints, None);
        assert_eq!(prompt, "base");
    }

    #[test]
    fn test_profile_block_fields() {
        let profile = UserProfile {
            age: Some(28),
            weight_kg: Some(74.0),
            occupation: Some("ექთანი".into()),
            ..Default::default()
        };
        let block = build_profile_block(&profile).unwrap();
        assert!(block.starts_with("[USER_PROFILE]"));
        assert!(block.contains("ასაკი: 28"));
        assert!(block.contains("74 კგ"));
        assert!(block.ends_with("[/USER_PROFILE]"));
    }

    #[test]
    fn test_analysis_block_carries_budget_and_myth() {
        let constraints = analyze(
            "I have 150 in budget for protein, and is creatine a steroid?",
            &[],
        );
        let block = build_analysis_block(&constraints, None).unwrap();
        assert!(block.contains("ბიუჯეტი: 150 ლარი"));
        assert!(block.contains("მითი გასაბათილებლად"));
        assert!(block.contains("სტეროიდი"));
    }

    #[test]
    fn test_beginner_warning_injected() {
        let constraints = analyze("I'm a beginner, want protein", &[]);
        let block = build_analysis_block(&constraints, None).unwrap();
        assert!(block.contains("დამწყები"));
    }
}
