//! Pre-model query analysis: constraints, risks and intent pulled out of
//! the user's message (plus recent history) with pattern matching, before
//! any model consultation happens.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::DietaryTag;
use crate::store::Turn;

/// Product categories the analyzer recognizes, ordered by how central
/// they are to a typical plan. Priority drives constrained-search order
/// and budget-overflow drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Protein,
    Creatine,
    Omega,
    Vitamin,
    Bcaa,
    Preworkout,
    FatBurner,
    MassGainer,
    Glutamine,
    Collagen,
}

impl ProductKind {
    /// Higher means dropped later when the budget overflows
    pub fn priority(self) -> u8 {
        match self {
            Self::Protein => 10,
            Self::Creatine => 9,
            Self::Omega => 8,
            Self::Vitamin => 7,
            Self::MassGainer => 6,
            Self::Bcaa => 5,
            Self::Preworkout => 4,
            Self::Glutamine => 3,
            Self::FatBurner => 2,
            Self::Collagen => 1,
        }
    }

    /// Catalog query string for this category
    pub fn search_query(self) -> &'static str {
        match self {
            Self::Protein => "protein",
            Self::Creatine => "creatine",
            Self::Omega => "omega 3",
            Self::Vitamin => "multivitamin",
            Self::Bcaa => "bcaa",
            Self::Preworkout => "pre-workout",
            Self::FatBurner => "fat burner",
            Self::MassGainer => "mass gainer",
            Self::Glutamine => "glutamine",
            Self::Collagen => "collagen",
        }
    }

    /// Localized category label for injected context
    pub fn label(self) -> &'static str {
        match self {
            Self::Protein => "პროტეინი",
            Self::Creatine => "კრეატინი",
            Self::Omega => "ომეგა-3",
            Self::Vitamin => "ვიტამინები",
            Self::Bcaa => "BCAA",
            Self::Preworkout => "პრე-ვორქაუთი",
            Self::FatBurner => "ცხიმისმწველი",
            Self::MassGainer => "მასის მომატება (გეინერი)",
            Self::Glutamine => "გლუტამინი",
            Self::Collagen => "კოლაგენი",
        }
    }
}

/// Supplement myths worth debunking in the injected context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Myth {
    ProteinDamagesKidneys,
    CreatineIsSteroid,
    FatBurnerWithoutExercise,
    MoreProteinMoreMuscle,
}

impl Myth {
    pub fn debunk(self) -> &'static str {
        match self {
            Self::ProteinDamagesKidneys => {
                "პროტეინი ჯანმრთელ თირკმელებს არ აზიანებს. კვლევები აჩვენებს, რომ \
                 ნორმალური დოზებით პროტეინის მიღება უსაფრთხოა."
            }
            Self::CreatineIsSteroid => {
                "კრეატინი არ არის სტეროიდი. ის ბუნებრივი ნაერთია, რომელიც ხორცშიც გვხვდება \
                 და ერთ-ერთი ყველაზე კარგად შესწავლილი დანამატია."
            }
            Self::FatBurnerWithoutExercise => {
                "ცხიმისმწველი ვარჯიშისა და კვების გარეშე არ მუშაობს. ის მხოლოდ დამხმარე \
                 საშუალებაა კალორიული დეფიციტის პირობებში."
            }
            Self::MoreProteinMoreMuscle => {
                "მეტი პროტეინი ავტომატურად მეტ კუნთს არ ნიშნავს. ორგანიზმი დღეში \
                 შეზღუდულ რაოდენობას იყენებს კუნთის ასაშენებლად."
            }
        }
    }
}

/// Physiologically unrealistic goals detected in the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnrealisticGoal {
    /// More than 2 kg of muscle per month
    RapidMuscle { kg: f64, months: f64 },
    /// More than 1 kg of weight loss per week
    RapidWeightLoss { kg: f64, weeks: f64 },
    /// Asking for a full stack at a price no product sells for
    ImpossiblePrice,
}

impl UnrealisticGoal {
    pub fn correction(&self) -> String {
        match self {
            Self::RapidMuscle { kg, months } => format!(
                "{kg} კგ კუნთი {months} თვეში არარეალურია. რეალური ტემპი დაახლოებით \
                 0.5-1 კგ თვეშია სწორი ვარჯიშითა და კვებით."
            ),
            Self::RapidWeightLoss { kg, weeks } => format!(
                "{kg} კგ-ის დაკლება {weeks} კვირაში ჯანმრთელობისთვის საშიშია. \
                 უსაფრთხო ტემპი კვირაში 0.5-1 კგ-ია."
            ),
            Self::ImpossiblePrice => {
                "ამ ფასად სრული კომპლექტი არ არსებობს. შეგვიძლია შევარჩიოთ \
                 ყველაზე მნიშვნელოვანი დანამატები თქვენი ბიუჯეტით."
                    .to_string()
            }
        }
    }
}

/// Medical conditions that change what is safe to recommend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicalConcern {
    SsriInteraction,
    Kidney,
    Liver,
    Heart,
    BloodPressure,
    Diabetes,
    Pregnancy,
    Thyroid,
}

impl MedicalConcern {
    pub fn warning(self) -> &'static str {
        match self {
            Self::SsriInteraction => {
                "ანტიდეპრესანტებთან (SSRI) ზოგიერთი დანამატი (მაგ. 5-HTP, ზვერობოლი) \
                 საშიშად ურთიერთქმედებს. აუცილებლად გაიარეთ კონსულტაცია ექიმთან."
            }
            Self::Kidney => {
                "თირკმლის პრობლემების დროს კრეატინი და მაღალი დოზის პროტეინი \
                 ექიმის დასტურის გარეშე არ არის რეკომენდებული."
            }
            Self::Liver => {
                "ღვიძლის პრობლემების დროს დანამატების მიღებამდე აუცილებელია \
                 ექიმის კონსულტაცია."
            }
            Self::Heart => {
                "გულის პრობლემების დროს სტიმულატორიანი დანამატები (პრე-ვორქაუთი, \
                 ცხიმისმწველი) სახიფათოა. მიმართეთ კარდიოლოგს."
            }
            Self::BloodPressure => {
                "მაღალი წნევის დროს კოფეინიანი დანამატები არ არის რეკომენდებული."
            }
            Self::Diabetes => {
                "დიაბეტის დროს გეინერები და შაქრიანი დანამატები საჭიროებს \
                 ექიმთან შეთანხმებას."
            }
            Self::Pregnancy => {
                "ორსულობის ან ლაქტაციის დროს დანამატების მიღება მხოლოდ \
                 ექიმის დანიშნულებით შეიძლება."
            }
            Self::Thyroid => {
                "ფარისებრი ჯირკვლის პრობლემების დროს ზოგიერთი დანამატი \
                 ჰორმონალურ თერაპიას უშლის ხელს. გაიარეთ კონსულტაცია."
            }
        }
    }
}

/// Behavioral safety risks, separate from diagnosed conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyConcern {
    CaffeineOveruse,
    EatingDisorderRisk,
    OverdoseRisk,
}

impl SafetyConcern {
    pub fn warning(self) -> &'static str {
        match self {
            Self::CaffeineOveruse => {
                "დღეში 400 მგ-ზე მეტი კოფეინი სახიფათოა. გაითვალისწინეთ ყავაც \
                 და ენერგეტიკულებიც."
            }
            Self::EatingDisorderRisk => {
                "დანამატები საკვების ჩანაცვლებისთვის არ გამოიყენება. თუ კვება \
                 გიჭირთ, მიმართეთ სპეციალისტს."
            }
            Self::OverdoseRisk => {
                "რეკომენდებულ დოზაზე მეტის მიღება შედეგს არ აჩქარებს და \
                 ჯანმრთელობას აზიანებს."
            }
        }
    }
}

/// Ingredients the user wants to avoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    Sugar,
    Caffeine,
    Lactose,
    Gluten,
    Soy,
}

/// Training goal behind the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    WeightLoss,
    MuscleGain,
    Maintenance,
    Endurance,
    Recovery,
}

/// Coarse intent classification, priority order: medical beats myth beats
/// product search beats greeting beats general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    MedicalQuestion,
    MythQuestion,
    ProductSearch,
    Greeting,
    General,
}

/// Everything the analyzer extracted from one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConstraints {
    /// Budget in GEL
    pub budget: Option<f64>,
    pub dietary: Vec<DietaryTag>,
    pub exclusions: Vec<Exclusion>,
    pub duration_months: Option<f64>,
    pub myths: Vec<Myth>,
    pub unrealistic_goals: Vec<UnrealisticGoal>,
    pub medical_concerns: Vec<MedicalConcern>,
    pub safety_concerns: Vec<SafetyConcern>,
    pub products: Vec<ProductKind>,
    pub is_beginner: bool,
    pub goal: Option<GoalType>,
    pub intent: Intent,
    /// Several independent signals at once
    pub complex: bool,
}

impl QueryConstraints {
    /// Whether the engine should pre-search the catalog before the first
    /// model consultation
    pub fn wants_presearch(&self) -> bool {
        self.budget.is_some() && !self.products.is_empty()
    }

    /// Anything at all detected
    pub fn has_findings(&self) -> bool {
        self.budget.is_some()
            || !self.dietary.is_empty()
            || !self.exclusions.is_empty()
            || self.duration_months.is_some()
            || !self.myths.is_empty()
            || !self.unrealistic_goals.is_empty()
            || !self.medical_concerns.is_empty()
            || !self.safety_concerns.is_empty()
            || !self.products.is_empty()
            || self.is_beginner
            || self.goal.is_some()
    }
}

macro_rules! patterns {
    ($name:ident, [$($pattern:expr),+ $(,)?]) => {
        static $name: LazyLock<Vec<Regex>> = LazyLock::new(|| {
            vec![$(Regex::new($pattern).unwrap()),+]
        });
    };
}

patterns!(BUDGET, [
    r"(?i)(?:ბიუჯეტ\S*|budget)\D{0,20}?(\d+(?:\.\d+)?)",
    r"(?i)(\d+(?:\.\d+)?)\s*(?:ლარ|₾|gel)\S*",
    r"(?i)(?:have|მაქვს)\s+(\d+(?:\.\d+)?)\s+(?:in\s+budget|ლარი)",
    r"(?i)(?:up to|მაქსიმუმ|არაუმეტეს)\s+(\d+(?:\.\d+)?)",
]);

patterns!(LACTOSE_FREE, [
    r"(?i)lactose\s*(?:free|intoleran\w*)",
    r"(?i)dairy\s+intoleran\w*",
    r"(?i)ლაქტოზ\S*\s*(?:აუტანლ|გარეშე|ინტოლერ)",
    r"(?i)რძის\s+აუტანლ\S*",
]);

patterns!(VEGAN, [
    r"(?i)\bvegan\b",
    r"(?i)ვეგან\S*",
    r"(?i)მცენარეულ\S*\s+პროტეინ",
]);

patterns!(GLUTEN_FREE, [
    r"(?i)gluten\s*(?:free|intoleran\w*)",
    r"(?i)celiac",
    r"(?i)გლუტენ\S*\s*(?:გარეშე|აუტანლ)",
    r"(?i)ცელიაკ\S*",
]);

patterns!(NO_SUGAR, [
    r"(?i)(?:without|no)\s+sugar",
    r"(?i)sugar\s*[- ]?free",
    r"(?i)(?:უშაქრო|შაქრის\s+გარეშე)",
]);

patterns!(NO_CAFFEINE, [
    r"(?i)(?:without|no)\s+caffeine",
    r"(?i)caffeine\s*[- ]?free",
    r"(?i)(?:უკოფეინო|კოფეინის\s+გარეშე)",
]);

patterns!(NO_SOY, [
    r"(?i)(?:without|no)\s+soy",
    r"(?i)soy\s*[- ]?free",
    r"(?i)სოიოს?\s+გარეშე",
]);

patterns!(BEGINNER, [
    r"(?i)\bbeginner\b",
    r"(?i)(?:just|never)\s+start\w*",
    r"(?i)first\s+time",
    r"(?i)დამწყებ\S*",
    r"(?i)ახლა\s+ვიწყებ",
    r"(?i)პირველად",
]);

patterns!(GREETING, [
    r"(?i)^\s*(?:hi|hello|hey)\b",
    r"(?i)^\s*(?:გამარჯობა|სალამი|ჰეი)",
]);

// Myth triggers
patterns!(MYTH_KIDNEYS, [
    r"(?i)protein.{0,40}(?:kidney|damag)",
    r"(?i)პროტეინ\S*.{0,40}თირკმ\S*.{0,20}(?:აზიანებს|ვნებს|\?)",
]);
patterns!(MYTH_STEROID, [
    r"(?i)creatine.{0,30}steroid",
    r"(?i)კრეატინ\S*.{0,30}სტეროიდ",
]);
patterns!(MYTH_FAT_BURNER, [
    r"(?i)fat\s*burner.{0,50}without\s+(?:exercise|workout|diet)",
    r"(?i)ცხიმისმწველ\S*.{0,50}(?:ვარჯიშის|დიეტის)\s+გარეშე",
]);
patterns!(MYTH_MORE_PROTEIN, [
    r"(?i)more\s+protein.{0,40}more\s+muscle",
    r"(?i)მეტი\s+პროტეინ\S*.{0,40}მეტი\s+კუნთ",
]);

// Medical conditions
patterns!(MED_SSRI, [r"(?i)\bssri\b", r"(?i)antidepress\w*", r"(?i)ანტიდეპრესანტ\S*"]);
patterns!(MED_KIDNEY, [r"(?i)kidney\s+(?:problem|disease|issue)", r"(?i)თირკმ\S*\s+პრობლემ\S*"]);
patterns!(MED_LIVER, [r"(?i)liver\s+(?:problem|disease|issue)", r"(?i)ღვიძლ\S*\s+პრობლემ\S*"]);
patterns!(MED_HEART, [r"(?i)heart\s+(?:problem|disease|condition)", r"(?i)გულის\s+(?:პრობლემ|დაავადებ)\S*"]);
patterns!(MED_PRESSURE, [r"(?i)(?:high\s+)?blood\s+pressure", r"(?i)hypertension", r"(?i)(?:მაღალი\s+)?წნევ\S*\s+მაქვს"]);
patterns!(MED_DIABETES, [r"(?i)diabet\w*", r"(?i)დიაბეტ\S*", r"(?i)შაქრიანი\s+დიაბეტ\S*"]);
patterns!(MED_PREGNANCY, [r"(?i)pregnan\w*", r"(?i)breastfeed\w*", r"(?i)ორსულ\S*", r"(?i)ლაქტაცი\S*"]);
patterns!(MED_THYROID, [r"(?i)thyroid", r"(?i)ფარისებრ\S*"]);

// Behavioral safety
patterns!(SAFETY_CAFFEINE, [
    r"(?i)(?:\d+\s+cups?\s+of\s+coffee|energy\s+drinks?\s+every)",
    r"(?i)(?:\d+\s+ჭიქა\s+ყავ|ენერგეტიკულ\S*\s+ყოველ)",
]);
patterns!(SAFETY_MEAL_REPLACEMENT, [
    r"(?i)(?:instead\s+of|replace)\s+(?:food|meals?|eating)",
    r"(?i)საკვების?\s+(?:ნაცვლად|ჩანაცვლებ\S*)",
    r"(?i)ჭამის\s+ნაცვლად",
]);
patterns!(SAFETY_OVERDOSE, [
    r"(?i)(?:double|triple|მაგ\S*)\s+(?:the\s+)?dos\w*",
    r"(?i)(?:more|მეტი)\s+than\s+(?:the\s+)?recommended",
    r"(?i)ორმაგი\s+დოზ\S*",
]);

// Product categories
patterns!(P_PROTEIN, [r"(?i)\bprotein\b", r"(?i)\bwhey\b", r"(?i)პროტეინ\S*", r"(?i)ცილ(?:ა|ის)\b"]);
patterns!(P_CREATINE, [r"(?i)creatine", r"(?i)კრეატინ\S*"]);
patterns!(P_OMEGA, [r"(?i)omega", r"(?i)fish\s+oil", r"(?i)ომეგა\S*", r"(?i)თევზის\s+ქონ\S*"]);
patterns!(P_VITAMIN, [r"(?i)(?:multi)?vitamin\w*", r"(?i)(?:მულტი)?ვიტამინ\S*"]);
patterns!(P_BCAA, [r"(?i)\bbcaa\b", r"(?i)amino\s+acid\w*", r"(?i)ამინომჟავ\S*"]);
patterns!(P_PREWORKOUT, [r"(?i)pre[- ]?workout", r"(?i)პრე[- ]?ვორქაუთ\S*"]);
patterns!(P_FAT_BURNER, [r"(?i)fat\s*burn\w*", r"(?i)ცხიმისმწველ\S*"]);
patterns!(P_MASS_GAINER, [r"(?i)(?:mass\s+)?gainer", r"(?i)გეინერ\S*", r"(?i)მასის\s+მოსამატებ\S*"]);
patterns!(P_GLUTAMINE, [r"(?i)glutamine", r"(?i)გლუტამინ\S*"]);
patterns!(P_COLLAGEN, [r"(?i)collagen", r"(?i)კოლაგენ\S*"]);

// Goals
patterns!(G_WEIGHT_LOSS, [r"(?i)(?:lose|losing)\s+weight", r"(?i)weight\s+loss", r"(?i)წონის?\s+(?:კლებ|დაკლებ)\S*", r"(?i)გახდომ\S*"]);
patterns!(G_MUSCLE_GAIN, [r"(?i)(?:build|gain)\w*\s+muscle", r"(?i)muscle\s+(?:gain|mass)", r"(?i)კუნთ\S*\s+(?:მომატებ|აშენებ|მოსამატებ)\S*"]);
patterns!(G_ENDURANCE, [r"(?i)endurance", r"(?i)stamina", r"(?i)გამძლეობ\S*"]);
patterns!(G_RECOVERY, [r"(?i)recover\w*", r"(?i)აღდგენ\S*"]);
patterns!(G_MAINTENANCE, [r"(?i)maint(?:ain|enance)", r"(?i)შენარჩუნებ\S*"]);

// Quantified goals for unrealistic-goal detection
static MUSCLE_RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*(?:kg|კგ|კილო\S*).{0,30}?(?:muscle|კუნთ\S*).{0,30}?(\d+(?:\.\d+)?)\s*(?:months?|თვე\S*)",
    )
    .unwrap()
});
static LOSS_RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:lose|დავიკლო|დაკლებ\S*).{0,20}?(\d+(?:\.\d+)?)\s*(?:kg|კგ|კილო\S*).{0,30}?(\d+(?:\.\d+)?)\s*(?:weeks?|კვირ\S*)",
    )
    .unwrap()
});

// A bare "N months" is ambiguous with goal timeframes ("in 2 months"),
// so a supply cue is required on one side of the quantity.
patterns!(DURATION, [
    r"(?i)(?:\bfor\s+|მარაგ\S*\s*)(\d+(?:\.\d+)?)\s*(months?|weeks?|years?|თვ\S*|კვირ\S*|წელ\S*|წლ\S*)",
    r"(?i)(\d+(?:\.\d+)?)\s*(months?|weeks?|years?|თვ\S*|კვირ\S*|წელ\S*|წლ\S*)\s*(?:supply|მარაგ\S*)",
]);

// Symptom mentions that look medical but are everyday complaints;
// these do not trigger medical warnings on their own.
patterns!(SYMPTOM_NOISE, [
    r"(?i)(?:muscles?\s+(?:hurt|sore)|კუნთები\s+მტკივა)",
    r"(?i)(?:tired\s+after|დაღლილ\S*\s+ვარ)",
]);

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

fn first_number(patterns: &[Regex], text: &str) -> Option<f64> {
    for pattern in patterns {
        if let Some(captures) = pattern.captures(text) {
            if let Ok(value) = captures[1].parse::<f64>() {
                return Some(value);
            }
        }
    }
    None
}

/// Analyze the user's message, using the most recent history turns only
/// to resolve context (malformed turns are skipped, never fatal).
pub fn analyze(message: &str, history: &[Turn]) -> QueryConstraints {
    // History only backfills the budget and goal when the current
    // message omits them; everything else is per-message.
    let recent: String = history
        .iter()
        .rev()
        .take(4)
        .filter(|turn| !turn.text.trim().is_empty())
        .map(|turn| turn.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let budget = first_number(&BUDGET, message).or_else(|| first_number(&BUDGET, &recent));

    let mut dietary = Vec::new();
    if any_match(&LACTOSE_FREE, message) {
        dietary.push(DietaryTag::LactoseFree);
    }
    if any_match(&VEGAN, message) {
        dietary.push(DietaryTag::Vegan);
    }
    if any_match(&GLUTEN_FREE, message) {
        dietary.push(DietaryTag::GlutenFree);
    }

    let mut exclusions = Vec::new();
    if any_match(&NO_SUGAR, message) {
        exclusions.push(Exclusion::Sugar);
    }
    if any_match(&NO_CAFFEINE, message) {
        exclusions.push(Exclusion::Caffeine);
    }
    if dietary.contains(&DietaryTag::LactoseFree) {
        exclusions.push(Exclusion::Lactose);
    }
    if dietary.contains(&DietaryTag::GlutenFree) {
        exclusions.push(Exclusion::Gluten);
    }
    if any_match(&NO_SOY, message) {
        exclusions.push(Exclusion::Soy);
    }

    let mut myths = Vec::new();
    if any_match(&MYTH_KIDNEYS, message) {
        myths.push(Myth::ProteinDamagesKidneys);
    }
    if any_match(&MYTH_STEROID, message) {
        myths.push(Myth::CreatineIsSteroid);
    }
    if any_match(&MYTH_FAT_BURNER, message) {
        myths.push(Myth::FatBurnerWithoutExercise);
    }
    if any_match(&MYTH_MORE_PROTEIN, message) {
        myths.push(Myth::MoreProteinMoreMuscle);
    }

    let mut medical_concerns = Vec::new();
    if !any_match(&SYMPTOM_NOISE, message) {
        if any_match(&MED_SSRI, message) {
            medical_concerns.push(MedicalConcern::SsriInteraction);
        }
        if any_match(&MED_KIDNEY, message) {
            medical_concerns.push(MedicalConcern::Kidney);
        }
        if any_match(&MED_LIVER, message) {
            medical_concerns.push(MedicalConcern::Liver);
        }
        if any_match(&MED_HEART, message) {
            medical_concerns.push(MedicalConcern::Heart);
        }
        if any_match(&MED_PRESSURE, message) {
            medical_concerns.push(MedicalConcern::BloodPressure);
        }
        if any_match(&MED_DIABETES, message) {
            medical_concerns.push(MedicalConcern::Diabetes);
        }
        if any_match(&MED_PREGNANCY, message) {
            medical_concerns.push(MedicalConcern::Pregnancy);
        }
        if any_match(&MED_THYROID, message) {
            medical_concerns.push(MedicalConcern::Thyroid);
        }
    }

    let mut safety_concerns = Vec::new();
    if any_match(&SAFETY_CAFFEINE, message) {
        safety_concerns.push(SafetyConcern::CaffeineOveruse);
    }
    if any_match(&SAFETY_MEAL_REPLACEMENT, message) {
        safety_concerns.push(SafetyConcern::EatingDisorderRisk);
    }
    if any_match(&SAFETY_OVERDOSE, message) {
        safety_concerns.push(SafetyConcern::OverdoseRisk);
    }

    let mut products = Vec::new();
    let kinds: [(&LazyLock<Vec<Regex>>, ProductKind); 10] = [
        (&P_PROTEIN, ProductKind::Protein),
        (&P_CREATINE, ProductKind::Creatine),
        (&P_OMEGA, ProductKind::Omega),
        (&P_VITAMIN, ProductKind::Vitamin),
        (&P_BCAA, ProductKind::Bcaa),
        (&P_PREWORKOUT, ProductKind::Preworkout),
        (&P_FAT_BURNER, ProductKind::FatBurner),
        (&P_MASS_GAINER, ProductKind::MassGainer),
        (&P_GLUTAMINE, ProductKind::Glutamine),
        (&P_COLLAGEN, ProductKind::Collagen),
    ];
    for (patterns, kind) in kinds {
        if any_match(patterns, message) {
            products.push(kind);
        }
    }

    let mut unrealistic_goals = Vec::new();
    if let Some(captures) = MUSCLE_RATE.captures(message) {
        if let (Ok(kg), Ok(months)) = (captures[1].parse::<f64>(), captures[2].parse::<f64>()) {
            if months > 0.0 && kg / months > 2.0 {
                unrealistic_goals.push(UnrealisticGoal::RapidMuscle { kg, months });
            }
        }
    }
    if let Some(captures) = LOSS_RATE.captures(message) {
        if let (Ok(kg), Ok(weeks)) = (captures[1].parse::<f64>(), captures[2].parse::<f64>()) {
            if weeks > 0.0 && kg / weeks > 1.0 {
                unrealistic_goals.push(UnrealisticGoal::RapidWeightLoss { kg, weeks });
            }
        }
    }
    // A full multi-category stack under 30 GEL does not exist
    if matches!(budget, Some(b) if b < 30.0) && products.len() >= 3 {
        unrealistic_goals.push(UnrealisticGoal::ImpossiblePrice);
    }

    let goal = if any_match(&G_WEIGHT_LOSS, message) {
        Some(GoalType::WeightLoss)
    } else if any_match(&G_MUSCLE_GAIN, message) {
        Some(GoalType::MuscleGain)
    } else if any_match(&G_ENDURANCE, message) {
        Some(GoalType::Endurance)
    } else if any_match(&G_RECOVERY, message) {
        Some(GoalType::Recovery)
    } else if any_match(&G_MAINTENANCE, message) {
        Some(GoalType::Maintenance)
    } else {
        None
    };

    let duration_months = DURATION
        .iter()
        .find_map(|pattern| pattern.captures(message))
        .and_then(|captures| {
            let value = captures[1].parse::<f64>().ok()?;
            let unit = captures[2].to_lowercase();
            if unit.starts_with("week") || unit.starts_with("კვირ") {
                Some(value / 4.0)
            } else if unit.starts_with("year")
                || unit.starts_with("წელ")
                || unit.starts_with("წლ")
            {
                Some(value * 12.0)
            } else {
                Some(value)
            }
        });

    let is_beginner = any_match(&BEGINNER, message);

    let intent = if !medical_concerns.is_empty() || !safety_concerns.is_empty() {
        Intent::MedicalQuestion
    } else if !myths.is_empty() {
        Intent::MythQuestion
    } else if !products.is_empty() || budget.is_some() {
        Intent::ProductSearch
    } else if any_match(&GREETING, message) {
        Intent::Greeting
    } else {
        Intent::General
    };

    let signal_count = usize::from(budget.is_some())
        + dietary.len()
        + exclusions.len()
        + myths.len()
        + unrealistic_goals.len()
        + medical_concerns.len()
        + safety_concerns.len()
        + products.len()
        + usize::from(is_beginner)
        + usize::from(goal.is_some());
    let complex = signal_count >= 4;

    QueryConstraints {
        budget,
        dietary,
        exclusions,
        duration_months,
        myths,
        unrealistic_goals,
        medical_concerns,
        safety_concerns,
        products,
        is_beginner,
        goal,
        intent,
        complex,
    }
}
