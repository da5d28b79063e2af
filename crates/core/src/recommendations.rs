use crate::models::{ConstitutionProfile, DailySchedule, DietPlan, Dosha};

pub fn diet_plan(dosha: Dosha) -> DietPlan {
    let (breakfast, lunch, dinner, snacks, characteristics, avoid) = match dosha {
        Dosha::Vata => (
            "Warm oatmeal with nuts and honey, herbal tea with ginger",
            "Rice with cooked vegetables, dal, and ghee",
            "Soup with root vegetables, whole grain bread",
            "Dates, almonds, warm milk with spices",
            ["Warm foods", "Cooked meals", "Regular timing", "Ghee and oils"],
            ["Cold foods", "Raw vegetables", "Irregular meals", "Caffeine excess"],
        ),
        Dosha::Pitta => (
            "Fresh fruits, coconut water, cooling cereals",
            "Quinoa salad with cucumber, leafy greens, coconut oil",
            "Steamed vegetables with rice, cooling herbs",
            "Sweet fruits, coconut, rose water drinks",
            ["Cool foods", "Sweet tastes", "Fresh ingredients", "Coconut oil"],
            ["Spicy foods", "Sour fruits", "Hot spices", "Fried foods"],
        ),
        Dosha::Kapha => (
            "Light fruits, herbal teas, honey (small amount)",
            "Spiced vegetables, legumes, small portion grains",
            "Light soup, steamed vegetables with warming spices",
            "Spiced tea, small portion of nuts",
            ["Light foods", "Warming spices", "Less oil", "Smaller portions"],
            ["Heavy foods", "Dairy excess", "Sweet foods", "Cold drinks"],
        ),
    };

    DietPlan {
        prakriti_type: dosha,
        breakfast: breakfast.to_string(),
        lunch: lunch.to_string(),
        dinner: dinner.to_string(),
        snacks: snacks.to_string(),
        characteristics: to_strings(&characteristics),
        avoid: to_strings(&avoid),
    }
}

pub fn daily_schedule(dosha: Dosha) -> DailySchedule {
    match dosha {
        Dosha::Vata => DailySchedule {
            prakriti_type: dosha,
            wake_up: "6:00 AM".to_string(),
            meditation: "6:15 AM - 6:45 AM".to_string(),
            exercise: "7:00 AM - 7:30 AM (Gentle yoga, walking)".to_string(),
            breakfast: "8:00 AM".to_string(),
            work: "9:00 AM - 1:00 PM".to_string(),
            lunch: "1:00 PM".to_string(),
            rest: Some("1:30 PM - 2:00 PM".to_string()),
            work_afternoon: "2:00 PM - 6:00 PM".to_string(),
            dinner: "7:00 PM".to_string(),
            relaxation: "8:00 PM - 9:00 PM (Reading, music)".to_string(),
            sleep: "10:00 PM".to_string(),
            tips: to_strings(&[
                "Maintain regular timing",
                "Avoid overexertion",
                "Include warming activities",
                "Create calming environment",
            ]),
        },
        Dosha::Pitta => DailySchedule {
            prakriti_type: dosha,
            wake_up: "5:30 AM".to_string(),
            meditation: "5:45 AM - 6:15 AM".to_string(),
            exercise: "6:30 AM - 7:30 AM (Swimming, moderate intensity)".to_string(),
            breakfast: "8:00 AM".to_string(),
            work: "9:00 AM - 12:30 PM".to_string(),
            lunch: "12:30 PM".to_string(),
            rest: Some("1:00 PM - 1:30 PM".to_string()),
            work_afternoon: "1:30 PM - 5:30 PM".to_string(),
            dinner: "7:30 PM".to_string(),
            relaxation: "8:30 PM - 9:30 PM (Cool activities)".to_string(),
            sleep: "10:30 PM".to_string(),
            tips: to_strings(&[
                "Avoid midday heat",
                "Include cooling activities",
                "Don't skip meals",
                "Moderate intensity workouts",
            ]),
        },
        // No midday rest slot for Kapha.
        Dosha::Kapha => DailySchedule {
            prakriti_type: dosha,
            wake_up: "5:00 AM".to_string(),
            meditation: "5:15 AM - 5:45 AM".to_string(),
            exercise: "6:00 AM - 7:00 AM (Vigorous exercise, running)".to_string(),
            breakfast: "8:30 AM (Light)".to_string(),
            work: "9:00 AM - 1:00 PM".to_string(),
            lunch: "1:00 PM (Main meal)".to_string(),
            rest: None,
            work_afternoon: "2:00 PM - 6:00 PM".to_string(),
            dinner: "6:30 PM (Light)".to_string(),
            relaxation: "8:00 PM - 9:00 PM (Stimulating activities)".to_string(),
            sleep: "10:00 PM".to_string(),
            tips: to_strings(&[
                "Early rising essential",
                "Vigorous morning exercise",
                "Light dinner",
                "Stay active throughout day",
            ]),
        },
    }
}

pub fn constitution_profile(dosha: Dosha) -> ConstitutionProfile {
    let (elements, characteristics) = match dosha {
        Dosha::Vata => (
            "air and space",
            [
                "Creative, energetic, and flexible",
                "Tendency towards dry skin and variable appetite",
                "May experience anxiety when imbalanced",
                "Benefits from routine and grounding activities",
            ],
        ),
        Dosha::Pitta => (
            "fire and water",
            [
                "Intelligent, focused, and determined",
                "Strong digestion and regular appetite",
                "May experience irritability when imbalanced",
                "Benefits from cooling foods and activities",
            ],
        ),
        Dosha::Kapha => (
            "earth and water",
            [
                "Stable, patient, and nurturing",
                "Strong immunity and steady energy",
                "May experience lethargy when imbalanced",
                "Benefits from stimulating and warming activities",
            ],
        ),
    };

    ConstitutionProfile {
        prakriti_type: dosha,
        elements: elements.to_string(),
        summary: format!(
            "You have a {} constitution, characterized by the elements of {}.",
            dosha.label(),
            elements
        ),
        characteristics: to_strings(&characteristics),
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
