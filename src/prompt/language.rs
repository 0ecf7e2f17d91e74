/// Display name for a language code. Unknown codes come back uppercased.
pub fn language_name(code: &str) -> String {
    let name = match code {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "ru" => "Russian",
        "nl" => "Dutch",
        "pl" => "Polish",
        "tr" => "Turkish",
        "vi" => "Vietnamese",
        "th" => "Thai",
        "id" => "Indonesian",
        other => return other.to_uppercase(),
    };
    name.to_string()
}

/// Typical character-count change when rendering English into `code`.
pub fn expansion_factor(code: &str) -> f64 {
    match code {
        "es" | "pt" | "it" => 1.15,
        "fr" => 1.2,
        "de" | "ru" => 1.1,
        "ja" => 0.7,
        "ko" => 0.75,
        "zh" => 0.6,
        "ar" => 1.05,
        _ => 1.0,
    }
}
