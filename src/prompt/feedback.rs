//! Feedback strings fed back into the next prompt.

use std::fmt::Write;

use super::language::expansion_factor;

/// Miss (in percent) beyond which late attempts get the critical header.
const CRITICAL_MISS_PERCENT: f64 = 30.0;
/// Attempt number from which retry strategies turn aggressive.
pub const AGGRESSIVE_FROM_ATTEMPT: u32 = 5;

/// Character budget for the first attempt.
pub fn character_guidance(source_text: &str, duration: f64, target_language: &str) -> String {
    let source_chars = source_text.chars().count();
    let target_chars = (source_chars as f64 * expansion_factor(target_language)).round();
    let chars_per_second = if duration > 0.0 {
        target_chars / duration
    } else {
        0.0
    };

    let mut out = String::from("CHARACTER GUIDANCE:\n");
    let _ = writeln!(
        out,
        "- Source text: {} characters in {:.1}s",
        source_chars, duration
    );
    let _ = writeln!(
        out,
        "- Target should be approximately {} characters",
        target_chars as u64
    );
    let _ = writeln!(out, "- Aim for {:.1} characters per second", chars_per_second);

    if duration < 1.0 {
        out.push('\n');
        let _ = writeln!(out, "VERY SHORT SEGMENT ({:.1}s):", duration);
        out.push_str("- Use the shortest possible rendering\n");
        out.push_str("- A single word or a very brief phrase only\n");
        out.push_str("- No filler words at all\n");
    }

    out
}

/// Retry instructions after a measured miss. `attempt` is 1-based and names
/// the attempt that just failed.
pub fn retry_feedback(previous_text: &str, measured: f64, target: f64, attempt: u32) -> String {
    let too_short = measured < target;
    let difference = measured - target;
    let percent_diff = if target > 0.0 {
        difference / target * 100.0
    } else {
        0.0
    };
    let aggressive = attempt >= AGGRESSIVE_FROM_ATTEMPT;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Your previous adaptation was {}.\n",
        if too_short { "TOO SHORT" } else { "TOO LONG" }
    );
    let _ = writeln!(out, "TARGET TIME: {:.2} seconds", target);
    let _ = writeln!(out, "PREVIOUS TEXT: \"{}\"", previous_text);
    let _ = writeln!(out, "MEASURED SPOKEN TIME: {:.2} seconds", measured);
    let _ = writeln!(
        out,
        "DIFFERENCE: {:.2}s ({:.1}%)\n",
        difference.abs(),
        percent_diff.abs()
    );

    if aggressive && percent_diff.abs() > CRITICAL_MISS_PERCENT {
        let _ = writeln!(
            out,
            "CRITICAL: this was attempt {} and it is still far off target.",
            attempt
        );
        out.push_str("Change the length DRASTICALLY.\n\n");
    } else {
        out.push_str("This attempt failed. ");
    }

    if too_short {
        out.push_str("Write a LONGER adaptation.\n\n");
        if aggressive {
            out.push_str("AGGRESSIVE EXPANSION:\n");
            out.push_str("- Add several natural filler phrases and hesitations\n");
            out.push_str("- Expand each idea with extra context\n");
            out.push_str("- Prefer longer, more descriptive wording\n");
            out.push_str("- Restate the key point in other words\n");
        } else {
            out.push_str("Ways to lengthen it:\n");
            out.push_str("- Add natural filler words\n");
            out.push_str("- Use more descriptive phrasing\n");
            out.push_str("- Allow a reflective pause or hesitation\n");
            out.push_str("- Example: \"No sé\" -> \"Bueno, la verdad es que no estoy seguro\"\n");
        }
    } else {
        out.push_str("Write a SHORTER adaptation.\n\n");
        if aggressive {
            out.push_str("AGGRESSIVE CUTS:\n");
            out.push_str("- Remove every filler word and side phrase\n");
            out.push_str("- Pick the shortest words available\n");
            out.push_str("- Drop anything redundant\n");
            out.push_str("- Use contractions where they sound natural\n");
            out.push_str(
                "- Example: \"We will be going from the station to the hotel\" -> \"Station, then hotel\"\n",
            );
        } else {
            out.push_str("Ways to shorten it:\n");
            out.push_str("- Remove filler words\n");
            out.push_str("- Use more concise phrasing\n");
            out.push_str("- Use shorter synonyms\n");
            out.push_str("- Example: \"Bueno, la verdad es que no sé\" -> \"No sé\"\n");
        }
    }

    let _ = write!(
        out,
        "\nThe line must fill the whole {:.2}-second window naturally.",
        target
    );
    out
}
