use lazy_regex::regex_captures;
use rand::Rng;

use crate::model::{Difficulty, DifficultyProfile};

const STEP_UP_THRESHOLD: f64 = 70.0;
const STEP_DOWN_THRESHOLD: f64 = 40.0;

/// Chooses the next problem's difficulty from experience and rolling
/// performance. Baseline by experience years, then at most one step of
/// adjustment per call so difficulty changes gradually.
pub fn select(profile: &DifficultyProfile) -> Difficulty {
    let baseline = baseline_for(profile);
    match performance_signal(profile) {
        Some(Signal::StepUp) => baseline.step_up(),
        Some(Signal::StepDown) => baseline.step_down(),
        None => baseline,
    }
}

enum Signal {
    StepUp,
    StepDown,
}

fn performance_signal(profile: &DifficultyProfile) -> Option<Signal> {
    let acc = profile.rolling_accuracy;
    let avg = profile.rolling_average_score;
    if acc.map_or(false, |v| v > STEP_UP_THRESHOLD)
        || avg.map_or(false, |v| v > STEP_UP_THRESHOLD)
    {
        return Some(Signal::StepUp);
    }
    if acc.map_or(false, |v| v < STEP_DOWN_THRESHOLD)
        || avg.map_or(false, |v| v < STEP_DOWN_THRESHOLD)
    {
        return Some(Signal::StepDown);
    }
    None
}

fn baseline_for(profile: &DifficultyProfile) -> Difficulty {
    let years = profile
        .experience_years
        .or_else(|| profile.experience_level.as_deref().and_then(parse_experience_years));

    match years {
        Some(y) if y < 1.0 => {
            // Freshers start at Easy. Without any performance history the
            // baseline is randomized between Easy and Medium to vary the
            // opening question; with history, the adjustment below decides.
            if performance_signal(profile).is_some() {
                Difficulty::Easy
            } else if rand::thread_rng().gen_bool(0.5) {
                Difficulty::Medium
            } else {
                Difficulty::Easy
            }
        }
        Some(y) if y < 3.0 => Difficulty::Medium,
        Some(_) => Difficulty::Hard,
        None => baseline_from_skills(profile.skills.len()),
    }
}

fn baseline_from_skills(skill_count: usize) -> Difficulty {
    if skill_count >= 10 {
        Difficulty::Hard
    } else if skill_count >= 5 {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    }
}

/// Parses free-form resume experience text: "fresher" counts as 0 years,
/// "1-2 years" averages the range, "3+ years" takes the number.
pub fn parse_experience_years(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();
    if lower.contains("fresher") {
        return Some(0.0);
    }
    if let Some((_, lo, hi)) = regex_captures!(r"(\d+)\s*-\s*(\d+)", &lower) {
        let lo: f64 = lo.parse().ok()?;
        let hi: f64 = hi.parse().ok()?;
        return Some((lo + hi) / 2.0);
    }
    if let Some((_, n)) = regex_captures!(r"(\d+(?:\.\d+)?)", &lower) {
        return n.parse().ok();
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    fn profile(years: f64, accuracy: Option<f64>, avg_score: Option<f64>) -> DifficultyProfile {
        DifficultyProfile {
            experience_years: Some(years),
            rolling_accuracy: accuracy,
            rolling_average_score: avg_score,
            ..Default::default()
        }
    }

    #[test]
    fn strong_fresher_steps_up_to_medium() {
        let d = select(&profile(0.5, Some(85.0), None));
        assert_eq!(d, Difficulty::Medium);
    }

    #[test]
    fn struggling_senior_steps_down_to_medium() {
        let d = select(&profile(5.0, Some(30.0), None));
        assert_eq!(d, Difficulty::Medium);
    }

    #[test]
    fn mid_experience_without_history_stays_medium() {
        assert_eq!(select(&profile(2.0, None, None)), Difficulty::Medium);
    }

    #[test]
    fn adjustment_never_jumps_two_levels() {
        // Easy baseline + excellent performance lands on Medium, not Hard.
        assert_eq!(select(&profile(0.0, Some(100.0), Some(100.0))), Difficulty::Medium);
        // Hard baseline + terrible performance lands on Medium, not Easy.
        assert_eq!(select(&profile(10.0, Some(0.0), Some(0.0))), Difficulty::Medium);
    }

    #[test]
    fn average_score_alone_can_trigger_adjustment() {
        assert_eq!(select(&profile(2.0, None, Some(90.0))), Difficulty::Hard);
        assert_eq!(select(&profile(2.0, None, Some(10.0))), Difficulty::Easy);
    }

    #[test]
    fn fresher_without_history_gets_easy_or_medium() {
        for _ in 0..20 {
            let d = select(&profile(0.0, None, None));
            assert!(d == Difficulty::Easy || d == Difficulty::Medium);
        }
    }

    #[test]
    fn skills_count_is_the_last_resort_baseline() {
        let mut p = DifficultyProfile::default();
        assert_eq!(select(&p), Difficulty::Easy);
        p.skills = (0..6).map(|i| format!("skill{i}")).collect();
        assert_eq!(select(&p), Difficulty::Medium);
        p.skills = (0..12).map(|i| format!("skill{i}")).collect();
        assert_eq!(select(&p), Difficulty::Hard);
    }

    #[test]
    fn experience_text_parsing() {
        assert_eq!(parse_experience_years("Fresher"), Some(0.0));
        assert_eq!(parse_experience_years("3+ years"), Some(3.0));
        assert_eq!(parse_experience_years("1-2 years"), Some(1.5));
        assert_eq!(parse_experience_years("about 2.5 yrs"), Some(2.5));
        assert_eq!(parse_experience_years("unknown"), None);
    }

    #[test]
    fn experience_text_feeds_the_baseline() {
        let p = DifficultyProfile {
            experience_level: Some("4 years".into()),
            ..Default::default()
        };
        assert_eq!(select(&p), Difficulty::Hard);
    }
}
