//! # Play Validation Module
//!
//! Shared validation for lottery plays: 5 distinct main numbers in 1–69 plus
//! a powerball in 1–26. Used to sanity-check detected plays for display and
//! to validate manual entry before it spends any quota.

use crate::api::ManualPlay;

/// Main numbers per play
pub const MAIN_NUMBERS_PER_PLAY: usize = 5;
/// Highest valid main number
pub const MAIN_NUMBER_MAX: u8 = 69;
/// Highest valid powerball number
pub const POWERBALL_MAX: u8 = 26;
/// Maximum plays accepted on the manual-entry form
pub const MAX_MANUAL_PLAYS: usize = 5;

/// Validate one play's numbers
///
/// # Arguments
/// * `main_numbers` - The play's main numbers
/// * `powerball` - The play's powerball number
///
/// # Returns
/// * `Ok(())` - Play is valid
/// * `Err(&str)` - Error key: "wrong-main-count", "main-out-of-range",
///   "duplicate-main" or "powerball-out-of-range"
///
/// # Examples
/// ```
/// use ticket_check::validation::validate_play;
///
/// assert!(validate_play(&[5, 12, 23, 41, 69], 7).is_ok());
/// assert_eq!(validate_play(&[5, 12, 23, 41], 7), Err("wrong-main-count"));
/// assert_eq!(validate_play(&[5, 5, 23, 41, 69], 7), Err("duplicate-main"));
/// assert_eq!(validate_play(&[5, 12, 23, 41, 70], 7), Err("main-out-of-range"));
/// assert_eq!(validate_play(&[5, 12, 23, 41, 69], 27), Err("powerball-out-of-range"));
/// ```
pub fn validate_play(main_numbers: &[u8], powerball: u8) -> Result<(), &'static str> {
    if main_numbers.len() != MAIN_NUMBERS_PER_PLAY {
        return Err("wrong-main-count");
    }

    if main_numbers
        .iter()
        .any(|&n| n < 1 || n > MAIN_NUMBER_MAX)
    {
        return Err("main-out-of-range");
    }

    for (i, n) in main_numbers.iter().enumerate() {
        if main_numbers[i + 1..].contains(n) {
            return Err("duplicate-main");
        }
    }

    if powerball < 1 || powerball > POWERBALL_MAX {
        return Err("powerball-out-of-range");
    }

    Ok(())
}

/// Validate a manual-entry submission before it reaches the network.
///
/// Returns every problem found, keyed by play line, so the form can show
/// them all at once.
pub fn validate_manual_plays(plays: &[ManualPlay]) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if plays.is_empty() {
        errors.push("no-plays".to_string());
    }

    if plays.len() > MAX_MANUAL_PLAYS {
        errors.push("too-many-plays".to_string());
    }

    for play in plays {
        if let Err(key) = validate_play(&play.main_numbers, play.powerball) {
            errors.push(format!("line {}: {}", play.line, key));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
