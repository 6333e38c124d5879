//! Option lists and answer numbers inside multiple-choice blocks.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::OPTION_COUNT;

lazy_static! {
    /// `N)` where N is an option number, at line start or after whitespace.
    static ref OPTION_BOUNDARY: Regex = Regex::new(r"(?:^|\s)([1-4])\)").unwrap();

    /// Leading option number of an `Answer:` value: "2", "2) four", "Option 2", "(2)".
    static ref ANSWER_NUMBER: Regex = Regex::new(r"(?i)^(?:option\s*)?\(?([1-4])\b").unwrap();
}

/// Options found on one line.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct OptionSplit {
    /// Text before the first accepted boundary; continues the previous option.
    pub leading: String,
    /// Newly opened options, in order.
    pub options: Vec<String>,
}

/// Split `line` on option boundaries, accepting only the numbers that follow
/// `already_parsed` in sequence.
///
/// Out-of-sequence boundaries stay part of the option text, so a digit
/// followed by `)` inside an option cannot reorder or truncate the list.
pub(crate) fn split_options(line: &str, already_parsed: usize) -> OptionSplit {
    let mut expected = already_parsed + 1;
    // (start of the digit, end of the boundary)
    let mut boundaries: Vec<(usize, usize)> = Vec::new();

    for caps in OPTION_BOUNDARY.captures_iter(line) {
        if expected > OPTION_COUNT {
            break;
        }
        let Some(digit) = caps.get(1) else { continue };
        let number = usize::from(digit.as_str().as_bytes()[0] - b'0');
        if number == expected {
            boundaries.push((digit.start(), digit.end() + 1));
            expected += 1;
        }
    }

    let Some(&(first_start, _)) = boundaries.first() else {
        return OptionSplit {
            leading: line.trim().to_string(),
            options: Vec::new(),
        };
    };

    let options = boundaries
        .iter()
        .enumerate()
        .map(|(i, &(_, end))| {
            let stop = boundaries.get(i + 1).map_or(line.len(), |&(next, _)| next);
            line[end..stop].trim().to_string()
        })
        .collect();

    OptionSplit {
        leading: line[..first_start].trim().to_string(),
        options,
    }
}

/// Leading option number of an MCQ answer value, if any.
pub(crate) fn answer_number(answer: &str) -> Option<u8> {
    ANSWER_NUMBER
        .captures(answer.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Resolve an MCQ answer to an option number: by leading number first, then
/// by case-insensitive match against the option texts.
pub(crate) fn resolve_answer(answer: &str, options: &[String]) -> Option<u8> {
    if let Some(number) = answer_number(answer) {
        return Some(number);
    }

    let wanted = answer.trim().trim_end_matches('.').to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    options
        .iter()
        .position(|option| option.trim().to_lowercase() == wanted)
        .and_then(|i| u8::try_from(i + 1).ok())
}
