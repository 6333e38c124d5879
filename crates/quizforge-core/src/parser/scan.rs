//! Line scanner for generation replies.
//!
//! The scanner only groups lines into drafts; whether a draft becomes a
//! [`Question`](crate::types::Question) is decided afterwards by the validity gate.

use tracing::debug;

use super::options::split_options;
use super::TypeCounts;
use crate::types::{QuestionType, OPTION_COUNT};

/// Field a line writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Text,
    Options,
    Answer,
    Explanation,
}

impl Field {
    const PREFIXES: [(&'static str, Field); 3] = [
        ("options:", Field::Options),
        ("answer:", Field::Answer),
        ("explanation:", Field::Explanation),
    ];
}

/// A question block as written, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Draft {
    pub question_type: QuestionType,
    pub text: String,
    pub options: Vec<String>,
    pub answer: Option<String>,
    pub explanation: Option<String>,
}

impl Draft {
    fn open(question_type: QuestionType, text: &str) -> Self {
        Self {
            question_type,
            text: text.to_string(),
            options: Vec::new(),
            answer: None,
            explanation: None,
        }
    }

    fn set(&mut self, field: Field, value: &str) {
        match field {
            Field::Text => self.text = value.to_string(),
            Field::Options => {
                self.options.clear();
                self.extend_options(value);
            }
            Field::Answer => self.answer = Some(value.to_string()),
            Field::Explanation => self.explanation = Some(value.to_string()),
        }
    }

    fn extend(&mut self, field: Field, value: &str) {
        match field {
            Field::Text => append(&mut self.text, value),
            Field::Options => self.extend_options(value),
            Field::Answer => append(self.answer.get_or_insert_with(String::new), value),
            Field::Explanation => append(self.explanation.get_or_insert_with(String::new), value),
        }
    }

    fn extend_options(&mut self, value: &str) {
        if self.options.len() >= OPTION_COUNT {
            if let Some(last) = self.options.last_mut() {
                append(last, value);
            }
            return;
        }

        let split = split_options(value, self.options.len());
        if !split.leading.is_empty() {
            if let Some(last) = self.options.last_mut() {
                append(last, &split.leading);
            }
        }
        self.options.extend(split.options);
    }
}

fn append(target: &mut String, value: &str) {
    if value.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(value);
}

/// Scanner state between lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScanState {
    /// No block open yet.
    Idle,
    /// Accumulating a block; continuation lines extend `last_field`.
    Open { draft: Draft, last_field: Field },
    /// After an over-cap marker: lines are discarded until an accepted marker.
    Trailing,
}

/// What one trimmed line is.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Marker(QuestionType, &'a str),
    Field(Field, &'a str),
    Body(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    for question_type in QuestionType::ALL {
        if let Some(rest) = line.strip_prefix(question_type.marker()) {
            return Line::Marker(question_type, rest.trim());
        }
    }

    for (prefix, field) in Field::PREFIXES {
        if let Some(head) = line.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return Line::Field(field, line[prefix.len()..].trim());
            }
        }
    }

    Line::Body(line)
}

/// Groups lines into drafts, honoring per-type caps.
#[derive(Debug)]
pub(crate) struct Scanner {
    caps: TypeCounts,
    opened: TypeCounts,
    state: ScanState,
    drafts: Vec<Draft>,
}

impl Scanner {
    pub fn new(caps: TypeCounts) -> Self {
        Self {
            caps,
            opened: TypeCounts::default(),
            state: ScanState::Idle,
            drafts: Vec::new(),
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Feed one raw line.
    pub fn feed(&mut self, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }

        match classify(line) {
            Line::Marker(question_type, text) => self.on_marker(question_type, text),
            Line::Field(field, value) => {
                if let ScanState::Open { draft, last_field } = &mut self.state {
                    draft.set(field, value);
                    *last_field = field;
                }
            }
            Line::Body(text) => {
                if let ScanState::Open { draft, last_field } = &mut self.state {
                    draft.extend(*last_field, text);
                }
            }
        }
    }

    fn on_marker(&mut self, question_type: QuestionType, text: &str) {
        self.flush();

        if self.opened.get(question_type) >= self.caps.get(question_type) {
            debug!(
                question_type = %question_type,
                cap = self.caps.get(question_type),
                "Marker beyond requested count, skipping block"
            );
            self.state = ScanState::Trailing;
            return;
        }

        self.opened.increment(question_type);
        self.state = ScanState::Open {
            draft: Draft::open(question_type, text),
            last_field: Field::Text,
        };
    }

    fn flush(&mut self) {
        if let ScanState::Open { draft, .. } = std::mem::replace(&mut self.state, ScanState::Idle) {
            self.drafts.push(draft);
        }
    }

    /// Flush the open block and return every draft in input order.
    pub fn finish(mut self) -> Vec<Draft> {
        self.flush();
        self.drafts
    }
}
