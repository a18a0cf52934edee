//! Patient name normalization.
//!
//! Event titles are typed by hand, so the same patient shows up as
//! `"juan  perez"`, `"Juan Perez "` or `"JUAN PEREZ"`. Titles are reduced to a
//! single canonical form and compared by exact equality afterwards.

use serde::{Deserialize, Serialize};

/// Prefix marking a session held with the patient's parents
pub const PARENTS_PREFIX: &str = "Padres de ";

/// Trim, collapse inner whitespace and title-case every word.
///
/// A letter is upper-cased when the previous character is not a letter and
/// lower-cased otherwise, so `o'brien` becomes `O'Brien`.
pub fn title_case(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let mut prev_is_letter = false;

    for c in collapsed.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                // Multi-letter expansions (`ß` -> `SS`) keep only the first upper-case
                let mut upper = c.to_uppercase();
                out.extend(upper.next());
                out.extend(upper.flat_map(char::to_lowercase));
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }

    out
}

/// Split a whitespace-collapsed title into the parents prefix remainder, if any.
fn strip_parents_prefix(collapsed: &str) -> Option<&str> {
    let prefix_len = PARENTS_PREFIX.len();
    let head = collapsed.get(..prefix_len)?;
    if !head.eq_ignore_ascii_case(PARENTS_PREFIX) {
        return None;
    }
    let rest = &collapsed[prefix_len..];
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Normalize an event title into its detail column label.
///
/// Idempotent: `normalize_title(&normalize_title(t)) == normalize_title(t)`.
pub fn normalize_title(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match strip_parents_prefix(&collapsed) {
        Some(patient) => format!("{}{}", PARENTS_PREFIX, title_case(patient)),
        None => title_case(&collapsed),
    }
}

/// Identity of the patient an event belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientKey {
    /// Normalized title, used as the detail column
    pub label: String,
    /// Underlying patient, used as the totals bucket
    pub patient: String,
    /// True for "Padres de X" sessions
    pub is_parent_session: bool,
}

impl PatientKey {
    /// Derive the key for an event title. Returns None for blank titles.
    pub fn from_title(raw: &str) -> Option<Self> {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return None;
        }

        let key = match strip_parents_prefix(&collapsed) {
            Some(rest) => {
                let patient = title_case(rest);
                Self {
                    label: format!("{}{}", PARENTS_PREFIX, patient),
                    patient,
                    is_parent_session: true,
                }
            }
            None => {
                let name = title_case(&collapsed);
                Self {
                    label: name.clone(),
                    patient: name,
                    is_parent_session: false,
                }
            }
        };
        Some(key)
    }
}
