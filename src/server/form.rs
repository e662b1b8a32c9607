//! `application/x-www-form-urlencoded` bodies with bracketed keys.
//!
//! Page forms post keys such as `clues[3][quantity]`, `newClue[id]` and
//! repeated `cluesToRemove[]`. [`FormData`] keeps every decoded pair in
//! submission order and offers lookups for those shapes.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};

use super::response::PageError;
use crate::store::ClueSubmission;

#[derive(Debug, Clone, Default)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

/// The fields submitted for one `clues[<key>]` group.
#[derive(Debug, Clone, Default, PartialEq)]
struct ClueFields {
    key: String,
    id: Option<String>,
    checked: Option<String>,
    quantities: Vec<String>,
}

fn decode(raw: &str) -> Result<String, PageError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| PageError::bad_request("Malformed form data.").with_detail(e.to_string()))
}

/// Splits `outer[a][b]` into `("outer", ["a", "b"])`.
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };
    let base = &key[..open];
    let segments = key[open..]
        .split('[')
        .skip(1)
        .map(|s| s.strip_suffix(']').unwrap_or(s))
        .collect();
    (base, segments)
}

fn is_checked(value: &str) -> bool {
    matches!(value.trim(), "true" | "on" | "1")
}

impl FormData {
    pub fn parse(body: &str) -> Result<Self, PageError> {
        let pairs = body
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (key, value) = part.split_once('=').unwrap_or((part, ""));
                Ok((decode(key)?, decode(value)?))
            })
            .collect::<Result<Vec<_>, PageError>>()?;
        Ok(Self { pairs })
    }

    /// First value submitted under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value under `key`, with an empty string when absent.
    #[must_use]
    pub fn text(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// Every value submitted under `key` or `key[]`.
    #[must_use]
    pub fn all(&self, key: &str) -> Vec<&str> {
        let bracketed = format!("{key}[]");
        self.pairs
            .iter()
            .filter(|(k, _)| k == key || *k == bracketed)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn clue_groups(&self, base: &str) -> Vec<ClueFields> {
        let mut groups: Vec<ClueFields> = Vec::new();

        for (key, value) in &self.pairs {
            let (outer, segments) = split_key(key);
            if outer != base {
                continue;
            }
            let [group_key, field, ..] = segments.as_slice() else {
                continue;
            };

            let index = match groups.iter().position(|g| g.key == *group_key) {
                Some(index) => index,
                None => {
                    groups.push(ClueFields {
                        key: (*group_key).to_string(),
                        ..ClueFields::default()
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[index];

            match *field {
                "id" => group.id = Some(value.clone()),
                "checked" => {
                    // A hidden "false" followed by a checkbox "true" means checked.
                    if group.checked.as_deref().is_none_or(|v| !is_checked(v)) {
                        group.checked = Some(value.clone());
                    }
                }
                "quantity" => group.quantities.push(value.clone()),
                _ => {}
            }
        }

        groups
    }

    /// Reads the `clues[<key>][id|checked|quantity]` checklist.
    ///
    /// The clue id comes from the `id` field, or from the group key when no
    /// id was sent. Groups without a `checked` field use `default_checked`.
    /// When a quantity was submitted several times, the first non-blank one
    /// is used.
    #[must_use]
    pub fn clue_submissions(&self, default_checked: bool) -> Vec<ClueSubmission> {
        self.clue_groups("clues")
            .into_iter()
            .map(|group| {
                let checked = group
                    .checked
                    .as_deref()
                    .map_or(default_checked, is_checked);
                let quantity = group
                    .quantities
                    .iter()
                    .find(|q| !q.trim().is_empty())
                    .cloned()
                    .unwrap_or_default();
                let clue_id = group.id.unwrap_or(group.key);
                ClueSubmission::new(clue_id, checked, quantity)
            })
            .collect()
    }

    /// Reads `newClue[id]` / `newClue[quantity]` from the add-clue form.
    #[must_use]
    pub fn new_clue(&self) -> Option<(String, String)> {
        let id = self.get("newClue[id]")?.trim();
        let quantity = self.get("newClue[quantity]")?.trim();
        if id.is_empty() || quantity.is_empty() {
            return None;
        }
        Some((id.to_string(), quantity.to_string()))
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| PageError::bad_request("Malformed form data.").with_detail(e.body_text()))?;
        let body = std::str::from_utf8(&bytes)
            .map_err(|e| PageError::bad_request("Malformed form data.").with_detail(e.to_string()))?;
        Self::parse(body)
    }
}
