//! CVSS v3 base score computation.
//!
//! Advisory pages often publish a full vector string
//! (`CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H`) without a numeric
//! score. [`score_from_vector`] parses such a vector and computes the base
//! score with the standard v3.0/v3.1 equations, so the enrichment stage can
//! fill the `cvss` field from a linked page.

/// Base-metric values parsed out of a v3 vector.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BaseMetrics {
    attack_vector: f64,
    attack_complexity: f64,
    privileges_required: f64,
    user_interaction: f64,
    scope_changed: bool,
    confidentiality: f64,
    integrity: f64,
    availability: f64,
}

/// Compute the base score for a `CVSS:3.x/...` vector string.
///
/// Returns `None` for anything that is not a complete v3 base vector:
/// wrong prefix, missing metrics, unknown metric values. Metric order is
/// not significant; duplicated metrics take the last value.
pub fn score_from_vector(vector: &str) -> Option<f64> {
    let metrics = parse_vector(vector)?;

    let iss = 1.0
        - (1.0 - metrics.confidentiality)
            * (1.0 - metrics.integrity)
            * (1.0 - metrics.availability);

    let impact = if metrics.scope_changed {
        7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powi(15)
    } else {
        6.42 * iss
    };

    let exploitability = 8.22
        * metrics.attack_vector
        * metrics.attack_complexity
        * metrics.privileges_required
        * metrics.user_interaction;

    if impact <= 0.0 {
        return Some(0.0);
    }

    let raw = if metrics.scope_changed {
        (1.08 * (impact + exploitability)).min(10.0)
    } else {
        (impact + exploitability).min(10.0)
    };

    Some(round_up(raw))
}

/// CVSS v3.1 Roundup: smallest number with one decimal place >= input.
/// Computed on an integer scale to dodge float representation artifacts,
/// as the specification prescribes.
fn round_up(value: f64) -> f64 {
    let scaled = (value * 100_000.0).round() as i64;
    if scaled % 10_000 == 0 {
        scaled as f64 / 100_000.0
    } else {
        ((scaled / 10_000) + 1) as f64 / 10.0
    }
}

fn parse_vector(vector: &str) -> Option<BaseMetrics> {
    let mut parts = vector.trim().split('/');
    let prefix = parts.next()?;
    if !(prefix.eq_ignore_ascii_case("CVSS:3.0") || prefix.eq_ignore_ascii_case("CVSS:3.1")) {
        return None;
    }

    let mut av = None;
    let mut ac = None;
    let mut pr = None;
    let mut ui = None;
    let mut scope = None;
    let mut c = None;
    let mut i = None;
    let mut a = None;

    for part in parts {
        let (key, value) = part.split_once(':')?;
        match key.to_ascii_uppercase().as_str() {
            "AV" => {
                av = Some(match value {
                    "N" => 0.85,
                    "A" => 0.62,
                    "L" => 0.55,
                    "P" => 0.2,
                    _ => return None,
                })
            }
            "AC" => {
                ac = Some(match value {
                    "L" => 0.77,
                    "H" => 0.44,
                    _ => return None,
                })
            }
            "PR" => pr = Some(value.to_string()),
            "UI" => {
                ui = Some(match value {
                    "N" => 0.85,
                    "R" => 0.62,
                    _ => return None,
                })
            }
            "S" => {
                scope = Some(match value {
                    "U" => false,
                    "C" => true,
                    _ => return None,
                })
            }
            "C" => c = Some(cia_weight(value)?),
            "I" => i = Some(cia_weight(value)?),
            "A" => a = Some(cia_weight(value)?),
            // Temporal/environmental metrics may trail the base vector.
            _ => {}
        }
    }

    let scope_changed = scope?;
    // PR weight depends on scope, so it resolves last.
    let privileges_required = match (pr?.as_str(), scope_changed) {
        ("N", _) => 0.85,
        ("L", false) => 0.62,
        ("L", true) => 0.68,
        ("H", false) => 0.27,
        ("H", true) => 0.5,
        _ => return None,
    };

    Some(BaseMetrics {
        attack_vector: av?,
        attack_complexity: ac?,
        privileges_required,
        user_interaction: ui?,
        scope_changed,
        confidentiality: c?,
        integrity: i?,
        availability: a?,
    })
}

fn cia_weight(value: &str) -> Option<f64> {
    match value {
        "H" => Some(0.56),
        "L" => Some(0.22),
        "N" => Some(0.0),
        _ => None,
    }
}
