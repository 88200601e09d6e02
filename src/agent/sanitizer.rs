//! History sanitizer
//!
//! Repairs and trims a copy of the conversation so that it satisfies the
//! call/result pairing rules strict providers enforce:
//!
//! 1. every tool turn answers a call from the assistant turn it follows,
//! 2. no call id is answered twice,
//! 3. no call is left without its result.
//!
//! Offending entries are dropped with a `warn!`, never repaired by
//! inventing results. Truncation keeps the task turn plus whole
//! call/result units from the end. `sanitize(sanitize(x)) == sanitize(x)`.

use std::collections::HashSet;

use tracing::warn;

use crate::core::Turn;

/// Output of [`sanitize`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedHistory {
    pub turns: Vec<Turn>,
    /// Tool turns removed because their call was unknown or already answered
    pub dropped_results: usize,
    /// Tool calls removed because they were duplicated or never answered
    pub dropped_calls: usize,
    /// Turns removed by the window
    pub trimmed: usize,
}

/// Repair pairing, trim to `window` recent turns, then repair again
pub fn sanitize(turns: &[Turn], window: usize) -> SanitizedHistory {
    let (repaired, mut dropped_results, mut dropped_calls) = repair_pairing(turns);
    let truncated = truncate(&repaired, window);
    let trimmed = repaired.len() - truncated.len();
    let (turns, results, calls) = repair_pairing(&truncated);
    dropped_results += results;
    dropped_calls += calls;

    SanitizedHistory {
        turns,
        dropped_results,
        dropped_calls,
        trimmed,
    }
}

/// Keep the first turn plus the most recent whole units that fit in
/// `window` turns. A unit is an assistant turn with the tool turns that
/// follow it, or a single user turn. The newest unit is always kept, even
/// when it alone is larger than the window.
pub fn truncate(turns: &[Turn], window: usize) -> Vec<Turn> {
    let Some((first, rest)) = turns.split_first() else {
        return Vec::new();
    };
    if rest.len() <= window {
        return turns.to_vec();
    }

    let units = split_units(rest);
    let mut kept = 0;
    let mut start = rest.len();
    for (i, unit) in units.iter().enumerate().rev() {
        let size = unit.end - unit.start;
        if kept + size > window && i + 1 != units.len() {
            break;
        }
        kept += size;
        start = unit.start;
        if kept >= window {
            break;
        }
    }

    let mut out = Vec::with_capacity(kept + 1);
    out.push(first.clone());
    out.extend_from_slice(&rest[start..]);
    out
}

fn split_units(turns: &[Turn]) -> Vec<std::ops::Range<usize>> {
    let mut units: Vec<std::ops::Range<usize>> = Vec::new();
    for (i, turn) in turns.iter().enumerate() {
        match turn {
            Turn::Tool { .. } if !units.is_empty() && units_open(turns, &units) => {
                if let Some(last) = units.last_mut() {
                    last.end = i + 1;
                }
            }
            _ => units.push(i..i + 1),
        }
    }
    units
}

/// Whether the latest unit starts with an assistant turn (and so absorbs
/// the tool turns that follow it)
fn units_open(turns: &[Turn], units: &[std::ops::Range<usize>]) -> bool {
    units
        .last()
        .is_some_and(|u| matches!(turns[u.start], Turn::Assistant { .. }))
}

/// Drop duplicated calls, results without an open call, and calls that
/// never got a result. Returns `(turns, dropped_results, dropped_calls)`.
fn repair_pairing(turns: &[Turn]) -> (Vec<Turn>, usize, usize) {
    let mut out: Vec<Turn> = Vec::with_capacity(turns.len());
    let mut seen: HashSet<String> = HashSet::new();
    let mut open: HashSet<String> = HashSet::new();
    let mut unanswered: HashSet<String> = HashSet::new();
    let mut dropped_results = 0;
    let mut dropped_calls = 0;

    for turn in turns {
        match turn {
            Turn::Tool { call_id, name, .. } => {
                if open.remove(call_id) {
                    out.push(turn.clone());
                } else {
                    warn!(call_id = %call_id, tool = %name, "dropped tool result without a matching call");
                    dropped_results += 1;
                }
            }
            Turn::Assistant { text, tool_calls } => {
                // Results must directly follow their call.
                unanswered.extend(open.drain());
                let mut calls = Vec::with_capacity(tool_calls.len());
                for call in tool_calls {
                    if seen.insert(call.id.clone()) {
                        open.insert(call.id.clone());
                        calls.push(call.clone());
                    } else {
                        warn!(call_id = %call.id, tool = %call.name, "dropped duplicate tool call");
                        dropped_calls += 1;
                    }
                }
                out.push(Turn::Assistant {
                    text: text.clone(),
                    tool_calls: calls,
                });
            }
            Turn::User { .. } => {
                unanswered.extend(open.drain());
                out.push(turn.clone());
            }
        }
    }
    unanswered.extend(open.drain());

    if !unanswered.is_empty() {
        for turn in &mut out {
            if let Turn::Assistant { tool_calls, .. } = turn {
                tool_calls.retain(|call| {
                    let keep = !unanswered.contains(&call.id);
                    if !keep {
                        warn!(call_id = %call.id, tool = %call.name, "dropped tool call without a result");
                    }
                    keep
                });
            }
        }
        dropped_calls += unanswered.len();
    }

    out.retain(|turn| match turn {
        Turn::Assistant { text, tool_calls } => {
            !tool_calls.is_empty() || text.as_deref().is_some_and(|t| !t.trim().is_empty())
        }
        _ => true,
    });

    (out, dropped_results, dropped_calls)
}
