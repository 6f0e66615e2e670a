// SPDX-License-Identifier: MIT

//! The conflict detector (C3, §4.3): decides whether a queued candidate
//! event is blocked by an earlier in-flight or queued one.
//!
//! A pure function over [`EventQueue`] — no I/O, fully unit- and
//! property-tested. The memo-update asymmetry between identity checks
//! (devnum/ifindex, steps 3–4: never update the memo) and path-based checks
//! (rename/ancestor/descendant, steps 5–6: always update it) is
//! deliberate and must be preserved exactly (spec.md §9's open question).

use ueventd_core::{Device, SeqNum};

use crate::queue::EventQueue;

/// Outcome of a single conflict check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOutcome {
    Blocked,
    NotBlocked,
}

/// Minimal snapshot of the candidate's identity fields, taken before the
/// scan so the borrow checker doesn't need two live references into the
/// same queue at once.
struct Candidate {
    seqnum: SeqNum,
    devpath: String,
    devpath_old: Option<String>,
    devnum_major: u32,
    devnum: (u32, u32),
    is_block: bool,
    ifindex: i32,
    delaying_seqnum: Option<SeqNum>,
}

impl Candidate {
    fn from_device(dev: &Device, delaying_seqnum: Option<SeqNum>) -> Self {
        Self {
            seqnum: dev.seqnum,
            devpath: dev.devpath.clone(),
            devpath_old: dev.devpath_old.clone(),
            devnum_major: dev.devnum.major,
            devnum: (dev.devnum.major, dev.devnum.minor),
            is_block: dev.is_block,
            ifindex: dev.ifindex.0,
            delaying_seqnum,
        }
    }
}

/// Result of scanning the queue for a candidate: whether it is blocked, and
/// the memo value that should be written back (`None` means leave the
/// existing memo untouched).
struct ScanResult {
    outcome: ConflictOutcome,
    new_memo: Option<SeqNum>,
}

fn scan(queue: &EventQueue, c: &Candidate) -> ScanResult {
    for p in queue.iter() {
        let p_seq = p.seqnum();

        // 1. Memo fast-path.
        if let Some(delaying) = c.delaying_seqnum {
            if p_seq < delaying {
                continue;
            }
            if p_seq == delaying {
                return ScanResult {
                    outcome: ConflictOutcome::Blocked,
                    new_memo: None,
                };
            }
        }

        // 2. Stop condition: reached or passed ourselves.
        if p_seq >= c.seqnum {
            return ScanResult {
                outcome: ConflictOutcome::NotBlocked,
                new_memo: None,
            };
        }

        let p_dev = &p.dev;

        // 3. Block-device identity — no memo update.
        if c.devnum_major != 0
            && (p_dev.devnum.major, p_dev.devnum.minor) == c.devnum
            && p_dev.is_block == c.is_block
        {
            return ScanResult {
                outcome: ConflictOutcome::Blocked,
                new_memo: None,
            };
        }

        // 4. Network-interface identity — no memo update.
        if c.ifindex > 0 && p_dev.ifindex.0 == c.ifindex {
            return ScanResult {
                outcome: ConflictOutcome::Blocked,
                new_memo: None,
            };
        }

        // 5. Rename collision.
        if let Some(old) = &c.devpath_old {
            if old == &p_dev.devpath {
                return ScanResult {
                    outcome: ConflictOutcome::Blocked,
                    new_memo: Some(p_seq),
                };
            }
        }

        // 6. Path relation.
        let n = p_dev.devpath.len().min(c.devpath.len());
        if p_dev.devpath.as_bytes()[..n] != c.devpath.as_bytes()[..n] {
            continue;
        }

        if p_dev.devpath.len() == c.devpath.len() {
            // Same path: identity already handled above; names may have
            // swapped devnum/ifindex so do not treat as a blocker here.
            if c.devnum_major != 0 || c.ifindex > 0 {
                continue;
            }
            return ScanResult {
                outcome: ConflictOutcome::Blocked,
                new_memo: Some(p_seq),
            };
        } else if c.devpath.as_bytes().get(n) == Some(&b'/') {
            // p is an ancestor of c.
            return ScanResult {
                outcome: ConflictOutcome::Blocked,
                new_memo: Some(p_seq),
            };
        } else if p_dev.devpath.as_bytes().get(n) == Some(&b'/') {
            // c is an ancestor of p.
            return ScanResult {
                outcome: ConflictOutcome::Blocked,
                new_memo: Some(p_seq),
            };
        }
        // Shared prefix only — skip.
    }

    ScanResult {
        outcome: ConflictOutcome::NotBlocked,
        new_memo: None,
    }
}

/// Check whether `candidate` is blocked, updating its memo in place per the
/// asymmetry rules above. Panics only via the queue if `candidate` is not
/// present — callers always pass a seqnum obtained from the same queue.
pub fn check(queue: &mut EventQueue, candidate: SeqNum) -> ConflictOutcome {
    let Some(event) = queue.find_by_seqnum(candidate) else {
        return ConflictOutcome::NotBlocked;
    };
    let c = Candidate::from_device(&event.dev, event.delaying_seqnum);

    let result = scan(queue, &c);

    if let Some(memo) = result.new_memo {
        if let Some(event) = queue.find_by_seqnum_mut(candidate) {
            event.delaying_seqnum = Some(memo);
        }
    }

    result.outcome
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
