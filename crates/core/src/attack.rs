//! Attack ledger - combo, back-to-back, and garbage cancellation
//!
//! Converts each lock into an outgoing attack magnitude and nets it against
//! the queue of incoming attacks before anything is sent.
//!
//! | Clear | Base |
//! |-------|------|
//! | Single / Double / Triple / Tetris | 0 / 1 / 2 / 4 |
//! | T-spin single / double / triple | 2 / 4 / 6 |
//! | T-spin mini (any lines) | 1 |
//! | T-spin with no lines | 1 |
//!
//! On top of the base: a combo bonus (`>1`: +1, `>3`: +2, `>5`: +3, `>7`: +4,
//! `>10`: +5), +10 for an all clear, and +1 when this clear and the previous
//! one are both difficult (tetris or any spin).

use std::collections::VecDeque;

use crate::error::EngineError;
use crate::types::{ClearKind, ALL_CLEAR_BONUS, GARBAGE_BATCH_LIMIT};

/// Cells in the incoming-garbage meter
pub const METER_CELLS: usize = 20;

/// Result of feeding one lock into the ledger
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttackOutcome {
    /// Attack generated by this clear before cancellation
    pub total: u32,
    /// Part of `total` left over after cancelling incoming attacks
    pub sent: u32,
    /// The back-to-back bonus applied
    pub back_to_back: bool,
    /// Combo counter after this lock
    pub combo: u32,
}

#[derive(Debug, Clone, Default)]
pub struct AttackLedger {
    queue: VecDeque<u32>,
    combo: u32,
    back_to_back: bool,
    lines_sent: u32,
}

fn base_attack(lines: u32, kind: ClearKind) -> Result<u32, EngineError> {
    match (kind, lines) {
        (_, 5..) => Err(EngineError::TooManyLines(lines)),
        (ClearKind::Normal, 0 | 1) => Ok(0),
        (ClearKind::Normal, 2) => Ok(1),
        (ClearKind::Normal, 3) => Ok(2),
        (ClearKind::Normal, _) => Ok(4),
        (ClearKind::TSpin, 0) => Ok(1),
        (ClearKind::TSpin, 1) => Ok(2),
        (ClearKind::TSpin, 2) => Ok(4),
        (ClearKind::TSpin, 3) => Ok(6),
        (ClearKind::TSpin, _) => Err(EngineError::SpinQuad),
        (ClearKind::TSpinMini, _) => Ok(1),
    }
}

fn combo_bonus(combo: u32) -> u32 {
    match combo {
        11.. => 5,
        8..=10 => 4,
        6..=7 => 3,
        4..=5 => 2,
        2..=3 => 1,
        _ => 0,
    }
}

impl AttackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a lock into the ledger.
    ///
    /// Line counts above four, or a T-spin clearing four, are contract
    /// violations and leave the ledger untouched.
    pub fn record_clear(
        &mut self,
        lines: u32,
        kind: ClearKind,
        all_clear: bool,
    ) -> Result<AttackOutcome, EngineError> {
        let base = base_attack(lines, kind)?;

        if lines == 0 {
            self.combo = 0;
            if !kind.is_spin() {
                return Ok(AttackOutcome::default());
            }
        } else {
            self.combo += 1;
        }

        let difficult = kind.is_spin() || lines == 4;
        let back_to_back = self.back_to_back && difficult;

        let mut total = base + combo_bonus(self.combo);
        if all_clear && lines > 0 {
            total += ALL_CLEAR_BONUS;
        }
        if back_to_back {
            total += 1;
        }
        self.back_to_back = difficult;

        let sent = if total > 0 {
            self.lines_sent += total;
            self.cancel(total)
        } else {
            0
        };

        Ok(AttackOutcome {
            total,
            sent,
            back_to_back,
            combo: self.combo,
        })
    }

    /// Net `attack` against the incoming queue, head first. Returns what is
    /// left to send.
    fn cancel(&mut self, mut attack: u32) -> u32 {
        while attack > 0 {
            let Some(head) = self.queue.pop_front() else {
                break;
            };
            if head > attack {
                self.queue.push_front(head - attack);
                attack = 0;
            } else {
                attack -= head;
            }
        }
        attack
    }

    /// Queue an incoming attack. Zero is ignored.
    pub fn receive(&mut self, lines: u32) {
        if lines > 0 {
            self.queue.push_back(lines);
        }
    }

    /// Pop the attacks to materialize after a lock: queue entries are taken
    /// head first until the running total exceeds the batch limit.
    pub fn take_batch(&mut self) -> Vec<u32> {
        let mut batch = Vec::new();
        let mut total = 0;
        while let Some(next) = self.queue.pop_front() {
            total += next;
            batch.push(next);
            if total > GARBAGE_BATCH_LIMIT {
                break;
            }
        }
        batch
    }

    pub fn pending(&self) -> impl Iterator<Item = u32> + '_ {
        self.queue.iter().copied()
    }

    pub fn incoming_total(&self) -> u32 {
        self.queue.iter().sum()
    }

    /// Spread the incoming total over a 20-cell meter, remainder filling
    /// from the bottom cell up. `None` when nothing is incoming.
    pub fn incoming_meter(&self) -> Option<[u32; METER_CELLS]> {
        let total = self.incoming_total();
        if total == 0 {
            return None;
        }
        let per = total / METER_CELLS as u32;
        let extra = (total % METER_CELLS as u32) as usize;
        let mut meter = [per; METER_CELLS];
        for cell in meter.iter_mut().rev().take(extra) {
            *cell += 1;
        }
        Some(meter)
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn back_to_back(&self) -> bool {
        self.back_to_back
    }

    pub fn lines_sent(&self) -> u32 {
        self.lines_sent
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Banner text for a clear, e.g. `"B2B T-spin double"` or `"Tetris"`.
pub fn clear_label(lines: u32, kind: ClearKind, all_clear: bool, back_to_back: bool) -> Option<String> {
    let count = match lines {
        1 => "single",
        2 => "double",
        3 => "triple",
        _ => "",
    };
    let mut text = match kind {
        ClearKind::Normal => match lines {
            0 => return None,
            4 => "Tetris".to_string(),
            _ => {
                let mut word = count.to_string();
                word[..1].make_ascii_uppercase();
                word
            }
        },
        ClearKind::TSpin if count.is_empty() => "T-spin".to_string(),
        ClearKind::TSpin => format!("T-spin {count}"),
        ClearKind::TSpinMini if count.is_empty() => "T-spin mini".to_string(),
        ClearKind::TSpinMini => format!("T-spin mini {count}"),
    };
    if back_to_back {
        text.insert_str(0, "B2B ");
    }
    if all_clear && lines > 0 {
        text.push_str(" All clear");
    }
    Some(text)
}
