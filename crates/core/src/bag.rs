//! Bag module - 7-bag piece queue
//!
//! Every permutation holds each of the seven shapes exactly once. The
//! authoritative board's bag refills itself with a fresh shuffle whenever it
//! drops below seven pieces and records the new permutation so it can be
//! replicated (`NB`). A suspended bag never refills on its own; the mirror
//! board feeds it the replicated permutations instead.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::types::Shape;

/// One shuffled set of the seven shapes
pub type Permutation = [Shape; 7];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BagError {
    #[error("invalid bag: expected 7 letters, got {0}")]
    Length(usize),
    #[error("invalid bag: unknown shape letter {0:?}")]
    UnknownShape(char),
    #[error("invalid bag: shape {0} appears more than once")]
    Duplicate(Shape),
}

/// Shuffle the seven shapes uniformly.
pub fn random_permutation<R: Rng + ?Sized>(rng: &mut R) -> Permutation {
    let mut shapes = Shape::ALL;
    shapes.shuffle(rng);
    shapes
}

/// Parse a 7-letter bag string such as `"TIOJLSZ"`.
///
/// # Examples
///
/// ```
/// use battle_tetris_core::bag::{format_bag, parse_bag};
///
/// let bag = parse_bag("TIOJLSZ").unwrap();
/// assert_eq!(format_bag(&bag), "TIOJLSZ");
/// assert!(parse_bag("TIOJLS").is_err());
/// assert!(parse_bag("TIOJLSX").is_err());
/// ```
pub fn parse_bag(s: &str) -> Result<Permutation, BagError> {
    let count = s.chars().count();
    if count != 7 {
        return Err(BagError::Length(count));
    }

    let mut out = Shape::ALL;
    let mut seen = [false; 7];
    for (slot, c) in out.iter_mut().zip(s.chars()) {
        let shape = match c {
            'I' | 'J' | 'L' | 'O' | 'S' | 'T' | 'Z' => Shape::from_char(c),
            _ => None,
        }
        .ok_or(BagError::UnknownShape(c))?;
        let idx = Shape::ALL.iter().position(|&s| s == shape).unwrap_or(0);
        if seen[idx] {
            return Err(BagError::Duplicate(shape));
        }
        seen[idx] = true;
        *slot = shape;
    }
    Ok(out)
}

pub fn format_bag(bag: &Permutation) -> String {
    bag.iter().map(Shape::as_char).collect()
}

/// Upcoming pieces for one board
#[derive(Debug, Clone)]
pub struct Bag {
    queue: VecDeque<Shape>,
    suspended: bool,
    rng: StdRng,
    generated: Vec<Permutation>,
}

impl Bag {
    /// A self-refilling bag that starts with an agreed permutation.
    pub fn authoritative(first: Permutation, seed: u64) -> Self {
        Self {
            queue: first.into_iter().collect(),
            suspended: false,
            rng: StdRng::seed_from_u64(seed),
            generated: Vec::new(),
        }
    }

    /// A bag that is only ever filled through [`Bag::add_bag`].
    pub fn suspended(first: Permutation) -> Self {
        Self {
            queue: first.into_iter().collect(),
            suspended: true,
            rng: StdRng::seed_from_u64(0),
            generated: Vec::new(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Append an externally supplied permutation.
    pub fn add_bag(&mut self, bag: Permutation) {
        self.queue.extend(bag);
    }

    /// Take the next piece; refills below seven unless suspended.
    pub fn draw(&mut self) -> Option<Shape> {
        let next = self.queue.pop_front();
        if self.queue.len() < 7 {
            self.regenerate();
        }
        next
    }

    /// Peek `n` places ahead.
    pub fn peek(&self, n: usize) -> Option<Shape> {
        self.queue.get(n).copied()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Permutations generated since the last call, oldest first.
    pub fn take_generated(&mut self) -> Vec<Permutation> {
        std::mem::take(&mut self.generated)
    }

    fn regenerate(&mut self) {
        if self.suspended {
            return;
        }
        let bag = random_permutation(&mut self.rng);
        self.queue.extend(bag);
        self.generated.push(bag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: Permutation = [
        Shape::T,
        Shape::I,
        Shape::O,
        Shape::J,
        Shape::L,
        Shape::S,
        Shape::Z,
    ];

    #[test]
    fn test_parse_round_trip() {
        let bag = parse_bag("ZSLJOIT").unwrap();
        assert_eq!(
            bag,
            [
                Shape::Z,
                Shape::S,
                Shape::L,
                Shape::J,
                Shape::O,
                Shape::I,
                Shape::T
            ]
        );
        assert_eq!(format_bag(&bag), "ZSLJOIT");
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(parse_bag(""), Err(BagError::Length(0)));
        assert_eq!(parse_bag("IJLOSTZI"), Err(BagError::Length(8)));
        assert_eq!(parse_bag("IJLOSTX"), Err(BagError::UnknownShape('X')));
        assert_eq!(parse_bag("ijlostz"), Err(BagError::UnknownShape('i')));
        assert_eq!(parse_bag("IJLOSTT"), Err(BagError::Duplicate(Shape::T)));
    }

    #[test]
    fn test_random_permutation_has_every_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut bag = random_permutation(&mut rng);
            bag.sort_by_key(|s| s.as_char());
            let mut all = Shape::ALL;
            all.sort_by_key(|s| s.as_char());
            assert_eq!(bag, all);
        }
    }

    #[test]
    fn test_authoritative_refills_on_first_draw() {
        let mut bag = Bag::authoritative(FIRST, 1);
        assert_eq!(bag.draw(), Some(Shape::T));
        assert_eq!(bag.len(), 13);
        let generated = bag.take_generated();
        assert_eq!(generated.len(), 1);
        assert!(bag.take_generated().is_empty());

        // The agreed permutation drains before the generated one.
        let rest: Vec<Shape> = (0..6).filter_map(|_| bag.draw()).collect();
        assert_eq!(rest, FIRST[1..].to_vec());
        assert_eq!(bag.peek(0), Some(generated[0][0]));
    }

    #[test]
    fn test_suspended_never_refills() {
        let mut bag = Bag::suspended(FIRST);
        for expected in FIRST {
            assert_eq!(bag.draw(), Some(expected));
        }
        assert_eq!(bag.draw(), None);
        assert!(bag.take_generated().is_empty());

        bag.add_bag(FIRST);
        assert_eq!(bag.peek(0), Some(Shape::T));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Bag::authoritative(FIRST, 99);
        let mut b = Bag::authoritative(FIRST, 99);
        for _ in 0..30 {
            assert_eq!(a.draw(), b.draw());
        }
    }
}
