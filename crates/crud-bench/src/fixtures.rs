//! Synthetic row generation for benchmarks.
//!
//! All randomness used by the harness goes through [`RowGenerator`], so a
//! deterministic implementation can be swapped in without touching the
//! timing code.

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Inclusive bounds for generated ages.
pub const AGE_RANGE: RangeInclusive<i32> = 18..=80;

/// Upper bound on generated description length, in bytes.
pub const MAX_TEXT_LEN: usize = 200;

/// Maximum length of the `name` and `email` columns.
pub const MAX_NAME_LEN: usize = 100;

/// One synthetic record. The id is assigned by the database on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchRow {
    pub name: String,
    pub email: String,
    pub age: i32,
    pub description: String,
}

/// Source of random values for rows and statement parameters.
pub trait RowGenerator {
    /// A person-shaped name.
    fn name(&mut self) -> String;

    /// An email-shaped address.
    fn email(&mut self) -> String;

    /// An integer drawn uniformly from `range`.
    fn int_in(&mut self, range: RangeInclusive<i32>) -> i32;

    /// Free text of at most [`MAX_TEXT_LEN`] bytes.
    fn text(&mut self) -> String;

    /// A random uppercase ASCII letter.
    fn letter(&mut self) -> char {
        let offset = self.int_in(0..=25) as u8;
        (b'A' + offset) as char
    }

    /// A complete row.
    fn row(&mut self) -> BenchRow {
        BenchRow {
            name: self.name(),
            email: self.email(),
            age: self.int_in(AGE_RANGE),
            description: self.text(),
        }
    }
}

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Charlie", "David", "Eve", "Frank", "Grace", "Henry", "Ivy", "Jack", "Karen",
    "Liam", "Maria", "Noah", "Olivia", "Paul", "Quinn", "Rachel", "Samuel", "Tina", "Uma",
    "Victor", "Wendy", "Xavier", "Yara", "Zoe",
];

const LAST_NAMES: &[&str] = &[
    "Anderson", "Brown", "Clark", "Davis", "Evans", "Fischer", "Garcia", "Harris", "Ito",
    "Johnson", "Kim", "Lopez", "Miller", "Nguyen", "Owens", "Patel", "Quiroga", "Robinson",
    "Smith", "Taylor", "Underwood", "Vance", "Walker", "Young", "Zimmerman",
];

const DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "mail.test",
    "corp.invalid",
];

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "commodo", "consequat", "duis", "aute", "irure", "reprehenderit", "voluptate",
    "velit", "esse", "cillum", "fugiat", "nulla", "pariatur",
];

/// Default generator backed by [`StdRng`].
pub struct RandomGenerator {
    rng: StdRng,
}

impl RandomGenerator {
    /// Seed from the operating system's entropy source.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for reproducible data.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn sentence(&mut self) -> String {
        let len = self.rng.gen_range(4..=10);
        let words: Vec<&str> = (0..len).map(|_| self.pick(WORDS)).collect();
        let mut sentence = String::new();
        if let Some(first) = words.first() {
            let mut chars = first.chars();
            if let Some(c) = chars.next() {
                sentence.push(c.to_ascii_uppercase());
                sentence.push_str(chars.as_str());
            }
        }
        for word in words.iter().skip(1) {
            sentence.push(' ');
            sentence.push_str(word);
        }
        sentence.push('.');
        sentence
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RowGenerator for RandomGenerator {
    fn name(&mut self) -> String {
        format!("{} {}", self.pick(FIRST_NAMES), self.pick(LAST_NAMES))
    }

    fn email(&mut self) -> String {
        let first = self.pick(FIRST_NAMES).to_ascii_lowercase();
        let last = self.pick(LAST_NAMES).to_ascii_lowercase();
        let n: u16 = self.rng.gen_range(0..1000);
        format!("{first}.{last}{n}@{}", self.pick(DOMAINS))
    }

    fn int_in(&mut self, range: RangeInclusive<i32>) -> i32 {
        self.rng.gen_range(range)
    }

    fn text(&mut self) -> String {
        let target = self.rng.gen_range(5..=MAX_TEXT_LEN);
        let mut text = String::new();
        loop {
            let sentence = self.sentence();
            let sep = usize::from(!text.is_empty());
            if !text.is_empty() && text.len() + sep + sentence.len() > target {
                break;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&sentence);
            if text.len() >= target {
                break;
            }
        }
        // All words are ASCII, so byte truncation stays on a char boundary.
        text.truncate(MAX_TEXT_LEN);
        text
    }
}

/// Generate exactly `count` rows.
pub fn generate_rows<G: RowGenerator + ?Sized>(generator: &mut G, count: usize) -> Vec<BenchRow> {
    (0..count).map(|_| generator.row()).collect()
}
