//! The "hacking" minigame: guess a five-letter word hidden in a wall of
//! symbols.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const WORD_LENGTH: usize = 5;
pub const MAX_ATTEMPTS: usize = 5;
pub const DISTRACTOR_COUNT: usize = 200;
pub const MISS_PLACEHOLDER: &str = "_ ";

pub const DEFAULT_WORDS: &[&str] = &[
    "apple", "melon", "peach", "bloat", "toast", "float", "crack", "track", "broke", "joker",
    "poker", "flame", "frame", "crane", "train", "brain", "drain", "plain", "grain", "grape",
    "grate", "crate",
];

const SYMBOLS: &[&str] = &[
    "@", "#", "$", "%", "^", "&", "*", "(", ")", "-", "+", "=", "|", "{", "}", "[", "]", ":", ";",
    "?",
];

/// Picks a target word uniformly at random.
pub fn pick_word<'a, S, R>(words: &'a [S], rng: &mut R) -> Option<&'a str>
where
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    words.choose(rng).map(|w| w.as_ref())
}

/// Shuffles `pieces`, [`DISTRACTOR_COUNT`] random symbols, and `correct`
/// into one space-separated string.
pub fn mix_words<S, R>(pieces: &[S], correct: &str, rng: &mut R) -> String
where
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    let mut mixed: Vec<&str> = pieces.iter().map(|p| p.as_ref()).collect();
    for _ in 0..DISTRACTOR_COUNT {
        if let Some(symbol) = SYMBOLS.choose(rng) {
            mixed.push(*symbol);
        }
    }
    mixed.push(correct);
    mixed.shuffle(rng);
    mixed.join(" ")
}

/// Mixes the letters of `word` and the word itself into the symbol wall.
pub fn mix<R: Rng + ?Sized>(word: &str, rng: &mut R) -> String {
    let letters: Vec<String> = word.chars().map(String::from).collect();
    mix_words(&letters, word, rng)
}

/// Scores a guess letter by letter: matching letters are kept, misses become
/// [`MISS_PLACEHOLDER`].
#[must_use]
pub fn score_guess(target: &str, guess: &str) -> String {
    let mut target_chars = target.chars();
    let mut feedback = String::new();
    for g in guess.chars() {
        match target_chars.next() {
            Some(t) if t == g => feedback.push(g),
            _ => feedback.push_str(MISS_PLACEHOLDER),
        }
    }
    feedback
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub guess: String,
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    InProgress,
    Won,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub target: String,
    pub attempts: Vec<Attempt>,
    pub outcome: Outcome,
}

impl Game {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attempts: Vec::new(),
            outcome: Outcome::InProgress,
        }
    }

    #[must_use]
    pub fn attempts_left(&self) -> usize {
        MAX_ATTEMPTS.saturating_sub(self.attempts.len())
    }

    /// Records a guess. Guesses of the wrong length, or made after the game
    /// ended, are ignored and return `None`.
    pub fn guess(&mut self, guess: &str) -> Option<&Attempt> {
        let guess = guess.trim().to_lowercase();
        if self.outcome != Outcome::InProgress || guess.chars().count() != WORD_LENGTH {
            return None;
        }

        let feedback = score_guess(&self.target, &guess);
        if guess == self.target {
            self.outcome = Outcome::Won;
        } else if self.attempts.len() + 1 >= MAX_ATTEMPTS {
            self.outcome = Outcome::Lost;
        }

        self.attempts.push(Attempt { guess, feedback });
        self.attempts.last()
    }
}
