//! Maps inbound chat text to a reply.
//!
//! Rules are checked in order and the first match wins:
//!
//! 1. `.carrot` → a fact from the carrot selector
//! 2. `.turnip` → a fact from the turnip selector
//! 3. `.carro…` → one `CARROT` per `o` in the message
//! 4. text containing both `Merry` and `Christmas` → a colored greeting
//!
//! Anything else is ignored.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::selector::Selector;

pub const CARROT_COMMAND: &str = ".carrot";
pub const TURNIP_COMMAND: &str = ".turnip";
pub const CARROT_STEM: &str = ".carro";

/// Most `CARROT`s that fit in one PRIVMSG line.
pub const MAX_CARROTS: usize = 61;

/// Greeting sent four times out of five. Uses mIRC color codes
/// (`\x03NN` sets the foreground color, `\x0f` resets formatting).
pub const GREETING: &str = "\x0304Merry \x0303Christmas\x0304!\x0f";
/// Greeting sent the remaining fifth of the time.
pub const GREETING_RARE: &str = "\x0303Ho ho ho! \x0304Have a carroty \x0303Christmas!\x0f";

pub struct Router {
    carrots: Box<dyn Selector>,
    turnips: Box<dyn Selector>,
    rng: StdRng,
}

impl Router {
    pub fn new(carrots: Box<dyn Selector>, turnips: Box<dyn Selector>) -> Self {
        Self::with_rng(carrots, turnips, StdRng::from_entropy())
    }

    pub fn with_rng(carrots: Box<dyn Selector>, turnips: Box<dyn Selector>, rng: StdRng) -> Self {
        Self { carrots, turnips, rng }
    }

    /// Reply for `text`, or `None` if no rule matches.
    pub fn route(&mut self, text: &str) -> Option<String> {
        if text == CARROT_COMMAND {
            Some(self.carrots.next().text.clone())
        } else if text == TURNIP_COMMAND {
            Some(self.turnips.next().text.clone())
        } else if text.starts_with(CARROT_STEM) {
            Some(carrots(text.matches('o').count()))
        } else if text.contains("Merry") && text.contains("Christmas") {
            Some(self.greeting().to_string())
        } else {
            None
        }
    }

    fn greeting(&mut self) -> &'static str {
        if self.rng.gen_ratio(4, 5) {
            GREETING
        } else {
            GREETING_RARE
        }
    }
}

/// `count` (clamped to [`MAX_CARROTS`]) copies of `CARROT`, space separated.
fn carrots(count: usize) -> String {
    vec!["CARROT"; count.min(MAX_CARROTS)].join(" ")
}
