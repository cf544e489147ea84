//! Console adapters for the binary: stdin utterances in, printed replies out.
//!
//! These stand in for the microphone/speaker front-end so the orchestration
//! core can run headless.

use crate::error::Result;
use crate::services::{SpeechInput, SpeechOutput, Utterance};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Reads one utterance per non-empty stdin line.
pub struct ConsoleInput {
    lines: Lines<BufReader<Stdin>>,
}

impl ConsoleInput {
    /// Attach to stdin.
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechInput for ConsoleInput {
    async fn listen(&mut self) -> Result<Option<Utterance>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) => {
                    let text = line.trim().to_owned();
                    if text.is_empty() {
                        continue;
                    }
                    return Ok(Some(Utterance { text, audio: None }));
                }
                None => return Ok(None),
            }
        }
    }
}

/// Prints replies to stdout.
#[derive(Debug, Default)]
pub struct ConsoleOutput;

#[async_trait]
impl SpeechOutput for ConsoleOutput {
    async fn speak(&self, text: &str) {
        println!("[pato] {text}");
    }

    async fn cue(&self, times: u32) {
        for _ in 0..times {
            println!("[pato] *quack*");
        }
    }
}
