//! UI utilities for the terminal client.

use std::io::Write;

/// Print a formatted block and redisplay the prompt after it
pub fn show(output: &str, prompt: &str) {
    print!("{}", output);
    redisplay_prompt(prompt);
}

/// Redisplay the prompt after receiving a message
pub fn redisplay_prompt(prompt: &str) {
    print!("{}> ", prompt);
    std::io::stdout().flush().ok();
}
