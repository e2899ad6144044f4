//! Ask command implementation.

use crate::app::App;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use futures::StreamExt;
use std::io::Write;

/// Run the ask command, printing fragments as they arrive.
pub async fn run_ask(question: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let app = App::new(settings)?;
    let engine = app.engine();

    let spinner = Output::spinner("Searching knowledge base...");
    let mut fragments = match engine.answer(question).await {
        Ok(fragments) => fragments,
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    };

    let mut stdout = std::io::stdout();
    let mut started = false;
    while let Some(fragment) = fragments.next().await {
        if !started {
            spinner.finish_and_clear();
            println!();
            started = true;
        }
        match fragment {
            Ok(text) => {
                print!("{}", text);
                stdout.flush()?;
            }
            Err(e) => {
                println!();
                Output::error(&format!("Answer interrupted: {}", e));
                return Err(e.into());
            }
        }
    }
    if !started {
        spinner.finish_and_clear();
        Output::warning("The model returned an empty answer.");
    } else {
        println!("\n");
    }

    Ok(())
}
