//! `sleuth chat`: the interactive REPL.

use sleuth::repl::{self, ReplCommand};
use sleuth_config::AppConfig;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = super::runtime(config).await?;

    println!();
    println!("  Sleuth: Interactive Mode");
    println!();
    println!("  Model:     {}", runtime.config.model);
    println!("  Actions:   search_and_summarize, scrape_social_user, answer_from_stored_user");
    println!();
    println!("  Type your query and press Enter.");
    println!("  Type 'scrape @username' to scrape a timeline directly.");
    println!("  Type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match repl::parse_line(&line) {
            ReplCommand::Blank => continue,
            ReplCommand::Exit => break,
            ReplCommand::Scrape(handle) => match runtime.scraper.scrape(&handle).await {
                Ok(report) => println!("\n  {}\n", report.summary()),
                Err(e) => eprintln!("\n  [Error] {e}\n"),
            },
            ReplCommand::Ask(query) => {
                eprint!("  ...");
                let result = runtime.agent.run(&query).await;
                eprint!("\r     \r");
                match result {
                    Ok(outcome) => {
                        println!();
                        for line in outcome.answer.lines() {
                            println!("  Sleuth > {line}");
                        }
                        println!();
                    }
                    Err(e) => eprintln!("\n  [Error] {e}\n"),
                }
            }
        }
    }

    println!();
    println!("  {}", repl::FAREWELL);
    println!();
    Ok(())
}
