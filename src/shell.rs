use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;

use crate::actions::{ActionRegistry, Dispatcher, Message, Tracker};

/// Parse `action_name slot=value other-slot=multi word value`.
///
/// Words without `=` continue the previous slot's value.
pub fn parse_command(line: &str) -> Option<(String, Tracker)> {
    let mut words = line.split_whitespace();
    let action = words.next()?.to_string();

    let mut slots: Vec<(String, String)> = Vec::new();
    for word in words {
        if let Some((name, value)) = word.split_once('=').filter(|(name, _)| !name.is_empty()) {
            slots.push((name.to_string(), value.to_string()));
        } else if let Some((_, value)) = slots.last_mut() {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(word);
        } else {
            return None;
        }
    }

    Some((action, Tracker::with_slots(slots)))
}

/// Interactive loop: run actions by name with hand-typed slots
pub async fn run(registry: &ActionRegistry) -> Result<()> {
    println!(
        "{}",
        format!("Available actions: {}", registry.names().join(", ")).dimmed()
    );
    println!(
        "{}",
        "Usage: <action> [slot=value ...]. Use 'exit' or 'quit' to leave.\n".yellow()
    );

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(&format!("{} ", "Action:".bright_blue().bold()));

        match readline {
            Ok(line) => {
                let input = line.trim();

                if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
                    println!("{}", "Goodbye!".green());
                    break;
                }

                if input.is_empty() {
                    continue;
                }

                rl.add_history_entry(input)?;

                let Some((name, tracker)) = parse_command(input) else {
                    eprintln!("{}", "Could not parse slots, expected slot=value".red());
                    continue;
                };

                let Some(action) = registry.get(&name) else {
                    eprintln!("{}", format!("No registered action found for name '{}'.", name).red());
                    continue;
                };

                let mut dispatcher = Dispatcher::new();
                match action.run(&mut dispatcher, &tracker, &Value::Null).await {
                    Ok(events) => {
                        for message in dispatcher.messages() {
                            match message {
                                Message::Text { text } => {
                                    println!("{} {}", "Bot:".bright_green().bold(), text)
                                }
                                Message::Response { response } => println!(
                                    "{} {}",
                                    "Bot:".bright_green().bold(),
                                    format!("<{}>", response).dimmed()
                                ),
                            }
                        }
                        if !events.is_empty() {
                            println!("{}", format!("[Events: {}]", serde_json::to_string(&events)?).dimmed());
                        }
                        println!();
                    }
                    Err(e) => {
                        eprintln!("{}", format!("Error: {:#}", e).red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "Interrupted. Use 'exit' or 'quit' to leave.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {}", err).red());
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        let (action, tracker) =
            parse_command("action_weather_form_submit address=New York date-time=the day after tomorrow")
                .unwrap();

        assert_eq!(action, "action_weather_form_submit");
        assert_eq!(tracker.get_slot("address"), Some("New York"));
        assert_eq!(tracker.get_slot("date-time"), Some("the day after tomorrow"));
    }

    #[test]
    fn test_parse_command_without_slots() {
        let (action, tracker) = parse_command("action_query_time").unwrap();
        assert_eq!(action, "action_query_time");
        assert!(tracker.slots.is_empty());
    }

    #[test]
    fn test_parse_command_rejects_stray_words() {
        assert!(parse_command("action_query_date tomorrow").is_none());
        assert!(parse_command("   ").is_none());
    }
}
