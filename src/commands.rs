//! Command handling for the CLI interface
//!
//! This module provides a clean way to handle commands entered in the CLI.
//! Anything that doesn't start with '/' is sent to the model as a prompt.

use crate::client::ChatClient;
use crate::store::StoreError;
use crate::usage::parse_price;

const HELP_TEXT: &str = "\
Available commands:
  /new [name]        Create a conversation and make it active
  /list              List known conversations
  /open <id|name>    Make a conversation active
  /rename <name>     Rename the active conversation
  /delete <id|name>  Delete a conversation and its log
  /drop              Remove the most recent exchange from the active conversation
  /show              Print the active conversation in full
  /usage             Show running token usage and estimated cost
  /set <key> <value> Change a setting (key, price, history, temperature,
                     prefix, suffix, model, naming)
  /help              Show this help
  /exit              Save and quit

Anything else is sent to the model as a prompt.";

/// What the main loop should do after a command
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    Exit,
}

/// Handle one line of user input
pub async fn handle_command(client: &mut ChatClient, input: &str) -> CommandResult {
    let input = input.trim();
    if input.is_empty() {
        return CommandResult::Continue;
    }

    if !input.starts_with('/') {
        handle_send(client, input).await;
        return CommandResult::Continue;
    }

    let parts: Vec<&str> = input.split_whitespace().collect();
    let command = parts[0].trim_start_matches('/').to_lowercase();
    let args = &parts[1..];

    match command.as_str() {
        "exit" | "quit" => return CommandResult::Exit,
        "help" => println!("{}", HELP_TEXT),
        "new" => handle_new(client, args),
        "list" => handle_list(client),
        "open" => handle_open(client, args),
        "rename" => handle_rename(client, args),
        "delete" => handle_delete(client, args),
        "drop" => handle_drop(client),
        "show" => handle_show(client),
        "usage" => println!("{}", client.usage().summary(client.settings().price())),
        "set" => handle_set(client, args),
        _ => println!("Unknown command. Type /help for available commands."),
    }

    CommandResult::Continue
}

async fn handle_send(client: &mut ChatClient, body: &str) {
    if client.active().is_none() {
        println!("(no active conversation; this exchange will not be saved. /new to start one)");
    }

    match client.send(body).await {
        Ok(outcome) => {
            if let Some(reasoning) = &outcome.reasoning {
                println!("--- reasoning ---\n{}\n-----------------", reasoning);
            }
            println!("{}", outcome.response);
            println!(
                "[prompt ~{} tokens | exchange {} tokens] {}",
                outcome.prompt_tokens,
                outcome.tokens,
                client.usage().summary(client.settings().price())
            );
            if let Some(err) = outcome.persist_error {
                println!("Warning: the exchange could not be saved: {}", err);
            }
        }
        Err(err) => println!("Error: {}", err),
    }
}

fn handle_new(client: &mut ChatClient, args: &[&str]) {
    let name = if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    };

    match client.new_conversation(name.as_deref()) {
        Ok(entry) => println!("Created '{}' (ID: {})", entry.name, entry.id),
        Err(err) => println!("Error creating conversation: {}", err),
    }
}

fn handle_list(client: &ChatClient) {
    let entries = client.store().list();
    if entries.is_empty() {
        println!("No conversations yet. /new to start one.");
        return;
    }

    let active_id = client.active().map(|conv| conv.id.clone());
    println!("\nConversations:");
    for (i, entry) in entries.iter().enumerate() {
        let marker = if active_id.as_deref() == Some(entry.id.as_str()) {
            "*"
        } else {
            " "
        };
        // Conversation ids are creation timestamps
        let created = entry
            .id
            .parse::<i64>()
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown date".to_string());

        println!(
            "{} {}. {} (ID: {}, created: {})",
            marker,
            i + 1,
            entry.name,
            entry.id,
            created
        );
    }
}

fn handle_open(client: &mut ChatClient, args: &[&str]) {
    if args.is_empty() {
        println!("Usage: /open <id|name>");
        return;
    }

    let key = args.join(" ");
    match client.open(&key) {
        Ok(conv) => println!("Opened '{}' ({} turns)", conv.name, conv.history.len()),
        Err(err) => println!("Error opening conversation: {}", err),
    }
}

fn handle_rename(client: &mut ChatClient, args: &[&str]) {
    if args.is_empty() {
        println!("Usage: /rename <new name>");
        return;
    }

    let new_name = args.join(" ");
    match client.rename_active(&new_name) {
        Ok(()) => println!("Renamed to '{}'", new_name.trim()),
        Err(err) => println!("Error renaming conversation: {}", err),
    }
}

fn handle_delete(client: &mut ChatClient, args: &[&str]) {
    if args.is_empty() {
        println!("Usage: /delete <id|name>");
        return;
    }

    let key = args.join(" ");
    let Some(entry) = client.store().find(&key).cloned() else {
        println!("No conversation found for '{}'", key);
        return;
    };

    match client.delete(&entry.id) {
        Ok(was_active) => {
            println!("Deleted '{}'", entry.name);
            if was_active {
                println!("(it was the active conversation; /new or /open to pick another)");
            }
        }
        Err(err) => println!("Error deleting conversation: {}", err),
    }
}

fn handle_drop(client: &mut ChatClient) {
    match client.drop_last() {
        Ok(turn) => println!("Dropped the last exchange ({} tokens)", turn.usage),
        Err(err) => match err.downcast_ref::<StoreError>() {
            Some(StoreError::EmptyHistory) => println!("No history to delete."),
            _ => println!("Error dropping last exchange: {}", err),
        },
    }
}

fn handle_show(client: &ChatClient) {
    let Some(conv) = client.active() else {
        println!("No active conversation. /open one first.");
        return;
    };

    println!("\n{} (ID: {}, {} turns)", conv.name, conv.id, conv.history.len());
    for turn in &conv.history {
        let stamp = chrono::DateTime::from_timestamp(turn.timestamp as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown time".to_string());

        println!("\n[user {}]", stamp);
        println!("{}", turn.prompt);
        println!("\n[assistant {}]", stamp);
        println!("{}", turn.response);
        println!("\n{}", "-".repeat(50));
    }
}

fn handle_set(client: &mut ChatClient, args: &[&str]) {
    if args.len() < 2 {
        println!("Usage: /set <key> <value>");
        println!("Keys: key, price, history, temperature, prefix, suffix, model, naming");
        return;
    }

    let key = args[0].to_lowercase();
    let value = args[1..].join(" ");

    match key.as_str() {
        "key" | "api_key" => {
            client.set_api_key(&value);
            println!("API key updated.");
        }
        "price" => {
            client.set_price(&value);
            let parsed = parse_price(&value);
            if parsed == 0.0 && !value.trim().is_empty() {
                println!("Price set (couldn't parse '{}', costing as 0).", value);
            } else {
                println!("Price set to {} per 1000 tokens.", parsed);
            }
        }
        "history" | "depth" => match value.parse::<usize>() {
            Ok(limit) => {
                let applied = client.set_history_limit(limit);
                println!("History depth set to {} turns.", applied);
            }
            Err(_) => println!("Invalid number format. Usage: /set history NUMBER"),
        },
        "temperature" | "temp" => match value.parse::<f32>() {
            Ok(temperature) => {
                let applied = client.set_temperature(temperature);
                println!("Temperature set to {}.", applied);
            }
            Err(_) => println!("Invalid number format. Usage: /set temperature NUMBER"),
        },
        "prefix" => {
            client.set_prefix(&value);
            println!("Prefix updated.");
        }
        "suffix" => {
            client.set_suffix(&value);
            println!("Suffix updated.");
        }
        "model" => match value.parse() {
            Ok(model) => {
                client.set_model(model);
                println!("Model changed to {}.", model);
            }
            Err(err) => println!("{}", err),
        },
        "naming" => match value.to_lowercase().as_str() {
            "timestamp" | "auto" => {
                client.set_name_by_timestamp(true);
                println!("New conversations are named from their creation time.");
            }
            "user" | "manual" => {
                client.set_name_by_timestamp(false);
                println!("New conversations require an explicit name.");
            }
            _ => println!("Usage: /set naming timestamp|user"),
        },
        _ => {
            println!("Unknown setting '{}'.", key);
            println!("Keys: key, price, history, temperature, prefix, suffix, model, naming");
        }
    }

    client.save_state();
}
